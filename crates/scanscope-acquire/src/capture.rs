//! One position -> one annotated TIFF tile.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use image::{imageops, RgbImage};
use scanscope_core::{Frame, Objective, Position, WhiteBalance};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use uuid::Uuid;

use crate::hardware::{Camera, CameraError};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("failed to capture image at tile {index}: {source}")]
    FrameRead { index: usize, source: CameraError },
    #[error("camera returned a malformed frame ({width}x{height}, {len} bytes)")]
    MalformedFrame {
        width: usize,
        height: usize,
        len: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
}

/// Acquisition record embedded in each tile's ImageDescription tag.
///
/// Physical pixel size is left to downstream tools.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMetadata {
    pub tile_x: i64,
    pub tile_y: i64,
    pub tile_z: i64,
    pub channel: String,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub size_t: u32,
    pub size_c: u32,
    pub acquisition_date: String,
    pub objective: Objective,
    pub gain_factor: Option<f32>,
    pub image_id: Uuid,
}

impl TileMetadata {
    pub fn new(
        position: Position,
        width: u32,
        height: u32,
        objective: Objective,
        gain: Option<f32>,
    ) -> Self {
        Self {
            tile_x: position.x,
            tile_y: position.y,
            tile_z: 0,
            channel: "Brightfield".to_owned(),
            size_x: width,
            size_y: height,
            size_z: 1,
            size_t: 1,
            size_c: 1,
            acquisition_date: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            objective,
            gain_factor: gain,
            image_id: Uuid::new_v4(),
        }
    }

    /// `Key=value` lines, one per field.
    pub fn to_description(&self) -> String {
        let gain = self
            .gain_factor
            .map_or_else(|| "None".to_owned(), |g| g.to_string());
        [
            format!("TileX={}", self.tile_x),
            format!("TileY={}", self.tile_y),
            format!("TileZ={}", self.tile_z),
            format!("Channel={}", self.channel),
            format!("SizeX={}", self.size_x),
            format!("SizeY={}", self.size_y),
            format!("SizeZ={}", self.size_z),
            format!("SizeT={}", self.size_t),
            format!("SizeC={}", self.size_c),
            format!("AcquisitionDate={}", self.acquisition_date),
            format!("Objective={}", self.objective),
            format!("GainFactor={gain}"),
            format!("ImageID={}", self.image_id),
        ]
        .join("\n")
    }
}

/// A tile written to disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    /// 1-based capture index.
    pub index: usize,
    pub filename: String,
    pub path: PathBuf,
    pub position: Position,
    pub metadata: TileMetadata,
}

pub fn tile_filename(index: usize) -> String {
    format!("tile_{index:04}.tif")
}

/// Rotate a camera frame by 180° and reorder BGR -> RGB for storage.
///
/// The camera is mounted upside down relative to the stage axes.
pub fn orient_for_storage(frame: &Frame) -> Result<RgbImage, CaptureError> {
    let malformed = || CaptureError::MalformedFrame {
        width: frame.width,
        height: frame.height,
        len: frame.data.len(),
    };
    let width = u32::try_from(frame.width).map_err(|_| malformed())?;
    let height = u32::try_from(frame.height).map_err(|_| malformed())?;
    let rgb: Vec<u8> = frame
        .data
        .chunks_exact(Frame::CHANNELS)
        .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
        .collect();
    let img = RgbImage::from_raw(width, height, rgb).ok_or_else(malformed)?;
    Ok(imageops::rotate180(&img))
}

fn write_tiff(path: &Path, img: &RgbImage, description: &str) -> Result<(), CaptureError> {
    let mut file = BufWriter::new(File::create(path)?);
    encode_tiff(&mut file, img, description)
}

/// Encode `img` with its description tag and flush `writer`.
fn encode_tiff<W: Write + Seek>(
    writer: &mut W,
    img: &RgbImage,
    description: &str,
) -> Result<(), CaptureError> {
    {
        let mut encoder = TiffEncoder::new(&mut *writer)?;
        let mut image = encoder.new_image::<colortype::RGB8>(img.width(), img.height())?;
        image.encoder().write_tag(Tag::ImageDescription, description)?;
        image.write_data(img.as_raw())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read one frame, correct, orient, annotate and write it as
/// `tile_<index>.tif` inside `dir`.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(camera, white_balance, dir),
        fields(x = position.x, y = position.y)
    )
)]
pub fn capture_tile<C: Camera + ?Sized>(
    camera: &mut C,
    white_balance: &WhiteBalance,
    objective: Objective,
    dir: &Path,
    index: usize,
    position: Position,
) -> Result<Tile, CaptureError> {
    let frame = camera
        .read_frame()
        .map_err(|source| CaptureError::FrameRead { index, source })?;
    let frame = white_balance.correct(&frame);
    let img = orient_for_storage(&frame)?;

    let metadata = TileMetadata::new(
        position,
        img.width(),
        img.height(),
        objective,
        white_balance.gain(),
    );
    let filename = tile_filename(index);
    let path = dir.join(&filename);
    write_tiff(&path, &img, &metadata.to_description())?;

    Ok(Tile {
        index,
        filename,
        path,
        position,
        metadata,
    })
}

//! Output folder lifecycle and the per-scan log file.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::Level;
use scanscope_core::{Objective, LOG_TIMESTAMP_FORMAT};

use crate::capture::Tile;
use crate::manifest::{ManifestEntry, TileConfiguration};

/// Folder-name timestamp; second resolution keeps folders unique per run.
const FOLDER_TIMESTAMP_FORMAT: &str = "Scan_%Y-%m-%d_%H-%M-%S";
const MANIFEST_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Scan event sink: forwards to `log` and, once a session exists, appends
/// `[timestamp] message` lines to the session log file.
#[derive(Debug, Default)]
pub struct ScanLog {
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl ScanLog {
    /// Console only; used before a session folder exists.
    pub fn console() -> Self {
        Self::default()
    }

    /// Append to `path`, creating it if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(BufWriter::new(file)),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&mut self, level: Level, message: impl fmt::Display) {
        log::log!(level, "{message}");
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let now = Local::now().format(LOG_TIMESTAMP_FORMAT);
        let written = writeln!(file, "[{now}] {message}").and_then(|_| file.flush());
        if let Err(err) = written {
            log::error!("failed to write scan log: {err}");
            self.file = None;
        }
    }
}

/// One scan's output folder, log and manifest list.
#[derive(Debug)]
pub struct ScanSession {
    folder: PathBuf,
    log: ScanLog,
    entries: Vec<ManifestEntry>,
}

impl ScanSession {
    /// Create `<root>/Scan_<timestamp>_<objective>/` and its log file.
    pub fn create(root: &Path, objective: Objective, started: DateTime<Local>) -> io::Result<Self> {
        let stamp = started.format(FOLDER_TIMESTAMP_FORMAT).to_string();
        let folder = root.join(format!("{stamp}_{objective}"));
        fs::create_dir_all(&folder)?;
        let log = ScanLog::open(&folder.join(format!("{stamp}_log.txt")))?;
        Ok(Self {
            folder,
            log,
            entries: Vec::new(),
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn log(&mut self) -> &mut ScanLog {
        &mut self.log
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.path()
    }

    pub fn record_tile(&mut self, tile: &Tile) {
        self.entries.push(ManifestEntry {
            filename: tile.filename.clone(),
            position: tile.position,
        });
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Write the position manifest for all recorded tiles.
    pub fn write_manifest(&mut self, now: DateTime<Local>) -> io::Result<PathBuf> {
        let manifest = TileConfiguration {
            entries: self.entries.clone(),
        };
        let stamp = now.format(MANIFEST_TIMESTAMP_FORMAT).to_string();
        let path = manifest.write(&self.folder, &stamp)?;
        self.log.record(
            Level::Info,
            format_args!("Stitching manifest saved to: {}", path.display()),
        );
        Ok(path)
    }
}

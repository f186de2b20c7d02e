//! Acquisition side of tiled microscope scans.
//!
//! This crate wires the pure planning in `scanscope-core` to hardware:
//! - [`move_and_settle`] drives the stage and waits for it to settle,
//! - [`capture_tile`] turns one camera frame into an annotated TIFF tile,
//! - [`Scanner`] sequences a whole scan and writes the stitching manifest,
//! - [`run_preview`] streams the live view and feeds the patch picker.
//!
//! Hardware is reached only through the [`HardwareControl`] and [`Camera`]
//! traits; [`sim`] has in-process implementations.

mod capture;
mod clock;
mod config;
mod context;
mod hardware;
mod manifest;
mod motion;
mod preview;
mod scanner;
mod session;
pub mod sim;

pub use capture::{
    capture_tile, orient_for_storage, tile_filename, CaptureError, Tile, TileMetadata,
};
pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, DeviceNames, ScanConfig};
pub use context::SessionContext;
pub use hardware::{Camera, CameraError, HardwareControl, HardwareError, Resolution};
pub use manifest::{ManifestEntry, ManifestParseError, TileConfiguration};
pub use motion::{move_and_settle, SettleOutcome, SettleParams};
pub use preview::{run_preview, PreviewControl};
pub use scanner::{set_control_mode, switch_objective, ScanError, ScanReport, ScanState, Scanner};
pub use session::{ScanLog, ScanSession};

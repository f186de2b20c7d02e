//! Core types for tiled microscope scans.
//!
//! This crate is pure: it plans stage positions and transforms pixel
//! buffers, but never talks to hardware or the filesystem. Acquisition lives
//! in `scanscope-acquire`.

mod frame;
mod geometry;
mod grid;
mod logger;
mod white_balance;

pub use frame::{patch_medians, Frame, FrameView, PatchRegion};
pub use geometry::{
    AxisRange, HardBoundary, Objective, Position, ScanRequest, StepSize, StepTable,
    UnknownObjective, DEFAULT_BOUNDARY_CORNERS,
};
pub use grid::{column_positions, plan, row_positions, BoundaryError};
pub use white_balance::{WhiteBalance, WhiteBalanceEvent};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, LOG_TIMESTAMP_FORMAT};

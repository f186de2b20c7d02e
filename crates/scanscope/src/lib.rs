//! High-level facade for the `scanscope-*` workspace.
//!
//! This crate provides:
//! - re-exports of the planning crate ([`core`]) and the acquisition crate
//!   ([`acquire`]),
//! - the interactive request form used by the `scanscope` binary ([`form`]).
//!
//! ## Quickstart
//!
//! ```no_run
//! use scanscope::acquire::sim::{FakeClock, SimulatedStage, SyntheticCamera};
//! use scanscope::acquire::{ScanConfig, Scanner, SessionContext};
//! use scanscope::ScanRequest;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanConfig::default();
//! let context = SessionContext::new();
//! let mut stage = SimulatedStage::new(Some(2));
//! let clock = FakeClock::new();
//! let mut camera = SyntheticCamera::new();
//!
//! let report = Scanner::new(&config, &context, &mut stage, &clock)
//!     .run(&ScanRequest::default(), &mut camera)?;
//! println!("{} tiles in {}", report.tiles.len(), report.folder.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `scanscope::core`: positions, objectives, hard boundary, grid planner,
//!   frames and the white-balance model.
//! - `scanscope::acquire`: hardware traits, stage settling, tile capture,
//!   the scan state machine, manifests and the simulator.
//! - `scanscope::form`: prompts for a scan request on any `BufRead`/`Write`.

pub use scanscope_acquire as acquire;
pub use scanscope_core as core;

pub use scanscope_acquire::{ScanConfig, ScanError, ScanReport, Scanner, SessionContext};
pub use scanscope_core::{Objective, Position, ScanRequest, WhiteBalance};

pub mod form;

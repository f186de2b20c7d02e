//! Scan orchestration.
//!
//! A scan moves through
//! `Idle -> Validating -> AcquiringObjective -> Scanning -> Finalizing -> Done`;
//! any step may end in `Aborted`. Setup failures abort before a folder is
//! created or the stage moves. Failed captures are skipped. Anything else
//! that fails mid-scan still leaves a manifest for the tiles written so far.

use std::path::PathBuf;

use chrono::Local;
use log::Level;
use scanscope_core::{plan, BoundaryError, Objective, Position, ScanRequest};

use crate::capture::capture_tile;
use crate::clock::Clock;
use crate::config::{DeviceNames, ScanConfig};
use crate::context::SessionContext;
use crate::hardware::{Camera, CameraError, HardwareControl, HardwareError};
use crate::manifest::ManifestEntry;
use crate::motion::move_and_settle;
use crate::session::{ScanLog, ScanSession};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Validating,
    AcquiringObjective,
    Scanning,
    Finalizing,
    Done,
    Aborted,
}

#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    #[error("could not set hardware control mode: {0}")]
    HardwareMode(#[source] HardwareError),
    #[error("failed to switch objective to {objective}: {source}")]
    ObjectiveSwitch {
        objective: Objective,
        source: HardwareError,
    },
    #[error("camera unavailable: {0}")]
    CameraUnavailable(#[source] CameraError),
    #[error("stage failure at tile {index} {position}: {source}")]
    Hardware {
        index: usize,
        position: Position,
        source: HardwareError,
    },
    #[error("scan stopped after {completed} of {planned} positions")]
    Cancelled { completed: usize, planned: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Errors raised before any folder exists or the stage moves.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ScanError::Boundary(_)
                | ScanError::HardwareMode(_)
                | ScanError::ObjectiveSwitch { .. }
                | ScanError::CameraUnavailable(_)
        )
    }
}

/// Summary of a completed scan.
#[derive(Clone, Debug)]
pub struct ScanReport {
    pub folder: PathBuf,
    pub manifest_path: PathBuf,
    pub log_path: Option<PathBuf>,
    pub planned: usize,
    pub tiles: Vec<ManifestEntry>,
    /// 1-based indices whose capture failed.
    pub skipped: Vec<usize>,
    /// 1-based indices whose move timed out before settling.
    pub unsettled: Vec<usize>,
}

/// Put the controller in combined manual + computer control.
pub fn set_control_mode<H: HardwareControl + ?Sized>(
    hardware: &mut H,
    devices: &DeviceNames,
) -> Result<(), ScanError> {
    hardware
        .set_property(&devices.hub, &devices.control_property, &devices.control_mode)
        .map_err(ScanError::HardwareMode)?;
    log::info!(
        "{} {} set to '{}'",
        devices.hub,
        devices.control_property,
        devices.control_mode
    );
    Ok(())
}

/// Rotate the turret to `objective` and wait for it to stop.
pub fn switch_objective<H: HardwareControl + ?Sized>(
    hardware: &mut H,
    devices: &DeviceNames,
    objective: Objective,
) -> Result<(), ScanError> {
    let label = objective.turret_position();
    hardware
        .set_property(&devices.objective, &devices.objective_property, label)
        .and_then(|()| hardware.wait_for_device(&devices.objective))
        .map_err(|source| ScanError::ObjectiveSwitch { objective, source })?;
    log::info!("objective set to {objective} ({label})");
    Ok(())
}

/// Sequences planning, hardware setup and per-position capture.
pub struct Scanner<'a, H: ?Sized, K: ?Sized> {
    config: &'a ScanConfig,
    context: &'a SessionContext,
    hardware: &'a mut H,
    clock: &'a K,
    trail: Vec<ScanState>,
}

struct Progress {
    tiles_attempted: usize,
    skipped: Vec<usize>,
    unsettled: Vec<usize>,
}

impl<'a, H, K> Scanner<'a, H, K>
where
    H: HardwareControl + ?Sized,
    K: Clock + ?Sized,
{
    pub fn new(
        config: &'a ScanConfig,
        context: &'a SessionContext,
        hardware: &'a mut H,
        clock: &'a K,
    ) -> Self {
        Self {
            config,
            context,
            hardware,
            clock,
            trail: vec![ScanState::Idle],
        }
    }

    /// States visited by the last run, starting at `Idle`.
    pub fn trail(&self) -> &[ScanState] {
        &self.trail
    }

    pub fn state(&self) -> ScanState {
        self.trail.last().copied().unwrap_or(ScanState::Idle)
    }

    fn enter(&mut self, state: ScanState) {
        log::debug!("scan state {:?} -> {state:?}", self.state());
        self.trail.push(state);
    }

    fn abort(&mut self, log: &mut ScanLog, err: ScanError) -> ScanError {
        log.record(Level::Error, format_args!("Scan aborted: {err}"));
        self.enter(ScanState::Aborted);
        err
    }

    fn validate(
        &mut self,
        request: &ScanRequest,
        log: &mut ScanLog,
    ) -> Result<Vec<Position>, ScanError> {
        self.trail = vec![ScanState::Idle];
        self.enter(ScanState::Validating);
        let step = self.config.steps.for_objective(request.objective);
        log.record(
            Level::Info,
            format_args!(
                "Using step size for {}: X_STEP={}, Y_STEP={}",
                request.objective, step.x_step, step.y_step
            ),
        );
        plan(request, &self.config.hard_boundary(), step)
            .map_err(|err| self.abort(log, err.into()))
    }

    /// Plan only. No hardware is touched and no folder is created.
    pub fn dry_run(&mut self, request: &ScanRequest) -> Result<Vec<Position>, ScanError> {
        let mut log = ScanLog::console();
        let positions = self.validate(request, &mut log)?;
        log.record(
            Level::Info,
            format_args!(
                "Dry run: would scan {} tiles from ({}, {}) to ({}, {})",
                positions.len(),
                request.x_left,
                request.y_top,
                request.x_right,
                request.y_bottom
            ),
        );
        self.enter(ScanState::Done);
        Ok(positions)
    }

    /// Run a full scan, capturing with `camera`.
    ///
    /// The camera is opened after the turret is in place and released before
    /// returning, on every path that opened it.
    pub fn run<C: Camera + ?Sized>(
        &mut self,
        request: &ScanRequest,
        camera: &mut C,
    ) -> Result<ScanReport, ScanError> {
        let mut console = ScanLog::console();
        let positions = self.validate(request, &mut console)?;

        self.enter(ScanState::AcquiringObjective);
        let setup = set_control_mode(&mut *self.hardware, &self.config.devices)
            .and_then(|()| {
                switch_objective(&mut *self.hardware, &self.config.devices, request.objective)
            })
            .and_then(|()| {
                camera
                    .open(self.config.scan_resolution)
                    .map_err(ScanError::CameraUnavailable)
            });
        if let Err(err) = setup {
            return Err(self.abort(&mut console, err));
        }

        self.enter(ScanState::Scanning);
        let mut session =
            match ScanSession::create(&self.config.output_root, request.objective, Local::now()) {
                Ok(session) => session,
                Err(err) => {
                    camera.release();
                    return Err(self.abort(&mut console, err.into()));
                }
            };
        let folder = session.folder().to_path_buf();
        session.log().record(
            Level::Info,
            format_args!(
                "Scanning {} positions with {} into {}",
                positions.len(),
                request.objective,
                folder.display()
            ),
        );

        let progress = self.capture_all(&positions, request.objective, camera, &mut session);
        camera.release();

        let progress = match progress {
            Ok(progress) => progress,
            Err(err) => {
                if let Err(io) = session.write_manifest(Local::now()) {
                    session
                        .log()
                        .record(Level::Error, format_args!("failed to write manifest: {io}"));
                }
                return Err(self.abort(session.log(), err));
            }
        };

        self.enter(ScanState::Finalizing);
        let manifest_path = match session.write_manifest(Local::now()) {
            Ok(path) => path,
            Err(err) => return Err(self.abort(session.log(), err.into())),
        };
        let saved = session.entries().len();
        session.log().record(
            Level::Info,
            format_args!(
                "Scan complete: {saved} of {} tiles saved in {}",
                progress.tiles_attempted,
                folder.display()
            ),
        );
        self.enter(ScanState::Done);

        Ok(ScanReport {
            folder,
            manifest_path,
            log_path: session.log_path().map(PathBuf::from),
            planned: positions.len(),
            tiles: session.entries().to_vec(),
            skipped: progress.skipped,
            unsettled: progress.unsettled,
        })
    }

    fn capture_all<C: Camera + ?Sized>(
        &mut self,
        positions: &[Position],
        objective: Objective,
        camera: &mut C,
        session: &mut ScanSession,
    ) -> Result<Progress, ScanError> {
        let mut progress = Progress {
            tiles_attempted: 0,
            skipped: Vec::new(),
            unsettled: Vec::new(),
        };

        for (i, &position) in positions.iter().enumerate() {
            let index = i + 1;
            if self.context.stop_requested() {
                return Err(ScanError::Cancelled {
                    completed: i,
                    planned: positions.len(),
                });
            }

            let settle = move_and_settle(
                &mut *self.hardware,
                self.clock,
                position,
                &self.config.settle,
                session.log(),
            )
            .map_err(|source| ScanError::Hardware {
                index,
                position,
                source,
            })?;
            if !settle.reached {
                progress.unsettled.push(index);
            }
            if index == 1 {
                self.clock.sleep(self.config.first_move_grace());
            }

            // One consistent white-balance state per tile.
            let white_balance = self.context.white_balance();
            progress.tiles_attempted += 1;
            match capture_tile(
                camera,
                &white_balance,
                objective,
                session.folder(),
                index,
                position,
            ) {
                Ok(tile) => session.record_tile(&tile),
                Err(err) => {
                    session.log().record(Level::Error, &err);
                    progress.skipped.push(index);
                }
            }
        }
        Ok(progress)
    }
}

//! Move the stage and wait for it to settle.

use std::time::Duration;

use log::Level;
use scanscope_core::Position;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::hardware::{HardwareControl, HardwareError};
use crate::session::ScanLog;

/// Settle criteria for one move.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleParams {
    /// Both axes must be closer than this to the target, in microns.
    pub tolerance_um: f64,
    pub timeout_s: f64,
    pub poll_interval_s: f64,
}

impl Default for SettleParams {
    fn default() -> Self {
        Self {
            tolerance_um: 50.0,
            timeout_s: 5.0,
            poll_interval_s: 0.1,
        }
    }
}

impl SettleParams {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_s)
    }

    /// Number of poll intervals before giving up.
    pub fn max_polls(&self) -> u32 {
        (self.timeout_s / self.poll_interval_s).round() as u32
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(self.poll_interval_s.is_finite() && self.poll_interval_s > 0.0) {
            return Err("settle.poll_interval_s must be > 0".to_owned());
        }
        if !(self.timeout_s.is_finite() && self.timeout_s >= 0.0) {
            return Err("settle.timeout_s must be >= 0".to_owned());
        }
        if !(self.tolerance_um.is_finite() && self.tolerance_um > 0.0) {
            return Err("settle.tolerance_um must be > 0".to_owned());
        }
        Ok(())
    }
}

/// Result of one move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SettleOutcome {
    /// `false` when the timeout expired first. The scan proceeds anyway.
    pub reached: bool,
    pub elapsed: Duration,
    /// Poll intervals waited.
    pub polls: u32,
}

/// Command an absolute move to `target` and poll until both axes are within
/// tolerance or `max_polls` intervals have passed.
///
/// Writes exactly one entry to `log`. Only controller failures are errors;
/// a timeout is reported through [`SettleOutcome::reached`].
pub fn move_and_settle<H, C>(
    hardware: &mut H,
    clock: &C,
    target: Position,
    params: &SettleParams,
    log: &mut ScanLog,
) -> Result<SettleOutcome, HardwareError>
where
    H: HardwareControl + ?Sized,
    C: Clock + ?Sized,
{
    let (tx, ty) = (target.x as f64, target.y as f64);
    hardware.set_xy_position(tx, ty)?;

    let started = clock.now();
    let max_polls = params.max_polls();
    let mut polls = 0;
    let mut reached = false;
    while polls < max_polls {
        let x = hardware.get_x_position()?;
        let y = hardware.get_y_position()?;
        if (x - tx).abs() < params.tolerance_um && (y - ty).abs() < params.tolerance_um {
            reached = true;
            break;
        }
        clock.sleep(params.poll_interval());
        polls += 1;
    }
    let elapsed = clock.now().saturating_sub(started);

    if reached {
        log.record(
            Level::Info,
            format_args!(
                "Stage reached {target} in {:.1} sec.",
                elapsed.as_secs_f64()
            ),
        );
    } else {
        log.record(
            Level::Warn,
            format_args!("Stage move timeout at {target}, proceeding anyway."),
        );
    }

    Ok(SettleOutcome {
        reached,
        elapsed,
        polls,
    })
}

//! JSON configuration for the acquisition tool.

use crate::hardware::Resolution;
use crate::motion::SettleParams;
use scanscope_core::{HardBoundary, ScanRequest, StepTable, DEFAULT_BOUNDARY_CORNERS};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Device and property names used on the controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceNames {
    /// Hub whose control mode must allow computer commands.
    pub hub: String,
    pub control_property: String,
    /// Mode value that keeps manual controls live while accepting commands.
    pub control_mode: String,
    pub objective: String,
    pub objective_property: String,
}

impl Default for DeviceNames {
    fn default() -> Self {
        Self {
            hub: "OlympusHub".to_owned(),
            control_property: "Control".to_owned(),
            control_mode: "Manual + Computer".to_owned(),
            objective: "Objective".to_owned(),
            objective_property: "Label".to_owned(),
        }
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("ScanOutputs")
}

/// Everything a scan needs besides the request itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Measured corners of the usable stage area, in microns.
    pub boundary_corners: [[i64; 2]; 4],
    pub steps: StepTable,
    pub settle: SettleParams,
    /// Extra wait after the first move of a scan, in seconds.
    pub first_move_grace_s: f64,
    pub output_root: PathBuf,
    /// Local port of the controller bridge. Reserved for a driver binding;
    /// the simulated controller ignores it.
    pub controller_port: u16,
    pub devices: DeviceNames,
    pub scan_resolution: Resolution,
    pub preview_resolution: Resolution,
    /// Values offered by the input form.
    pub default_request: ScanRequest,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            boundary_corners: DEFAULT_BOUNDARY_CORNERS,
            steps: StepTable::default(),
            settle: SettleParams::default(),
            first_move_grace_s: 2.0,
            output_root: default_output_root(),
            controller_port: 4827,
            devices: DeviceNames::default(),
            scan_resolution: Resolution::SCAN,
            preview_resolution: Resolution::PREVIEW,
            default_request: ScanRequest::default(),
        }
    }
}

impl ScanConfig {
    /// Load a JSON config from disk and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, step) in [
            ("4x", self.steps.x4),
            ("20x", self.steps.x20),
            ("fallback", self.steps.fallback),
        ] {
            if step.x_step <= 0 || step.y_step <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "step size for {label} must be positive"
                )));
            }
        }
        self.settle.validate().map_err(ConfigError::Invalid)?;
        if !self.first_move_grace_s.is_finite() || self.first_move_grace_s < 0.0 {
            return Err(ConfigError::Invalid(
                "first_move_grace_s must be >= 0".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn hard_boundary(&self) -> HardBoundary {
        HardBoundary::from_corners(&self.boundary_corners)
    }

    pub fn first_move_grace(&self) -> Duration {
        Duration::from_secs_f64(self.first_move_grace_s)
    }
}

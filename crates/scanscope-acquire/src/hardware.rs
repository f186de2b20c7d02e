//! Capabilities consumed from the microscope: the stage/turret controller
//! and the camera.
//!
//! Both are synchronous, RPC-like handles. Drivers live outside this crate;
//! [`crate::sim`] provides in-process stand-ins.

use scanscope_core::Frame;
use serde::{Deserialize, Serialize};

/// Errors reported by the stage/turret controller.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    #[error("controller unreachable on port {port}")]
    Unreachable { port: u16 },
    #[error("device '{device}' rejected {property}='{value}': {reason}")]
    PropertyRejected {
        device: String,
        property: String,
        value: String,
        reason: String,
    },
    #[error("device '{device}' did not become ready: {reason}")]
    DeviceNotReady { device: String, reason: String },
    #[error("stage command failed: {0}")]
    Stage(String),
}

/// Stage and objective controller.
pub trait HardwareControl {
    fn set_property(&mut self, device: &str, property: &str, value: &str)
        -> Result<(), HardwareError>;

    /// Block until `device` finished its last command.
    fn wait_for_device(&mut self, device: &str) -> Result<(), HardwareError>;

    /// Start an absolute XY move. Returns once the command is accepted.
    fn set_xy_position(&mut self, x: f64, y: f64) -> Result<(), HardwareError>;

    fn get_x_position(&mut self) -> Result<f64, HardwareError>;

    fn get_y_position(&mut self) -> Result<f64, HardwareError>;
}

/// Errors reported by a camera handle.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera not detected")]
    NotDetected,
    #[error("camera is not open")]
    NotOpen,
    #[error("frame read failed: {0}")]
    ReadFailed(String),
}

/// Requested sensor output size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const SCAN: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };
    pub const PREVIEW: Resolution = Resolution {
        width: 960,
        height: 540,
    };
}

/// A camera handle. Only one handle may be open for capture at a time.
pub trait Camera {
    fn open(&mut self, resolution: Resolution) -> Result<(), CameraError>;

    /// Read exactly one BGR frame.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    fn release(&mut self);
}

//! In-process stand-ins for the microscope: a stage that settles after a
//! fixed number of polls, a synthetic camera and a manual clock.
//!
//! Used for dry runs on a workstation without hardware and in tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use scanscope_core::Frame;

use crate::clock::Clock;
use crate::hardware::{Camera, CameraError, HardwareControl, HardwareError, Resolution};

/// Clock that only advances when slept on.
#[derive(Debug, Default)]
pub struct FakeClock {
    nanos: AtomicU64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// XY stage and turret model.
///
/// After `set_xy_position`, the stage reports its previous position for
/// `polls_to_settle` polls (one poll = an x read followed by a y read) and
/// the target afterwards. `None` never settles.
#[derive(Debug, Clone)]
pub struct SimulatedStage {
    position: (f64, f64),
    target: (f64, f64),
    pending_polls: Option<u32>,
    polls_to_settle: Option<u32>,
    properties: HashMap<(String, String), String>,
    rejected_devices: BTreeSet<String>,
    moves: Vec<(f64, f64)>,
    position_reads: usize,
}

impl SimulatedStage {
    pub fn new(polls_to_settle: Option<u32>) -> Self {
        Self {
            position: (0.0, 0.0),
            target: (0.0, 0.0),
            pending_polls: Some(0),
            polls_to_settle,
            properties: HashMap::new(),
            rejected_devices: BTreeSet::new(),
            moves: Vec::new(),
            position_reads: 0,
        }
    }

    /// Every `set_property`/`wait_for_device` on `device` fails.
    pub fn reject_device(mut self, device: &str) -> Self {
        self.rejected_devices.insert(device.to_owned());
        self
    }

    pub fn property(&self, device: &str, property: &str) -> Option<&str> {
        self.properties
            .get(&(device.to_owned(), property.to_owned()))
            .map(String::as_str)
    }

    /// Commanded targets, in order.
    pub fn moves(&self) -> &[(f64, f64)] {
        &self.moves
    }

    /// Number of y reads, i.e. completed polls.
    pub fn position_reads(&self) -> usize {
        self.position_reads
    }

    fn check_device(&self, device: &str) -> Result<(), String> {
        if self.rejected_devices.contains(device) {
            Err(format!("{device} is not responding"))
        } else {
            Ok(())
        }
    }
}

impl HardwareControl for SimulatedStage {
    fn set_property(
        &mut self,
        device: &str,
        property: &str,
        value: &str,
    ) -> Result<(), HardwareError> {
        self.check_device(device)
            .map_err(|reason| HardwareError::PropertyRejected {
                device: device.to_owned(),
                property: property.to_owned(),
                value: value.to_owned(),
                reason,
            })?;
        self.properties
            .insert((device.to_owned(), property.to_owned()), value.to_owned());
        Ok(())
    }

    fn wait_for_device(&mut self, device: &str) -> Result<(), HardwareError> {
        self.check_device(device)
            .map_err(|reason| HardwareError::DeviceNotReady {
                device: device.to_owned(),
                reason,
            })
    }

    fn set_xy_position(&mut self, x: f64, y: f64) -> Result<(), HardwareError> {
        self.target = (x, y);
        self.pending_polls = self.polls_to_settle;
        self.moves.push((x, y));
        Ok(())
    }

    fn get_x_position(&mut self) -> Result<f64, HardwareError> {
        if self.pending_polls == Some(0) {
            self.position = self.target;
        }
        Ok(self.position.0)
    }

    fn get_y_position(&mut self) -> Result<f64, HardwareError> {
        self.position_reads += 1;
        let y = self.position.1;
        if let Some(n) = self.pending_polls.as_mut() {
            *n = n.saturating_sub(1);
        }
        Ok(y)
    }
}

/// Camera producing a moving gradient, with scripted read failures.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCamera {
    resolution: Option<Resolution>,
    detected: bool,
    reads: usize,
    failing_reads: BTreeSet<usize>,
    opened: usize,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            detected: true,
            ..Self::default()
        }
    }

    /// A camera whose `open` always fails.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Make the given 1-based reads fail.
    pub fn fail_reads(mut self, reads: impl IntoIterator<Item = usize>) -> Self {
        self.failing_reads.extend(reads);
        self
    }

    pub fn is_open(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn times_opened(&self) -> usize {
        self.opened
    }
}

impl Camera for SyntheticCamera {
    fn open(&mut self, resolution: Resolution) -> Result<(), CameraError> {
        if !self.detected {
            return Err(CameraError::NotDetected);
        }
        log::debug!(
            "camera resolution set to {}x{}",
            resolution.width,
            resolution.height
        );
        self.resolution = Some(resolution);
        self.opened += 1;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let res = self.resolution.ok_or(CameraError::NotOpen)?;
        self.reads += 1;
        if self.failing_reads.contains(&self.reads) {
            return Err(CameraError::ReadFailed(format!("read {} dropped", self.reads)));
        }

        let (w, h) = (res.width as usize, res.height as usize);
        let shift = self.reads;
        let mut data = Vec::with_capacity(w * h * Frame::CHANNELS);
        for y in 0..h {
            for x in 0..w {
                let v = ((x + y + shift) % 256) as u8;
                data.extend_from_slice(&[v, v / 2 + 64, 255 - v]);
            }
        }
        Ok(Frame {
            width: w,
            height: h,
            data,
        })
    }

    fn release(&mut self) {
        self.resolution = None;
    }
}

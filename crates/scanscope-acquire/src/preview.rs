//! Live preview loop.
//!
//! The preview owns its own camera handle and must be stopped (and its
//! thread joined) before a scan opens the camera for capture.

use scanscope_core::Frame;

use crate::context::SessionContext;
use crate::hardware::{Camera, CameraError, Resolution};

/// What the display asks the loop to do after showing a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewControl {
    Continue,
    /// Quit key pressed or window closed.
    Stop,
}

/// Stream frames to `show` while the context's preview flag is set.
///
/// Each raw frame is kept as the patch-picker snapshot; `show` receives the
/// white-balanced frame. Returns the number of frames shown. A failed read
/// ends the loop like a closed stream.
pub fn run_preview<C, F>(
    camera: &mut C,
    context: &SessionContext,
    resolution: Resolution,
    mut show: F,
) -> Result<usize, CameraError>
where
    C: Camera + ?Sized,
    F: FnMut(&Frame) -> PreviewControl,
{
    camera.open(resolution)?;

    let mut shown = 0;
    while context.preview_running() {
        let frame = match camera.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("preview stream ended: {err}");
                break;
            }
        };
        let display = context.white_balance().correct(&frame);
        context.store_snapshot(frame);
        shown += 1;
        if show(&display) == PreviewControl::Stop {
            context.stop_preview();
        }
    }

    camera.release();
    Ok(shown)
}

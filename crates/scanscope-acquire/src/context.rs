//! State shared between the interactive side (form, preview, patch picker)
//! and the acquisition side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use scanscope_core::{patch_medians, Frame, PatchRegion, WhiteBalance, WhiteBalanceEvent};

/// Shared session context, usually held in an `Arc`.
///
/// White balance has a single writer (the picker) and many readers (preview
/// and capture). Readers take a copy, so a capture sees one consistent state
/// for the whole frame.
#[derive(Debug, Default)]
pub struct SessionContext {
    white_balance: RwLock<WhiteBalance>,
    preview_running: AtomicBool,
    stop_requested: AtomicBool,
    snapshot: Mutex<Option<Frame>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn white_balance(&self) -> WhiteBalance {
        *self
            .white_balance
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_white_balance(&self, wb: WhiteBalance) {
        *self
            .white_balance
            .write()
            .unwrap_or_else(PoisonError::into_inner) = wb;
    }

    pub fn apply_white_balance(&self, event: WhiteBalanceEvent) {
        self.white_balance
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event);
    }

    /// Begin a new patch selection with `gain`; clears any previous reference.
    pub fn begin_patch_selection(&self, gain: f32) {
        log::info!("patch selection enabled with gain {gain}");
        self.apply_white_balance(WhiteBalanceEvent::SelectionStarted { gain });
    }

    /// Finish a patch drawn on the (rotated) preview display.
    ///
    /// Medians are taken from the last preview snapshot. Returns the event
    /// that was applied.
    pub fn select_patch(&self, display_region: PatchRegion) -> WhiteBalanceEvent {
        let medians = self.with_snapshot(|frame| {
            let region = display_region.unrotate(frame.width, frame.height);
            patch_medians(&frame.view(), region)
        });
        let event = match medians.flatten() {
            Some(medians) => WhiteBalanceEvent::PatchSelected { medians },
            None => WhiteBalanceEvent::PatchEmpty,
        };
        self.apply_white_balance(event);
        event
    }

    pub fn store_snapshot(&self, frame: Frame) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    /// Run `f` on the last preview frame, if any.
    pub fn with_snapshot<T>(&self, f: impl FnOnce(&Frame) -> T) -> Option<T> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }

    pub fn start_preview(&self) {
        self.preview_running.store(true, Ordering::Release);
    }

    /// Ask the preview loop to exit at its next check.
    pub fn stop_preview(&self) {
        self.preview_running.store(false, Ordering::Release);
    }

    pub fn preview_running(&self) -> bool {
        self.preview_running.load(Ordering::Acquire)
    }

    /// Ask a running scan to stop before its next position.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_without_snapshot_is_empty() {
        let ctx = SessionContext::new();
        ctx.begin_patch_selection(1.2);
        let event = ctx.select_patch(PatchRegion::from_corners((0, 0), (4, 4)));
        assert_eq!(event, WhiteBalanceEvent::PatchEmpty);
        assert!(!ctx.white_balance().is_active());
    }

    #[test]
    fn patch_on_snapshot_enables_correction() {
        let ctx = SessionContext::new();
        ctx.store_snapshot(Frame::filled(16, 8, [40, 50, 60]));
        ctx.begin_patch_selection(1.1);
        let event = ctx.select_patch(PatchRegion::from_corners((2, 2), (6, 5)));
        assert_eq!(
            event,
            WhiteBalanceEvent::PatchSelected {
                medians: [40.0, 50.0, 60.0]
            }
        );
        let wb = ctx.white_balance();
        assert!(wb.is_active());
        assert_eq!(wb.gain(), Some(1.1));
    }

    #[test]
    fn flags_toggle() {
        let ctx = SessionContext::new();
        assert!(!ctx.preview_running());
        ctx.start_preview();
        assert!(ctx.preview_running());
        ctx.stop_preview();
        assert!(!ctx.preview_running());

        ctx.request_stop();
        assert!(ctx.stop_requested());
        ctx.clear_stop();
        assert!(!ctx.stop_requested());
    }
}

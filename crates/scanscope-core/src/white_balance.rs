//! Linear per-channel white-balance correction.
//!
//! A reference patch is picked on the live preview; its per-channel medians
//! times a user gain define the value that maps to full scale:
//!
//! `out = clamp(px / (median * gain), 0, 1) * 255`
//!
//! The state only changes through [`WhiteBalance::apply`] (events from the
//! patch picker) or the explicit setters. [`WhiteBalance::correct`] never
//! mutates it.

use crate::frame::Frame;
use serde::{Deserialize, Serialize};

/// Events produced by the interactive patch picker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WhiteBalanceEvent {
    /// The user confirmed a gain and started drawing a new patch.
    SelectionStarted { gain: f32 },
    /// A patch was drawn; medians are per B, G, R channel.
    PatchSelected { medians: [f32; 3] },
    /// The drawn patch contained no pixels.
    PatchEmpty,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteBalance {
    pub enabled: bool,
    pub reference_medians: Option<[f32; 3]>,
    pub gain_scale: Option<f32>,
}

impl WhiteBalance {
    /// Store a reference and enable correction. Any positive scale is accepted.
    pub fn set_reference(&mut self, medians: [f32; 3], scale: f32) {
        self.reference_medians = Some(medians);
        self.gain_scale = Some(scale);
        self.enabled = true;
    }

    /// Drop the reference and disable correction. The gain is kept.
    pub fn clear(&mut self) {
        self.enabled = false;
        self.reference_medians = None;
    }

    /// `true` when [`correct`](Self::correct) would change pixels.
    pub fn is_active(&self) -> bool {
        self.target().is_some()
    }

    /// Gain currently configured, whether or not correction is active.
    pub fn gain(&self) -> Option<f32> {
        self.gain_scale
    }

    fn target(&self) -> Option<[f32; 3]> {
        if !self.enabled {
            return None;
        }
        let medians = self.reference_medians?;
        let scale = self.gain_scale?;
        if !(scale.is_finite() && scale > 0.0) || medians.iter().any(|&m| m == 0.0) {
            return None;
        }
        Some(medians.map(|m| m * scale))
    }

    /// Reduce one picker event into the state.
    pub fn apply(&mut self, event: WhiteBalanceEvent) {
        match event {
            WhiteBalanceEvent::SelectionStarted { gain } => {
                self.clear();
                self.gain_scale = Some(gain);
            }
            WhiteBalanceEvent::PatchSelected { medians } => {
                self.reference_medians = Some(medians);
                self.enabled = true;
                log::info!("white balance enabled with medians {medians:?}");
            }
            WhiteBalanceEvent::PatchEmpty => {
                self.enabled = false;
                log::warn!("empty white balance patch selected");
            }
        }
    }

    /// Corrected copy of `frame`, or an unchanged copy when inactive.
    pub fn correct(&self, frame: &Frame) -> Frame {
        let Some(target) = self.target() else {
            return frame.clone();
        };
        let data = frame
            .data
            .chunks_exact(Frame::CHANNELS)
            .flat_map(|px| {
                let mut out = [0u8; 3];
                for c in 0..Frame::CHANNELS {
                    let v = (px[c] as f32 / target[c]).clamp(0.0, 1.0);
                    out[c] = (v * 255.0) as u8;
                }
                out
            })
            .collect();
        Frame {
            width: frame.width,
            height: frame.height,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> Frame {
        let data = (0..4 * 3 * 3).map(|v| (v * 7 % 256) as u8).collect();
        Frame::from_raw(4, 3, data).expect("frame")
    }

    #[test]
    fn inactive_state_passes_frame_through() {
        let frame = gradient();
        let states = [
            WhiteBalance::default(),
            WhiteBalance {
                enabled: true,
                reference_medians: None,
                gain_scale: Some(1.2),
            },
            WhiteBalance {
                enabled: true,
                reference_medians: Some([100.0, 0.0, 90.0]),
                gain_scale: Some(1.2),
            },
            WhiteBalance {
                enabled: true,
                reference_medians: Some([100.0, 80.0, 90.0]),
                gain_scale: Some(0.0),
            },
            WhiteBalance {
                enabled: false,
                reference_medians: Some([100.0, 80.0, 90.0]),
                gain_scale: Some(1.0),
            },
        ];
        for wb in states {
            assert!(!wb.is_active());
            assert_eq!(wb.correct(&frame), frame);
        }
    }

    #[test]
    fn reference_patch_maps_to_full_scale() {
        let mut wb = WhiteBalance::default();
        wb.set_reference([100.0, 120.0, 80.0], 1.25);
        let frame = Frame::filled(3, 2, [125, 150, 100]);
        let out = wb.correct(&frame);
        assert!(out.data.iter().all(|&v| v == 255), "{:?}", out.data);
    }

    #[test]
    fn correction_is_linear_and_clamped() {
        let mut wb = WhiteBalance::default();
        wb.set_reference([200.0, 200.0, 200.0], 1.0);
        let mut frame = Frame::filled(2, 1, [0, 0, 0]);
        frame.set_pixel(0, 0, [100, 50, 0]);
        frame.set_pixel(1, 0, [250, 200, 255]);
        let out = wb.correct(&frame);
        assert_eq!(out.pixel(0, 0), [127, 63, 0]);
        assert_eq!(out.pixel(1, 0), [255, 255, 255]);
    }

    #[test]
    fn new_selection_clears_stale_reference() {
        let mut wb = WhiteBalance::default();
        wb.apply(WhiteBalanceEvent::SelectionStarted { gain: 1.2 });
        wb.apply(WhiteBalanceEvent::PatchSelected {
            medians: [90.0, 95.0, 100.0],
        });
        assert!(wb.is_active());

        wb.apply(WhiteBalanceEvent::SelectionStarted { gain: 0.9 });
        assert!(!wb.is_active());
        assert_eq!(wb.reference_medians, None);
        assert_eq!(wb.gain(), Some(0.9));
    }

    #[test]
    fn empty_patch_disables_correction() {
        let mut wb = WhiteBalance::default();
        wb.set_reference([1.0, 1.0, 1.0], 1.0);
        wb.apply(WhiteBalanceEvent::PatchEmpty);
        assert!(!wb.is_active());
    }

    #[test]
    fn correct_does_not_mutate_state() {
        let mut wb = WhiteBalance::default();
        wb.set_reference([50.0, 60.0, 70.0], 1.1);
        let before = wb;
        let _ = wb.correct(&gradient());
        assert_eq!(wb, before);
    }
}

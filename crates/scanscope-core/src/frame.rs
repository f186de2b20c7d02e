/// A camera frame: three interleaved 8-bit channels in camera-native
/// B, G, R order, row-major, `data.len() == width * height * 3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Borrowed view over a [`Frame`]-shaped buffer.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wrap a raw BGR buffer, returning `None` when its length does not match.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        let expected = width.checked_mul(height)?.checked_mul(Self::CHANNELS)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Frame filled with a single BGR value.
    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let data = bgr
            .iter()
            .copied()
            .cycle()
            .take(width * height * Self::CHANNELS)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * Self::CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, bgr: [u8; 3]) {
        let i = (y * self.width + x) * Self::CHANNELS;
        self.data[i..i + Self::CHANNELS].copy_from_slice(&bgr);
    }
}

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PatchRegion {
    /// Rectangle spanned by two drag end points, in any order.
    pub fn from_corners(a: (usize, usize), b: (usize, usize)) -> Self {
        Self {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            width: a.0.abs_diff(b.0),
            height: a.1.abs_diff(b.1),
        }
    }

    /// Map a rectangle drawn on the 180°-rotated display back to sensor
    /// coordinates of a `width` × `height` frame.
    pub fn unrotate(self, width: usize, height: usize) -> Self {
        let x_end = (self.x + self.width).min(width);
        let y_end = (self.y + self.height).min(height);
        Self {
            x: width - x_end,
            y: height - y_end,
            width: x_end.saturating_sub(self.x),
            height: y_end.saturating_sub(self.y),
        }
    }
}

/// Per-channel medians of `region`, clipped to the frame.
///
/// Returns `None` for an empty patch. With an even pixel count the median
/// is the mean of the two middle values.
pub fn patch_medians(frame: &FrameView<'_>, region: PatchRegion) -> Option<[f32; 3]> {
    let x_end = (region.x + region.width).min(frame.width);
    let y_end = (region.y + region.height).min(frame.height);
    if region.x >= x_end || region.y >= y_end {
        return None;
    }

    let n = (x_end - region.x) * (y_end - region.y);
    let mut channels: [Vec<u8>; 3] = std::array::from_fn(|_| Vec::with_capacity(n));
    for y in region.y..y_end {
        let row = y * frame.width;
        for x in region.x..x_end {
            let i = (row + x) * Frame::CHANNELS;
            for (c, values) in channels.iter_mut().enumerate() {
                values.push(frame.data[i + c]);
            }
        }
    }

    Some(channels.map(|mut values| median_u8(&mut values)))
}

fn median_u8(values: &mut [u8]) -> f32 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid] as f32
    } else {
        (values[mid - 1] as f32 + values[mid] as f32) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_raw_checks_length() {
        assert!(Frame::from_raw(2, 2, vec![0; 12]).is_some());
        assert!(Frame::from_raw(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn medians_of_uniform_patch() {
        let frame = Frame::filled(8, 6, [10, 20, 30]);
        let m = patch_medians(
            &frame.view(),
            PatchRegion {
                x: 1,
                y: 1,
                width: 3,
                height: 2,
            },
        );
        assert_eq!(m, Some([10.0, 20.0, 30.0]));
    }

    #[test]
    fn even_count_median_averages_middle_values() {
        let mut frame = Frame::filled(2, 1, [0, 0, 0]);
        frame.set_pixel(0, 0, [10, 0, 5]);
        frame.set_pixel(1, 0, [20, 1, 5]);
        let m = patch_medians(
            &frame.view(),
            PatchRegion {
                x: 0,
                y: 0,
                width: 2,
                height: 1,
            },
        )
        .expect("non-empty patch");
        for (got, want) in m.into_iter().zip([15.0f32, 0.5, 5.0]) {
            assert_relative_eq!(got, want);
        }
    }

    #[test]
    fn empty_or_outside_patch_has_no_medians() {
        let frame = Frame::filled(4, 4, [1, 2, 3]);
        let zero = PatchRegion::from_corners((2, 2), (2, 3));
        assert_eq!(patch_medians(&frame.view(), zero), None);
        let outside = PatchRegion {
            x: 10,
            y: 0,
            width: 2,
            height: 2,
        };
        assert_eq!(patch_medians(&frame.view(), outside), None);
    }

    #[test]
    fn unrotate_maps_display_rectangle_to_sensor() {
        let r = PatchRegion {
            x: 0,
            y: 0,
            width: 2,
            height: 1,
        };
        assert_eq!(
            r.unrotate(10, 5),
            PatchRegion {
                x: 8,
                y: 4,
                width: 2,
                height: 1,
            }
        );
    }
}

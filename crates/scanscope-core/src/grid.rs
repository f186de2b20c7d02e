//! Snake-ordered grid planning inside the hard boundary.

use crate::geometry::{AxisRange, HardBoundary, Position, ScanRequest, StepSize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Reasons a scan rectangle cannot be planned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    #[error(
        "scan area is outside the allowed boundaries \
         (allowed x {allowed_x}, got {requested_x}; allowed y {allowed_y}, got {requested_y})"
    )]
    OutOfBounds {
        allowed_x: AxisRange,
        allowed_y: AxisRange,
        requested_x: AxisRange,
        requested_y: AxisRange,
    },
    #[error("scan area is inverted (x {requested_x}, y {requested_y})")]
    InvertedRange {
        requested_x: AxisRange,
        requested_y: AxisRange,
    },
    #[error("step sizes must be positive (got x={x_step}, y={y_step})")]
    InvalidStep { x_step: i64, y_step: i64 },
}

/// Column x-coordinates shared by every row: `x_left` stepped by `x_step`,
/// never past `x_right`.
pub fn column_positions(x_left: i64, x_right: i64, x_step: i64) -> Vec<i64> {
    if x_step <= 0 || x_left > x_right {
        return Vec::new();
    }
    (x_left..=x_right).step_by(x_step as usize).collect()
}

/// Row y-coordinates from `y_top` down to `y_bottom`, inclusive.
pub fn row_positions(y_top: i64, y_bottom: i64, y_step: i64) -> Vec<i64> {
    if y_step <= 0 || y_top < y_bottom {
        return Vec::new();
    }
    let count = (y_top - y_bottom) / y_step + 1;
    (0..count).map(|r| y_top - r * y_step).collect()
}

/// Plan the capture order for `request`.
///
/// Rows run from `y_top` downwards. Row 0 goes left to right, each following
/// row reverses direction. Every row uses the same column set so tiles line
/// up vertically.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(boundary), fields(objective = %request.objective))
)]
pub fn plan(
    request: &ScanRequest,
    boundary: &HardBoundary,
    step: StepSize,
) -> Result<Vec<Position>, BoundaryError> {
    let (bx, by) = (boundary.x(), boundary.y());
    if request.x_left < bx.min
        || request.x_right > bx.max
        || request.y_bottom < by.min
        || request.y_top > by.max
    {
        return Err(BoundaryError::OutOfBounds {
            allowed_x: bx,
            allowed_y: by,
            requested_x: request.x_range(),
            requested_y: request.y_range(),
        });
    }
    if request.x_left > request.x_right || request.y_bottom > request.y_top {
        return Err(BoundaryError::InvertedRange {
            requested_x: request.x_range(),
            requested_y: request.y_range(),
        });
    }
    if step.x_step <= 0 || step.y_step <= 0 {
        return Err(BoundaryError::InvalidStep {
            x_step: step.x_step,
            y_step: step.y_step,
        });
    }

    let columns = column_positions(request.x_left, request.x_right, step.x_step);
    let rows = row_positions(request.y_top, request.y_bottom, step.y_step);

    let mut positions = Vec::with_capacity(columns.len() * rows.len());
    for (r, &y) in rows.iter().enumerate() {
        if r % 2 == 0 {
            positions.extend(columns.iter().map(|&x| Position::new(x, y)));
        } else {
            positions.extend(columns.iter().rev().map(|&x| Position::new(x, y)));
        }
    }

    log::debug!(
        "planned {} positions ({} rows x {} columns)",
        positions.len(),
        rows.len(),
        columns.len()
    );
    Ok(positions)
}

//! Stage-space types: positions, objectives, step sizes and the hard boundary.
//!
//! All coordinates are integer stage microns as reported by the XY stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stage position in microns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    #[inline]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Objective lenses mounted on the turret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Objective {
    #[serde(rename = "4x")]
    #[default]
    X4,
    #[serde(rename = "20x")]
    X20,
}

impl Objective {
    pub const ALL: [Objective; 2] = [Objective::X4, Objective::X20];

    /// Label used in folder names, metadata and user input.
    pub fn label(self) -> &'static str {
        match self {
            Objective::X4 => "4x",
            Objective::X20 => "20x",
        }
    }

    /// Turret position label understood by the objective device.
    pub fn turret_position(self) -> &'static str {
        match self {
            Objective::X4 => "Position-1",
            Objective::X20 => "Position-2",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown objective label '{0}' (expected one of: 4x, 20x)")]
pub struct UnknownObjective(pub String);

impl FromStr for Objective {
    type Err = UnknownObjective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Objective::ALL
            .into_iter()
            .find(|o| o.label().eq_ignore_ascii_case(label))
            .ok_or_else(|| UnknownObjective(label.to_owned()))
    }
}

/// Grid pitch in microns along each stage axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSize {
    pub x_step: i64,
    pub y_step: i64,
}

impl StepSize {
    #[inline]
    pub const fn new(x_step: i64, y_step: i64) -> Self {
        Self { x_step, y_step }
    }
}

/// Per-objective step sizes with a fallback for labels that are not known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTable {
    #[serde(rename = "4x")]
    pub x4: StepSize,
    #[serde(rename = "20x")]
    pub x20: StepSize,
    pub fallback: StepSize,
}

impl Default for StepTable {
    fn default() -> Self {
        Self {
            x4: StepSize::new(1800, 1000),
            x20: StepSize::new(200, 200),
            fallback: StepSize::new(1800, 1000),
        }
    }
}

impl StepTable {
    pub fn for_objective(&self, objective: Objective) -> StepSize {
        match objective {
            Objective::X4 => self.x4,
            Objective::X20 => self.x20,
        }
    }

    /// Look up a raw label; anything that does not parse uses `fallback`.
    pub fn for_label(&self, label: &str) -> StepSize {
        match label.parse::<Objective>() {
            Ok(objective) => self.for_objective(objective),
            Err(_) => self.fallback,
        }
    }
}

/// Inclusive integer range on one stage axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i64,
    pub max: i64,
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Safety rectangle the stage must never leave during a scan.
///
/// Built once from the four measured corners of the usable stage area. The
/// rectangle is the axis-aligned bounding box of those corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardBoundary {
    x: AxisRange,
    y: AxisRange,
}

/// Corners of the usable stage area on the reference microscope.
pub const DEFAULT_BOUNDARY_CORNERS: [[i64; 2]; 4] = [
    [98097, 391023],
    [25848, 386490],
    [26968, 359167],
    [98097, 365572],
];

impl HardBoundary {
    pub fn from_corners(corners: &[[i64; 2]; 4]) -> Self {
        let xs = corners.map(|c| c[0]);
        let ys = corners.map(|c| c[1]);
        Self {
            x: AxisRange {
                min: xs.into_iter().min().unwrap_or_default(),
                max: xs.into_iter().max().unwrap_or_default(),
            },
            y: AxisRange {
                min: ys.into_iter().min().unwrap_or_default(),
                max: ys.into_iter().max().unwrap_or_default(),
            },
        }
    }

    #[inline]
    pub fn x(&self) -> AxisRange {
        self.x
    }

    #[inline]
    pub fn y(&self) -> AxisRange {
        self.y
    }

    pub fn contains(&self, p: Position) -> bool {
        (self.x.min..=self.x.max).contains(&p.x) && (self.y.min..=self.y.max).contains(&p.y)
    }
}

impl Default for HardBoundary {
    fn default() -> Self {
        Self::from_corners(&DEFAULT_BOUNDARY_CORNERS)
    }
}

/// A user-requested scan rectangle.
///
/// `y_top` is the larger stage y; rows are visited from `y_top` down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub y_top: i64,
    pub y_bottom: i64,
    pub x_left: i64,
    pub x_right: i64,
    #[serde(default)]
    pub objective: Objective,
}

impl ScanRequest {
    pub fn x_range(&self) -> AxisRange {
        AxisRange {
            min: self.x_left,
            max: self.x_right,
        }
    }

    pub fn y_range(&self) -> AxisRange {
        AxisRange {
            min: self.y_bottom,
            max: self.y_top,
        }
    }
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            y_top: 377710,
            y_bottom: 370232,
            x_left: 35672,
            x_right: 42606,
            objective: Objective::X4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_boundary_is_bounding_box_of_corners() {
        let b = HardBoundary::default();
        assert_eq!(b.x(), AxisRange { min: 25848, max: 98097 });
        assert_eq!(b.y(), AxisRange { min: 359167, max: 391023 });
        assert!(b.contains(Position::new(25848, 391023)));
        assert!(!b.contains(Position::new(25847, 370000)));
    }

    #[test]
    fn objective_labels_round_trip() {
        for o in Objective::ALL {
            assert_eq!(o.label().parse::<Objective>(), Ok(o));
        }
        assert_eq!(" 20X ".parse::<Objective>(), Ok(Objective::X20));
        assert!("10x".parse::<Objective>().is_err());
    }

    #[test]
    fn unknown_label_uses_fallback_step() {
        let table = StepTable {
            fallback: StepSize::new(7, 9),
            ..StepTable::default()
        };
        assert_eq!(table.for_label("20x"), StepSize::new(200, 200));
        assert_eq!(table.for_label("4x"), StepSize::new(1800, 1000));
        assert_eq!(table.for_label("60x"), StepSize::new(7, 9));
    }

    #[test]
    fn objective_serializes_as_label() {
        let json = serde_json::to_string(&Objective::X20).expect("serialize");
        assert_eq!(json, "\"20x\"");
    }
}

//! Fundamental types used across the entire workspace.

use crate::error::{Result, TrackError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

/// Label of an object within a single mask. Only meaningful for that frame.
pub type TransientId = u32;

/// Process-lifetime identity of one physical object.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UniversalId(pub u64);

impl UniversalId {
    /// Background cells keep id 0 in matched masks.
    pub const BACKGROUND: UniversalId = UniversalId(0);

    /// Matched masks store universal ids as `u32` labels.
    pub fn as_label(self) -> Result<u32> {
        u32::try_from(self.0).map_err(|_| TrackError::LabelOverflow(self))
    }
}

impl fmt::Display for UniversalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Displacement
// ---------------------------------------------------------------------------

/// A displacement in grid cells ("pixels"): rows then columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Displacement {
    pub rows: f64,
    pub cols: f64,
}

impl Displacement {
    pub fn new(rows: f64, cols: f64) -> Self {
        Self { rows, cols }
    }

    pub fn norm(&self) -> f64 {
        (self.rows * self.rows + self.cols * self.cols).sqrt()
    }
}

impl std::ops::Add for Displacement {
    type Output = Displacement;
    fn add(self, rhs: Displacement) -> Displacement {
        Displacement::new(self.rows + rhs.rows, self.cols + rhs.cols)
    }
}

impl std::ops::Sub for Displacement {
    type Output = Displacement;
    fn sub(self, rhs: Displacement) -> Displacement {
        Displacement::new(self.rows - rhs.rows, self.cols - rhs.cols)
    }
}

/// Fractional (row, col) position of an object centre.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelCenter {
    pub row: f64,
    pub col: f64,
}

impl PixelCenter {
    pub fn offset(&self, d: Displacement) -> PixelCenter {
        PixelCenter {
            row: self.row + d.rows,
            col: self.col + d.cols,
        }
    }

    pub fn displacement_to(&self, other: &PixelCenter) -> Displacement {
        Displacement::new(other.row - self.row, other.col - self.col)
    }

    /// Nearest grid cell.
    pub fn rounded(&self) -> (usize, usize) {
        (self.row.round().max(0.0) as usize, self.col.round().max(0.0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_never_wrap() {
        assert_eq!(UniversalId::BACKGROUND.as_label().unwrap(), 0);
        assert_eq!(UniversalId(u32::MAX as u64).as_label().unwrap(), u32::MAX);
        let err = UniversalId((1 << 32) + 5).as_label().unwrap_err();
        assert!(matches!(err, TrackError::LabelOverflow(UniversalId(id)) if id == (1 << 32) + 5));
    }
}

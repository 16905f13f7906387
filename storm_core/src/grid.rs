//! Gridded fields and object masks.

use crate::error::{Result, TrackError};
use crate::types::TransientId;
use grid_models::{CoordinateSystem, GridOptions};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A 2-D scalar field (e.g. reflectivity in dBZ) with its coordinates.
/// Missing values are NaN.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    pub time: f64,
    pub values: DMatrix<f64>,
    /// Column coordinate per cell (longitude or x)
    pub x: DMatrix<f64>,
    /// Row coordinate per cell (latitude or y)
    pub y: DMatrix<f64>,
    pub coordinates: CoordinateSystem,
}

impl Grid {
    pub fn new(
        time: f64,
        values: DMatrix<f64>,
        x: DMatrix<f64>,
        y: DMatrix<f64>,
        coordinates: CoordinateSystem,
    ) -> Result<Self> {
        for coord in [&x, &y] {
            if coord.shape() != values.shape() {
                return Err(TrackError::Shape {
                    expected: values.shape(),
                    got: coord.shape(),
                });
            }
        }
        Ok(Self {
            time,
            values,
            x,
            y,
            coordinates,
        })
    }

    /// Build a grid whose coordinates come from the run's grid options.
    pub fn from_options(time: f64, values: DMatrix<f64>, options: &GridOptions) -> Result<Self> {
        let (x, y) = options.meshgrid();
        Self::new(time, values, x, y, options.name)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Collapse altitude levels into a column-maximum composite. Cells missing
    /// at every level stay NaN.
    pub fn column_max(levels: &[DMatrix<f64>]) -> Option<DMatrix<f64>> {
        let first = levels.first()?;
        let mut out = DMatrix::from_element(first.nrows(), first.ncols(), f64::NAN);
        for level in levels {
            if level.shape() != first.shape() {
                return None;
            }
            out.zip_apply(level, |acc, v| {
                if !v.is_nan() && (acc.is_nan() || v > *acc) {
                    *acc = v;
                }
            });
        }
        Some(out)
    }
}

/// Integer object labels: 0 is background, positive values are object ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub time: f64,
    pub labels: DMatrix<u32>,
}

impl Mask {
    pub fn new(time: f64, labels: DMatrix<u32>) -> Self {
        Self { time, labels }
    }

    pub fn empty(time: f64, shape: (usize, usize)) -> Self {
        Self::new(time, DMatrix::zeros(shape.0, shape.1))
    }

    pub fn shape(&self) -> (usize, usize) {
        self.labels.shape()
    }

    /// Distinct non-zero ids, ascending.
    pub fn ids(&self) -> Vec<TransientId> {
        let ids: BTreeSet<u32> = self.labels.iter().copied().filter(|&v| v != 0).collect();
        ids.into_iter().collect()
    }

    pub fn max_id(&self) -> TransientId {
        self.labels.iter().copied().max().unwrap_or(0)
    }

    pub fn has_objects(&self) -> bool {
        self.labels.iter().any(|&v| v != 0)
    }

    /// Apply a dense lookup table `table[old] = new` element-wise. Ids beyond
    /// the table map to background, so callers must cover every id present.
    pub fn relabel(&self, table: &[u32]) -> Mask {
        Mask {
            time: self.time,
            labels: self
                .labels
                .map(|v| table.get(v as usize).copied().unwrap_or(0)),
        }
    }
}

/// Boundary mask marking the outermost ring of cells of a domain.
pub fn edge_boundary_mask(shape: (usize, usize)) -> DMatrix<bool> {
    let (n_rows, n_cols) = shape;
    DMatrix::from_fn(n_rows, n_cols, |i, j| {
        i == 0 || j == 0 || i + 1 == n_rows || j + 1 == n_cols
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_ids_sorted_without_background() {
        let mask = Mask::new(0.0, DMatrix::from_row_slice(2, 3, &[0, 3, 3, 1, 0, 7]));
        assert_eq!(mask.ids(), vec![1, 3, 7]);
        assert_eq!(mask.max_id(), 7);
    }

    #[test]
    fn relabel_keeps_shape_and_background() {
        let mask = Mask::new(5.0, DMatrix::from_row_slice(2, 2, &[0, 1, 2, 0]));
        let out = mask.relabel(&[0, 10, 20]);
        assert_eq!(out.labels, DMatrix::from_row_slice(2, 2, &[0, 10, 20, 0]));
        assert_eq!(out.time, 5.0);
    }

    #[test]
    fn column_max_ignores_nan() {
        let a = DMatrix::from_row_slice(1, 3, &[1.0, f64::NAN, f64::NAN]);
        let b = DMatrix::from_row_slice(1, 3, &[0.5, 2.0, f64::NAN]);
        let out = Grid::column_max(&[a, b]).unwrap();
        assert_eq!(out[(0, 0)], 1.0);
        assert_eq!(out[(0, 1)], 2.0);
        assert!(out[(0, 2)].is_nan());
    }

    #[test]
    fn grid_rejects_mismatched_coordinates() {
        let values = DMatrix::zeros(2, 2);
        let x = DMatrix::zeros(2, 3);
        let y = DMatrix::zeros(2, 2);
        assert!(Grid::new(0.0, values, x, y, CoordinateSystem::Cartesian).is_err());
    }

    #[test]
    fn edge_boundary_marks_outer_ring() {
        let b = edge_boundary_mask((3, 4));
        assert_eq!(b.iter().filter(|&&v| v).count(), 10);
        assert!(!b[(1, 1)] && !b[(1, 2)]);
    }
}

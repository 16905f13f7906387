//! Grid options: horizontal coordinates, spacing checks, cell areas and
//! pixel-to-metre vector conversion.

use crate::coords::{geographic_to_cartesian_displacement, CoordinateSystem};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relative tolerance used when checking grid spacing.
const SPACING_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid {axis} coordinate not equally spaced")]
    IrregularSpacing { axis: &'static str },
    #[error("grid {axis} spacing {found} does not match prescribed spacing {expected}")]
    SpacingMismatch {
        axis: &'static str,
        expected: f64,
        found: f64,
    },
    #[error("grid {axis} coordinate is not ascending")]
    NotAscending { axis: &'static str },
    #[error("grid {axis} coordinate is empty")]
    Empty { axis: &'static str },
}

/// Horizontal grid description shared by every dataset in a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridOptions {
    pub name: CoordinateSystem,
    /// Row coordinate (latitude in degrees, or y in metres)
    pub rows: Vec<f64>,
    /// Column coordinate (longitude in degrees, or x in metres)
    pub cols: Vec<f64>,
    /// [dy, dx] in metres
    pub cartesian_spacing: [f64; 2],
    /// [dlat, dlon] in degrees
    pub geographic_spacing: [f64; 2],
    /// When false the input grid is used as-is and spacing is not checked
    pub regrid: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            name: CoordinateSystem::Geographic,
            rows: Vec::new(),
            cols: Vec::new(),
            cartesian_spacing: [2500.0, 2500.0],
            geographic_spacing: [0.025, 0.025],
            regrid: true,
        }
    }
}

impl GridOptions {
    /// Regular cartesian grid of `shape` cells starting at `origin` (y, x).
    pub fn cartesian(shape: (usize, usize), origin: (f64, f64), spacing: [f64; 2]) -> Self {
        Self {
            name: CoordinateSystem::Cartesian,
            rows: (0..shape.0).map(|i| origin.0 + i as f64 * spacing[0]).collect(),
            cols: (0..shape.1).map(|j| origin.1 + j as f64 * spacing[1]).collect(),
            cartesian_spacing: spacing,
            ..Default::default()
        }
    }

    /// Regular geographic grid of `shape` cells starting at `origin` (lat, lon).
    pub fn geographic(shape: (usize, usize), origin: (f64, f64), spacing: [f64; 2]) -> Self {
        Self {
            name: CoordinateSystem::Geographic,
            rows: (0..shape.0).map(|i| origin.0 + i as f64 * spacing[0]).collect(),
            cols: (0..shape.1).map(|j| origin.1 + j as f64 * spacing[1]).collect(),
            geographic_spacing: spacing,
            ..Default::default()
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    /// Prescribed [row, col] spacing in the grid's own units.
    pub fn spacing(&self) -> [f64; 2] {
        match self.name {
            CoordinateSystem::Cartesian => self.cartesian_spacing,
            CoordinateSystem::Geographic => self.geographic_spacing,
        }
    }

    /// Validate coordinates: ascending, and, when regridding, uniformly spaced
    /// at the prescribed spacing.
    pub fn check(&self) -> Result<(), GridError> {
        let spacing = self.spacing();
        for (axis, coords, dv) in [("row", &self.rows, spacing[0]), ("col", &self.cols, spacing[1])] {
            if coords.is_empty() {
                return Err(GridError::Empty { axis });
            }
            if coords.windows(2).any(|w| w[1] <= w[0]) {
                return Err(GridError::NotAscending { axis });
            }
            if self.regrid {
                check_spacing(axis, coords, dv)?;
            }
        }
        Ok(())
    }

    /// 2-D coordinate matrices `(x, y)`, i.e. a meshgrid of cols and rows.
    pub fn meshgrid(&self) -> (DMatrix<f64>, DMatrix<f64>) {
        let (n_rows, n_cols) = self.shape();
        let x = DMatrix::from_fn(n_rows, n_cols, |_, j| self.cols[j]);
        let y = DMatrix::from_fn(n_rows, n_cols, |i, _| self.rows[i]);
        (x, y)
    }

    /// Area of every grid cell in km².
    pub fn cell_areas(&self) -> DMatrix<f64> {
        let (n_rows, n_cols) = self.shape();
        match self.name {
            CoordinateSystem::Cartesian => {
                let area = self.cartesian_spacing[0] * self.cartesian_spacing[1] / 1e6;
                DMatrix::from_element(n_rows, n_cols, area)
            }
            CoordinateSystem::Geographic => DMatrix::from_fn(n_rows, n_cols, |i, j| {
                let (i0, i1) = neighbours(i, n_rows);
                let (j0, j1) = neighbours(j, n_cols);
                let lat = self.rows[i];
                let lon = self.cols[j];
                let dy = crate::coords::haversine(self.rows[i0], lon, self.rows[i1], lon)
                    / (i1 - i0).max(1) as f64;
                let dx = crate::coords::haversine(lat, self.cols[j0], lat, self.cols[j1])
                    / (j1 - j0).max(1) as f64;
                dx * dy / 1e6
            }),
        }
    }

    /// Coordinates `(row_coord, col_coord)` of a fractional pixel position,
    /// interpolating linearly between grid points.
    pub fn pixel_to_coordinates(&self, row: f64, col: f64) -> (f64, f64) {
        (interpolate(&self.rows, row), interpolate(&self.cols, col))
    }

    /// Convert a (Δrow, Δcol) pixel vector starting at `(row, col)` into a
    /// (Δy, Δx) displacement in metres.
    pub fn pixel_to_cartesian_vector(&self, row: usize, col: usize, vector: (f64, f64)) -> (f64, f64) {
        match self.name {
            CoordinateSystem::Cartesian => (
                vector.0 * self.cartesian_spacing[0],
                vector.1 * self.cartesian_spacing[1],
            ),
            CoordinateSystem::Geographic => {
                let start_lat = self.rows[row.min(self.rows.len().saturating_sub(1))];
                let start_lon = self.cols[col.min(self.cols.len().saturating_sub(1))];
                let end_lat = start_lat + vector.0 * self.geographic_spacing[0];
                let end_lon = start_lon + vector.1 * self.geographic_spacing[1];
                geographic_to_cartesian_displacement(start_lat, start_lon, end_lat, end_lon)
            }
        }
    }
}

fn interpolate(coords: &[f64], position: f64) -> f64 {
    match coords.len() {
        0 => f64::NAN,
        1 => coords[0],
        n => {
            let k = (position.floor().max(0.0) as usize).min(n - 2);
            coords[k] + (position - k as f64) * (coords[k + 1] - coords[k])
        }
    }
}

/// Index span used for centred differences, one-sided at the edges.
fn neighbours(i: usize, n: usize) -> (usize, usize) {
    if n < 2 {
        return (0, 0);
    }
    (i.saturating_sub(1), (i + 1).min(n - 1))
}

fn check_spacing(axis: &'static str, coords: &[f64], dv: f64) -> Result<(), GridError> {
    let diffs: Vec<f64> = coords.windows(2).map(|w| w[1] - w[0]).collect();
    let Some(&first) = diffs.first() else {
        return Ok(());
    };
    let tol = SPACING_TOLERANCE * first.abs().max(dv.abs());
    if diffs.iter().any(|d| (d - first).abs() > tol) {
        return Err(GridError::IrregularSpacing { axis });
    }
    if (first - dv).abs() > tol {
        return Err(GridError::SpacingMismatch {
            axis,
            expected: dv,
            found: first,
        });
    }
    Ok(())
}

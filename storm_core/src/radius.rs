//! Spatial radius search over a gridded field.
//!
//! # Two-stage filter
//! 1. **Axis bands**: a row band is cut along column `col` of `y` and a column
//!    band along row `row` of `x`, each using a 1-D distance that is a lower
//!    bound of the true distance. The bands define a rectangular sub-box.
//! 2. **Exact test**: only points inside the sub-box are tested against the
//!    full distance, and cells whose value is NaN are dropped.
//!
//! For geographic grids the column band uses the haversine lower bound
//! `hav(d/R) ≥ cos φ₁ cos φ₂ hav(Δλ)` with the most poleward latitude in the
//! row band, so the box never excludes a point the exact test would include.

use grid_models::{CoordinateSystem, EARTH_RADIUS};
use nalgebra::DMatrix;

/// Cells `(row, col)` within `radius` (meters, inclusive) of `(row, col)`
/// whose value in `array` is not NaN.
pub fn cells_within_radius(
    array: &DMatrix<f64>,
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    row: usize,
    col: usize,
    radius: f64,
    coordinates: CoordinateSystem,
) -> Vec<(usize, usize)> {
    let (n_rows, n_cols) = array.shape();
    let (x0, y0) = (x[(row, col)], y[(row, col)]);

    // Stage 1: axis bands
    let row_band: Vec<usize> = match coordinates {
        CoordinateSystem::Geographic => (0..n_rows)
            .filter(|&i| EARTH_RADIUS * (y[(i, col)] - y0).to_radians().abs() <= radius)
            .collect(),
        CoordinateSystem::Cartesian => (0..n_rows)
            .filter(|&i| (y[(i, col)] - y0).powi(2) <= radius * radius)
            .collect(),
    };
    let col_band: Vec<usize> = match coordinates {
        CoordinateSystem::Geographic => {
            let min_cos = row_band
                .iter()
                .map(|&i| y[(i, col)].to_radians().cos())
                .fold(1.0_f64, f64::min)
                .max(0.0);
            let scale = (y0.to_radians().cos() * min_cos).sqrt();
            (0..n_cols)
                .filter(|&j| {
                    let half = ((x[(row, j)] - x0).to_radians() / 2.0).sin().abs();
                    let bound = 2.0 * EARTH_RADIUS * (scale * half).min(1.0).asin();
                    bound <= radius
                })
                .collect()
        }
        CoordinateSystem::Cartesian => (0..n_cols)
            .filter(|&j| (x[(row, j)] - x0).powi(2) <= radius * radius)
            .collect(),
    };

    // Stage 2: exact radius test inside the box
    let mut cells = Vec::with_capacity(row_band.len() * col_band.len());
    for &i in &row_band {
        for &j in &col_band {
            if array[(i, j)].is_nan() {
                continue;
            }
            if coordinates.distance(x0, y0, x[(i, j)], y[(i, j)]) <= radius {
                cells.push((i, j));
            }
        }
    }
    cells
}

/// Non-NaN values of `array` within `radius` of `(row, col)`.
pub fn values_within_radius(
    array: &DMatrix<f64>,
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    row: usize,
    col: usize,
    radius: f64,
    coordinates: CoordinateSystem,
) -> Vec<f64> {
    cells_within_radius(array, x, y, row, col, radius, coordinates)
        .into_iter()
        .map(|(i, j)| array[(i, j)])
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

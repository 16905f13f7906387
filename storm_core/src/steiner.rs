//! Convective/stratiform classification of reflectivity (Steiner et al. 1995),
//! extended to irregular grids and geographic coordinates.
//!
//! # Labels
//! - `0`: no data / unclassified
//! - `1`: stratiform
//! - `2`: convective
//!
//! # Scan
//! Cells are visited in row-major order. A convective cell stamps every
//! non-missing cell within its convective radius, so cells ahead of the scan
//! may already be labelled when reached; those are skipped. The scan therefore
//! has a sequential dependency and must not be parallelised.

use crate::radius::{cells_within_radius, values_within_radius};
use grid_models::CoordinateSystem;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

pub const UNCLASSIFIED: u8 = 0;
pub const STRATIFORM: u8 = 1;
pub const CONVECTIVE: u8 = 2;

/// Base reflectivity thresholds (dBZ) of the convective radius step function.
const BASE_THRESHOLDS: [f64; 4] = [20.0, 25.0, 30.0, 35.0];
/// Convective radii (meters); the last entry applies at and above the top threshold.
const CONVECTIVE_RADII: [f64; 5] = [1e3, 2e3, 3e3, 4e3, 5e3];
/// Background reflectivity above which the delta-Z threshold is zero.
const DELTA_Z_CUTOFF: f64 = 42.43;

/// Steiner scheme configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SteinerOptions {
    /// Shifts the radius thresholds by 5·option dBZ
    pub radius_option: i32,
    /// Raises the delta-Z threshold by 4·option dB
    pub delta_z_option: f64,
    /// Radius (meters) of the background reflectivity average
    pub background_radius: f64,
    /// Reflectivity (dBZ) at or above which a cell is convective outright
    pub dbz_threshold: f64,
    pub use_dbz_threshold: bool,
}

impl Default for SteinerOptions {
    fn default() -> Self {
        Self {
            radius_option: 1,
            delta_z_option: 0.0,
            background_radius: 11e3,
            dbz_threshold: 42.0,
            use_dbz_threshold: true,
        }
    }
}

/// Classify a reflectivity field. `x` and `y` hold per-cell coordinates.
pub fn classify(
    reflectivity: &DMatrix<f64>,
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    options: &SteinerOptions,
    coordinates: CoordinateSystem,
) -> DMatrix<u8> {
    let mut classification = DMatrix::from_element(reflectivity.nrows(), reflectivity.ncols(), UNCLASSIFIED);
    classify_into(reflectivity, x, y, options, coordinates, &mut classification);
    classification
}

/// Continue classifying into an existing label grid. Already-labelled cells
/// are left untouched, so a fully labelled grid is returned unchanged.
pub fn classify_into(
    reflectivity: &DMatrix<f64>,
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    options: &SteinerOptions,
    coordinates: CoordinateSystem,
    classification: &mut DMatrix<u8>,
) {
    let (n_rows, n_cols) = reflectivity.shape();
    for i in 0..n_rows {
        for j in 0..n_cols {
            let value = reflectivity[(i, j)];
            if value.is_nan() || classification[(i, j)] != UNCLASSIFIED {
                continue;
            }

            let background = values_within_radius(
                reflectivity,
                x,
                y,
                i,
                j,
                options.background_radius,
                coordinates,
            );
            let mean_background = mean_background_reflectivity(&background);

            let convective = if options.use_dbz_threshold && value >= options.dbz_threshold {
                true
            } else {
                value - mean_background >= delta_z_threshold(mean_background, options.delta_z_option)
            };

            if convective {
                let radius = convective_radius(mean_background, options.radius_option);
                for cell in cells_within_radius(reflectivity, x, y, i, j, radius, coordinates) {
                    classification[cell] = CONVECTIVE;
                }
            } else {
                classification[(i, j)] = STRATIFORM;
            }
        }
    }
}

/// Mean of dBZ values taken in linear units. NaN for an empty sample.
pub fn mean_background_reflectivity(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let linear: f64 = values.iter().map(|v| 10f64.powf(v / 10.0)).sum::<f64>() / values.len() as f64;
    10.0 * linear.log10()
}

/// Convective radius (meters) for a background reflectivity (dBZ).
pub fn convective_radius(background: f64, radius_option: i32) -> f64 {
    let shift = 5.0 * radius_option as f64;
    BASE_THRESHOLDS
        .iter()
        .position(|&t| background < t + shift)
        .map(|k| CONVECTIVE_RADII[k])
        .unwrap_or(CONVECTIVE_RADII[CONVECTIVE_RADII.len() - 1])
}

/// Minimum excess over the background (dB) for a cell to be convective.
pub fn delta_z_threshold(background: f64, delta_z_option: f64) -> f64 {
    if (0.0..DELTA_Z_CUTOFF).contains(&background) {
        10.0 + 4.0 * delta_z_option - background * background / 180.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use grid_models::GridOptions;

    fn cartesian(shape: (usize, usize)) -> (DMatrix<f64>, DMatrix<f64>) {
        GridOptions::cartesian(shape, (0.0, 0.0), [1000.0, 1000.0]).meshgrid()
    }

    #[test]
    fn convective_radius_at_threshold_boundaries() {
        // radius_option = 1: thresholds 25, 30, 35, 40
        assert_eq!(convective_radius(24.9, 1), 1e3);
        assert_eq!(convective_radius(25.0, 1), 2e3);
        assert_eq!(convective_radius(30.0, 1), 3e3);
        assert_eq!(convective_radius(39.99, 1), 4e3);
        assert_eq!(convective_radius(40.0, 1), 5e3);
        assert_eq!(convective_radius(f64::NAN, 1), 5e3);
        assert_eq!(convective_radius(20.0, 0), 2e3);
    }

    #[test]
    fn delta_z_threshold_curve() {
        assert_abs_diff_eq!(delta_z_threshold(0.0, 0.0), 10.0);
        assert_abs_diff_eq!(delta_z_threshold(30.0, 0.0), 5.0);
        assert_abs_diff_eq!(delta_z_threshold(30.0, 1.0), 9.0);
        assert_eq!(delta_z_threshold(42.43, 0.0), 0.0);
        assert_eq!(delta_z_threshold(-5.0, 0.0), 0.0);
        assert_eq!(delta_z_threshold(f64::NAN, 0.0), 0.0);
    }

    #[test]
    fn background_mean_is_linear_average() {
        // mean(10, 100) = 55 → 17.40 dBZ
        let mean = mean_background_reflectivity(&[10.0, 20.0]);
        assert_abs_diff_eq!(mean, 10.0 * 55f64.log10(), epsilon = 1e-12);
        assert!(mean_background_reflectivity(&[]).is_nan());
    }

    #[test]
    fn strong_core_stamps_convective_radius() {
        let (x, y) = cartesian((15, 15));
        let mut refl = DMatrix::from_element(15, 15, 20.0);
        refl[(7, 7)] = 50.0;
        let labels = classify(&refl, &x, &y, &SteinerOptions::default(), CoordinateSystem::Cartesian);
        assert_eq!(labels[(7, 7)], CONVECTIVE);
        // Background ≈ 27.4 dBZ → 2 km radius, overwriting earlier stratiform cells
        assert_eq!(labels[(5, 7)], CONVECTIVE);
        assert_eq!(labels[(6, 6)], CONVECTIVE);
        assert_eq!(labels[(7, 9)], CONVECTIVE);
        assert_eq!(labels[(5, 6)], STRATIFORM);
        assert_eq!(labels[(0, 0)], STRATIFORM);
        assert_eq!(labels.iter().filter(|&&l| l == CONVECTIVE).count(), 13);
    }

    #[test]
    fn missing_cells_stay_unclassified() {
        let (x, y) = cartesian((5, 5));
        let mut refl = DMatrix::from_element(5, 5, 45.0);
        refl[(0, 0)] = f64::NAN;
        let labels = classify(&refl, &x, &y, &SteinerOptions::default(), CoordinateSystem::Cartesian);
        assert_eq!(labels[(0, 0)], UNCLASSIFIED);
        assert!(labels.iter().skip(1).all(|&l| l == CONVECTIVE));
    }

    #[test]
    fn lone_weak_cell_is_stratiform() {
        // The cell's own value is the whole background, so the excess is 0
        // and the 5 dB delta-Z threshold at 30 dBZ is not met.
        let (x, y) = cartesian((3, 3));
        let mut refl = DMatrix::from_element(3, 3, f64::NAN);
        refl[(1, 1)] = 30.0;
        let labels = classify(&refl, &x, &y, &SteinerOptions::default(), CoordinateSystem::Cartesian);
        assert_eq!(labels[(1, 1)], STRATIFORM);
    }

    #[test]
    fn reclassifying_labelled_grid_is_noop() {
        let (x, y) = cartesian((12, 12));
        let refl = DMatrix::from_fn(12, 12, |i, j| 15.0 + ((i * 7 + j * 3) % 30) as f64);
        let opts = SteinerOptions::default();
        let first = classify(&refl, &x, &y, &opts, CoordinateSystem::Cartesian);
        let mut second = first.clone();
        classify_into(&refl, &x, &y, &opts, CoordinateSystem::Cartesian, &mut second);
        assert_eq!(first, second);
    }
}

//! Synthetic reflectivity dataset rendered from a [`Scenario`].
//!
//! Each update renders two altitude levels (a low level and a weaker upper
//! level) with Gaussian measurement noise; conversion collapses them into a
//! column-maximum composite, the field the tracker sees.

use crate::scenarios::Scenario;
use crate::storm::Storm;
use grid_models::GridOptions;
use nalgebra::DMatrix;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use storm_core::dataset::DatasetAdapter;
use storm_core::error::{ConfigError, Result, TrackError};
use storm_core::grid::Grid;
use tracing::debug;

/// Reflectivity lost between the low and the upper level (dB).
const UPPER_LEVEL_LOSS: f64 = 4.0;

pub struct SyntheticDataset {
    name: String,
    scenario: Scenario,
    storms: Vec<Storm>,
    rng: ChaCha8Rng,
    time: Option<f64>,
    levels: Vec<DMatrix<f64>>,
    field: Option<DMatrix<f64>>,
    coverage: DMatrix<bool>,
    boundary: DMatrix<bool>,
}

impl SyntheticDataset {
    pub fn new(name: impl Into<String>, scenario: Scenario) -> Self {
        let coverage = coverage_mask(&scenario.grid, scenario.coverage_radius);
        let boundary = coverage_boundary(&coverage);
        Self {
            name: name.into(),
            storms: scenario.storms.clone(),
            rng: ChaCha8Rng::seed_from_u64(scenario.seed),
            scenario,
            time: None,
            levels: Vec::new(),
            field: None,
            coverage,
            boundary,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Ground-truth (id, [y, x]) of storms active at the current time.
    pub fn truth(&self) -> Vec<(u64, [f64; 2])> {
        let Some(t) = self.time else {
            return Vec::new();
        };
        self.storms
            .iter()
            .filter(|s| s.is_active(t))
            .map(|s| (s.id, s.position))
            .collect()
    }

    fn render(&mut self, t: f64, loss: f64) -> DMatrix<f64> {
        let grid = &self.scenario.grid;
        let (n_rows, n_cols) = grid.shape();
        let active: Vec<&Storm> = self.storms.iter().filter(|s| s.is_active(t)).collect();
        let background = self.scenario.background.map_or(0.0, |b| b - loss);
        let noise_std = self.scenario.noise_std;
        let rng = &mut self.rng;
        DMatrix::from_fn(n_rows, n_cols, |i, j| {
            if !self.coverage[(i, j)] {
                return f64::NAN;
            }
            let (y, x) = (grid.rows[i], grid.cols[j]);
            let storm = active
                .iter()
                .map(|s| s.reflectivity_at(y, x) - loss)
                .fold(f64::NEG_INFINITY, f64::max);
            storm.max(background) + noise_std * standard_normal(rng)
        })
    }
}

impl DatasetAdapter for SyntheticDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid_options(&self) -> &GridOptions {
        &self.scenario.grid
    }

    fn check_options(&self) -> Result<()> {
        if self.scenario.frame_interval <= 0.0 {
            return Err(ConfigError::InvalidOption {
                name: format!("{}.frame_interval", self.name),
                reason: "must be positive".into(),
            }
            .into());
        }
        self.scenario.grid.check()?;
        Ok(())
    }

    fn update(&mut self, time: f64) -> Result<()> {
        let dt = match self.time {
            Some(previous) if time < previous => {
                return Err(TrackError::Dataset(format!(
                    "{}: cannot step back from {previous} to {time}",
                    self.name
                )));
            }
            Some(previous) => time - previous,
            None => time,
        };
        for storm in &mut self.storms {
            storm.step(dt);
        }
        self.time = Some(time);
        self.levels = vec![self.render(time, 0.0), self.render(time, UPPER_LEVEL_LOSS)];
        debug!(dataset = %self.name, time, active = self.truth().len(), "rendered levels");
        Ok(())
    }

    fn convert(&mut self) -> Result<()> {
        let field = Grid::column_max(&self.levels)
            .ok_or_else(|| TrackError::Dataset(format!("{}: no levels to convert", self.name)))?;
        self.field = Some(field);
        Ok(())
    }

    fn grid_from(&self, time: f64) -> Result<Option<Grid>> {
        match (&self.field, self.time) {
            (Some(field), Some(t)) if t == time => {
                Grid::from_options(time, field.clone(), &self.scenario.grid).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn boundary_mask(&self) -> Option<&DMatrix<bool>> {
        Some(&self.boundary)
    }
}

/// Cells within `radius` of the domain centre (all cells without a radius).
fn coverage_mask(grid: &GridOptions, radius: Option<f64>) -> DMatrix<bool> {
    let (n_rows, n_cols) = grid.shape();
    let Some(radius) = radius else {
        return DMatrix::from_element(n_rows, n_cols, true);
    };
    let (cy, cx) = grid.pixel_to_coordinates((n_rows as f64 - 1.0) / 2.0, (n_cols as f64 - 1.0) / 2.0);
    DMatrix::from_fn(n_rows, n_cols, |i, j| {
        grid.name.distance(grid.cols[j], grid.rows[i], cx, cy) <= radius
    })
}

/// Covered cells touching the domain edge or an uncovered cell.
fn coverage_boundary(coverage: &DMatrix<bool>) -> DMatrix<bool> {
    let (n_rows, n_cols) = coverage.shape();
    DMatrix::from_fn(n_rows, n_cols, |i, j| {
        if !coverage[(i, j)] {
            return false;
        }
        if i == 0 || j == 0 || i + 1 == n_rows || j + 1 == n_cols {
            return true;
        }
        !(coverage[(i - 1, j)] && coverage[(i + 1, j)] && coverage[(i, j - 1)] && coverage[(i, j + 1)])
    })
}

/// Standard normal sample (Box-Muller).
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioKind;

    #[test]
    fn update_convert_yields_grid_for_current_time_only() {
        let mut ds = SyntheticDataset::new("synthetic", Scenario::build(ScenarioKind::Simple, 1));
        ds.check_options().unwrap();
        ds.update(0.0).unwrap();
        ds.convert().unwrap();
        let grid = ds.grid_from(0.0).unwrap().unwrap();
        assert_eq!(grid.shape(), (100, 100));
        assert!(ds.grid_from(600.0).unwrap().is_none());
        // Column max equals the unattenuated low level without noise
        let peak = grid.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(peak > 45.0 && peak <= 55.0);
    }

    #[test]
    fn storms_move_between_updates() {
        let mut ds = SyntheticDataset::new("synthetic", Scenario::build(ScenarioKind::Simple, 1));
        ds.update(0.0).unwrap();
        let before = ds.truth()[0].1;
        ds.update(600.0).unwrap();
        let after = ds.truth()[0].1;
        assert!((after[1] - before[1] - 7200.0).abs() < 1e-6);
        assert!(ds.update(0.0).is_err());
    }

    #[test]
    fn coverage_outside_radius_is_missing() {
        let mut ds = SyntheticDataset::new("synthetic", Scenario::build(ScenarioKind::SquallLine, 3));
        ds.update(0.0).unwrap();
        ds.convert().unwrap();
        let grid = ds.grid_from(0.0).unwrap().unwrap();
        assert!(grid.values[(0, 0)].is_nan());
        assert!(!grid.values[(50, 60)].is_nan());
        let boundary = ds.boundary_mask().unwrap();
        assert!(!boundary[(0, 0)]);
        assert!(!boundary[(50, 60)]);
        assert!(boundary.iter().any(|&b| b));
    }
}

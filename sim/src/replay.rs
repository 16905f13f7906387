//! Replay: serialize/deserialize recorded frames and serve them as a dataset.

use crate::synthetic::SyntheticDataset;
use grid_models::GridOptions;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use storm_core::dataset::DatasetAdapter;
use storm_core::error::{ConfigError, Result, TrackError};
use storm_core::grid::Grid;

/// A recorded sequence of gridded fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameLog {
    pub name: String,
    pub grid: GridOptions,
    /// Frames in chronological order
    pub frames: Vec<Frame>,
}

/// One field, row-major; `None` marks missing data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    pub time: f64,
    pub values: Vec<Option<f64>>,
}

impl Frame {
    pub fn from_matrix(time: f64, values: &DMatrix<f64>) -> Self {
        let (n_rows, n_cols) = values.shape();
        let values = (0..n_rows)
            .flat_map(|i| (0..n_cols).map(move |j| (i, j)))
            .map(|(i, j)| Some(values[(i, j)]).filter(|v| !v.is_nan()))
            .collect();
        Self { time, values }
    }

    pub fn to_matrix(&self, shape: (usize, usize)) -> Result<DMatrix<f64>> {
        if self.values.len() != shape.0 * shape.1 {
            return Err(TrackError::Dataset(format!(
                "frame at {} has {} values, grid has {}",
                self.time,
                self.values.len(),
                shape.0 * shape.1
            )));
        }
        Ok(DMatrix::from_row_iterator(
            shape.0,
            shape.1,
            self.values.iter().map(|v| v.unwrap_or(f64::NAN)),
        ))
    }
}

/// Record the converted fields of a synthetic dataset at `times`.
pub fn record_frames(dataset: &mut SyntheticDataset, times: &[f64]) -> Result<FrameLog> {
    let mut frames = Vec::with_capacity(times.len());
    for &time in times {
        dataset.update(time)?;
        dataset.convert()?;
        if let Some(grid) = dataset.grid_from(time)? {
            frames.push(Frame::from_matrix(time, &grid.values));
        }
    }
    Ok(FrameLog {
        name: dataset.name().to_string(),
        grid: dataset.grid_options().clone(),
        frames,
    })
}

/// Save a frame log to a JSON file.
pub fn save_frames(log: &FrameLog, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer(writer, log).map_err(|e| TrackError::Dataset(e.to_string()))?;
    Ok(())
}

/// Load a frame log from a JSON file.
pub fn load_frames(path: &Path) -> Result<FrameLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| TrackError::Dataset(format!("{}: {e}", path.display())))
}

/// Dataset serving the frames of a [`FrameLog`]; times without a frame have
/// no grid.
pub struct FrameDataset {
    log: FrameLog,
    current: Option<usize>,
    field: Option<DMatrix<f64>>,
}

impl FrameDataset {
    pub fn new(log: FrameLog) -> Self {
        Self {
            log,
            current: None,
            field: None,
        }
    }

    pub fn times(&self) -> Vec<f64> {
        self.log.frames.iter().map(|f| f.time).collect()
    }
}

impl DatasetAdapter for FrameDataset {
    fn name(&self) -> &str {
        &self.log.name
    }

    fn grid_options(&self) -> &GridOptions {
        &self.log.grid
    }

    fn check_options(&self) -> Result<()> {
        self.log.grid.check()?;
        if self.log.frames.windows(2).any(|w| w[1].time <= w[0].time) {
            return Err(ConfigError::InvalidOption {
                name: format!("{}.frames", self.log.name),
                reason: "frame times must strictly increase".into(),
            }
            .into());
        }
        Ok(())
    }

    fn update(&mut self, time: f64) -> Result<()> {
        self.current = self.log.frames.iter().position(|f| f.time == time);
        self.field = None;
        Ok(())
    }

    fn convert(&mut self) -> Result<()> {
        if let Some(k) = self.current {
            self.field = Some(self.log.frames[k].to_matrix(self.log.grid.shape())?);
        }
        Ok(())
    }

    fn grid_from(&self, time: f64) -> Result<Option<Grid>> {
        match (self.current, &self.field) {
            (Some(k), Some(field)) if self.log.frames[k].time == time => {
                Grid::from_options(time, field.clone(), &self.log.grid).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn boundary_mask(&self) -> Option<&DMatrix<bool>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{Scenario, ScenarioKind};

    #[test]
    fn frames_survive_a_save_load_cycle_with_missing_cells() {
        let mut synthetic = SyntheticDataset::new("synthetic", Scenario::build(ScenarioKind::SquallLine, 2));
        let log = record_frames(&mut synthetic, &[0.0, 600.0]).unwrap();
        assert_eq!(log.frames.len(), 2);
        assert!(log.frames[0].values[0].is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.json");
        save_frames(&log, &path).unwrap();
        let loaded = load_frames(&path).unwrap();
        assert_eq!(loaded.frames.len(), 2);

        let mut replay = FrameDataset::new(loaded);
        replay.check_options().unwrap();
        replay.update(600.0).unwrap();
        replay.convert().unwrap();
        let grid = replay.grid_from(600.0).unwrap().unwrap();
        assert!(grid.values[(0, 0)].is_nan());
        assert_eq!(grid.shape(), (100, 120));
    }

    #[test]
    fn missing_time_has_no_grid() {
        let log = FrameLog {
            name: "frames".into(),
            grid: GridOptions::cartesian((2, 2), (0.0, 0.0), [2500.0, 2500.0]),
            frames: vec![Frame::from_matrix(0.0, &DMatrix::from_element(2, 2, 10.0))],
        };
        let mut replay = FrameDataset::new(log);
        replay.update(300.0).unwrap();
        replay.convert().unwrap();
        assert!(replay.grid_from(300.0).unwrap().is_none());
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let frame = Frame {
            time: 0.0,
            values: vec![Some(1.0); 3],
        };
        assert!(frame.to_matrix((2, 2)).is_err());
    }
}

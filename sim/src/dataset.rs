//! Closed set of datasets a run can draw grids from.

use crate::replay::FrameDataset;
use crate::synthetic::SyntheticDataset;
use grid_models::GridOptions;
use nalgebra::DMatrix;
use storm_core::dataset::DatasetAdapter;
use storm_core::error::Result;
use storm_core::grid::Grid;

pub enum Dataset {
    Synthetic(SyntheticDataset),
    Replay(FrameDataset),
}

impl DatasetAdapter for Dataset {
    fn name(&self) -> &str {
        match self {
            Dataset::Synthetic(d) => d.name(),
            Dataset::Replay(d) => d.name(),
        }
    }

    fn grid_options(&self) -> &GridOptions {
        match self {
            Dataset::Synthetic(d) => d.grid_options(),
            Dataset::Replay(d) => d.grid_options(),
        }
    }

    fn check_options(&self) -> Result<()> {
        match self {
            Dataset::Synthetic(d) => d.check_options(),
            Dataset::Replay(d) => d.check_options(),
        }
    }

    fn update(&mut self, time: f64) -> Result<()> {
        match self {
            Dataset::Synthetic(d) => d.update(time),
            Dataset::Replay(d) => d.update(time),
        }
    }

    fn convert(&mut self) -> Result<()> {
        match self {
            Dataset::Synthetic(d) => d.convert(),
            Dataset::Replay(d) => d.convert(),
        }
    }

    fn grid_from(&self, time: f64) -> Result<Option<Grid>> {
        match self {
            Dataset::Synthetic(d) => d.grid_from(time),
            Dataset::Replay(d) => d.grid_from(time),
        }
    }

    fn boundary_mask(&self) -> Option<&DMatrix<bool>> {
        match self {
            Dataset::Synthetic(d) => d.boundary_mask(),
            Dataset::Replay(d) => d.boundary_mask(),
        }
    }
}

//! Grid providers consumed by the tracker.

use crate::error::Result;
use crate::grid::Grid;
use grid_models::GridOptions;
use nalgebra::DMatrix;

/// A source of gridded fields, one per time step.
///
/// The tracker calls [`update`](DatasetAdapter::update) then
/// [`convert`](DatasetAdapter::convert) once per step before asking for the
/// step's grid.
pub trait DatasetAdapter: Sync {
    /// Name object options refer to in their `dataset` field.
    fn name(&self) -> &str;

    fn grid_options(&self) -> &GridOptions;

    /// Validate the dataset's own configuration.
    fn check_options(&self) -> Result<()>;

    /// Make data covering `time` available.
    fn update(&mut self, time: f64) -> Result<()>;

    /// Turn loaded raw data into the tracked field (e.g. a column maximum).
    fn convert(&mut self) -> Result<()>;

    /// Grid at `time`, or `None` when the dataset has no data for it.
    fn grid_from(&self, time: f64) -> Result<Option<Grid>>;

    /// Cells on the edge of the valid data domain, if known.
    fn boundary_mask(&self) -> Option<&DMatrix<bool>>;
}

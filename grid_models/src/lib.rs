//! `grid_models`: Coordinate systems, distances, grid options and cell geometry.

pub mod coords;
pub mod grid;

pub use coords::{haversine, CoordinateSystem, EARTH_RADIUS};
pub use grid::{GridError, GridOptions};

//! Error taxonomy.
//!
//! Configuration errors abort the offending category and, through the tracker,
//! the whole run. Missing data (no previous mask, no objects) is not an error.

use crate::types::UniversalId;
use grid_models::GridError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackError>;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    Shape {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("universal id {0} does not fit a mask label")]
    LabelOverflow(UniversalId),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no id attribute found in attributes for {object}")]
    MissingIdAttribute { object: String },
    #[error("dataset must be specified for {object} when boundary overlap is requested")]
    MissingDataset { object: String },
    #[error("dataset {0} not found in data options")]
    UnknownDataset(String),
    #[error("member object {member} of {object} not found in a lower level")]
    UnknownMember { object: String, member: String },
    #[error("centroid requires cell areas or grid weights")]
    MissingCellAreas,
    #[error("duplicate object name {0}")]
    DuplicateObject(String),
    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: String, reason: String },
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl From<GridError> for TrackError {
    fn from(e: GridError) -> Self {
        TrackError::Config(ConfigError::Grid(e))
    }
}

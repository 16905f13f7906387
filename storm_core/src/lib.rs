//! `storm_core`: Storm object detection, matching and identity tracking.
//!
//! # Module layout
//! - [`types`]      : Fundamental types (ids, displacements, pixel centres)
//! - [`error`]      : Error taxonomy
//! - [`grid`]       : Gridded fields and object masks
//! - [`radius`]     : Two-stage radius search on rectilinear grids
//! - [`steiner`]    : Convective/stratiform classification
//! - [`detect`]     : Region labelling, size filtering, object grouping
//! - [`object`]     : Object records and geometry
//! - [`association`]: Candidate graph, linked groups, minimum-cost assignment
//! - [`correlate`]  : Flow estimation and candidate matching
//! - [`matcher`]    : Matching step and universal id management
//! - [`tracks`]     : Per-category state and bounded histories
//! - [`attribute`]  : Per-object attribute recording
//! - [`writer`]     : Write schedule and output sinks
//! - [`dataset`]    : Grid provider interface
//! - [`options`]    : Run configuration
//! - [`tracker`]    : Full multi-level tracking orchestrator

pub mod association;
pub mod attribute;
pub mod correlate;
pub mod dataset;
pub mod detect;
pub mod error;
pub mod grid;
pub mod matcher;
pub mod object;
pub mod options;
pub mod radius;
pub mod steiner;
pub mod tracker;
pub mod tracks;
pub mod types;
pub mod writer;

pub use attribute::{AttributeKind, AttributeRow};
pub use correlate::{FlowCorrelator, MatchData, MotionCorrelator};
pub use dataset::DatasetAdapter;
pub use error::{ConfigError, Result, TrackError};
pub use grid::{Grid, Mask};
pub use options::{default_track_options, ObjectOptions, TrackOptions, TrackingOptions};
pub use tracker::{StepOutput, Tracker};
pub use tracks::{History, ObjectTracks};
pub use types::{Displacement, PixelCenter, TransientId, UniversalId};
pub use writer::{MemorySink, RecordSink};

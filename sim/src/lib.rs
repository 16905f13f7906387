//! `sim`: Synthetic storm scenarios, frame replay datasets and run output.

pub mod dataset;
pub mod output;
pub mod replay;
pub mod runner;
pub mod scenarios;
pub mod storm;
pub mod synthetic;

pub use dataset::Dataset;
pub use output::JsonRunWriter;
pub use replay::{load_frames, record_frames, save_frames, FrameDataset, FrameLog};
pub use runner::run_tracking;
pub use scenarios::{Scenario, ScenarioKind};
pub use storm::{MotionSpec, Storm};
pub use synthetic::SyntheticDataset;

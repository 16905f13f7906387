//! Time loop driving a tracker over a set of datasets.

use storm_core::dataset::DatasetAdapter;
use storm_core::error::Result;
use storm_core::tracker::{StepOutput, Tracker};
use storm_core::writer::RecordSink;
use tracing::info;

/// Step `tracker` through `times`, then finish the run.
pub fn run_tracking<D: DatasetAdapter>(
    tracker: &mut Tracker,
    datasets: &mut [D],
    times: &[f64],
    sink: &mut dyn RecordSink,
) -> Result<Vec<StepOutput>> {
    let mut outputs = Vec::with_capacity(times.len());
    for &time in times {
        outputs.push(tracker.step(time, datasets, sink)?);
    }
    tracker.finish(datasets, sink)?;
    info!(steps = outputs.len(), "tracking run complete");
    Ok(outputs)
}

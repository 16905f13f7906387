//! Periodic output of attribute rows and matched masks.

use crate::attribute::AttributeRow;
use crate::error::Result;
use crate::grid::Mask;
use crate::tracks::ObjectTracks;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Decides when a category's accumulated output is flushed. The first
/// observed time starts the schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteSchedule {
    /// Seconds between writes
    pub interval: f64,
    pub last_write: Option<f64>,
}

impl WriteSchedule {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            last_write: None,
        }
    }

    pub fn due(&mut self, time: f64) -> bool {
        let last = *self.last_write.get_or_insert(time);
        time - last >= self.interval
    }

    pub fn mark_written(&mut self, time: f64) {
        self.last_write = Some(time);
    }
}

/// Destination of recorded output.
pub trait RecordSink {
    /// Persist one batch of rows and masks of `category`.
    fn write(&mut self, category: &str, rows: &[AttributeRow], masks: &[Mask]) -> Result<()>;

    /// Combine everything written so far. Called once at the end of a run.
    fn aggregate(&mut self) -> Result<()>;
}

/// Hand the category's pending output to `sink` and reset the schedule.
pub fn flush(tracks: &mut ObjectTracks, sink: &mut dyn RecordSink, time: f64) -> Result<()> {
    let rows = std::mem::take(&mut tracks.attribute_rows);
    let masks = std::mem::take(&mut tracks.pending_masks);
    info!(object = %tracks.name, rows = rows.len(), masks = masks.len(), time, "writing");
    sink.write(&tracks.name, &rows, &masks)?;
    tracks.write_schedule.mark_written(time);
    Ok(())
}

/// Sink keeping everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub rows: BTreeMap<String, Vec<AttributeRow>>,
    pub masks: BTreeMap<String, Vec<Mask>>,
    pub writes: usize,
    pub aggregated: bool,
}

impl RecordSink for MemorySink {
    fn write(&mut self, category: &str, rows: &[AttributeRow], masks: &[Mask]) -> Result<()> {
        self.rows.entry(category.to_string()).or_default().extend_from_slice(rows);
        self.masks.entry(category.to_string()).or_default().extend_from_slice(masks);
        self.writes += 1;
        Ok(())
    }

    fn aggregate(&mut self) -> Result<()> {
        self.aggregated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn schedule_starts_at_first_time() {
        let mut s = WriteSchedule::new(3600.0);
        assert!(!s.due(1000.0));
        assert!(!s.due(4599.0));
        assert!(s.due(4600.0));
        s.mark_written(4600.0);
        assert!(!s.due(5000.0));
    }

    #[test]
    fn flush_drains_pending_output() {
        let mut tracks = ObjectTracks::new("cell", 2, DMatrix::zeros(1, 1), 60.0);
        tracks.attribute_rows.push(AttributeRow {
            time: 0.0,
            id: 1,
            ..Default::default()
        });
        tracks.pending_masks.push(Mask::empty(0.0, (1, 1)));
        let mut sink = MemorySink::default();
        flush(&mut tracks, &mut sink, 60.0).unwrap();
        assert!(tracks.attribute_rows.is_empty());
        assert!(tracks.pending_masks.is_empty());
        assert_eq!(sink.rows["cell"].len(), 1);
        assert_eq!(tracks.write_schedule.last_write, Some(60.0));
    }
}

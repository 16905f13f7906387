//! JSON output of a tracking run.
//!
//! Layout under the output directory:
//! - `<category>_attributes.jsonl`: one attribute row per line
//! - `masks/<category>_<time>.json`: one matched mask per file
//! - `summary.json`: per-category totals, written by `aggregate`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use storm_core::attribute::AttributeRow;
use storm_core::error::Result;
use storm_core::grid::Mask;
use storm_core::writer::RecordSink;
use tracing::info;

/// A mask in row-major order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskSnapshot {
    pub time: f64,
    pub rows: usize,
    pub cols: usize,
    pub labels: Vec<u32>,
}

impl From<&Mask> for MaskSnapshot {
    fn from(mask: &Mask) -> Self {
        let (rows, cols) = mask.shape();
        let labels = (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .map(|ij| mask.labels[ij])
            .collect();
        Self {
            time: mask.time,
            rows,
            cols,
            labels,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CategorySummary {
    pub rows: usize,
    pub masks: usize,
    /// Distinct universal ids seen in attribute rows
    pub objects: usize,
    pub first_time: Option<f64>,
    pub last_time: Option<f64>,
}

/// Writes attribute rows, masks and a run summary as JSON files.
pub struct JsonRunWriter {
    dir: PathBuf,
    summaries: BTreeMap<String, CategorySummary>,
    universal_ids: BTreeMap<String, BTreeSet<u64>>,
}

impl JsonRunWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join("masks"))?;
        Ok(Self {
            dir,
            summaries: BTreeMap::new(),
            universal_ids: BTreeMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn attributes_path(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}_attributes.jsonl"))
    }
}

impl RecordSink for JsonRunWriter {
    fn write(&mut self, category: &str, rows: &[AttributeRow], masks: &[Mask]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.attributes_path(category))?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row).map_err(std::io::Error::from)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        for mask in masks {
            let path = self
                .dir
                .join("masks")
                .join(format!("{category}_{:010.0}.json", mask.time));
            let writer = BufWriter::new(fs::File::create(path)?);
            serde_json::to_writer(writer, &MaskSnapshot::from(mask)).map_err(std::io::Error::from)?;
        }

        let summary = self.summaries.entry(category.to_string()).or_default();
        summary.rows += rows.len();
        summary.masks += masks.len();
        for row in rows {
            summary.first_time = Some(summary.first_time.map_or(row.time, |t| t.min(row.time)));
            summary.last_time = Some(summary.last_time.map_or(row.time, |t| t.max(row.time)));
        }
        let ids = self.universal_ids.entry(category.to_string()).or_default();
        ids.extend(rows.iter().filter_map(|r| r.universal_id.map(|u| u.0)));
        summary.objects = ids.len();
        Ok(())
    }

    fn aggregate(&mut self) -> Result<()> {
        let path = self.dir.join("summary.json");
        let writer = BufWriter::new(fs::File::create(&path)?);
        serde_json::to_writer_pretty(writer, &self.summaries).map_err(std::io::Error::from)?;
        info!(path = %path.display(), categories = self.summaries.len(), "wrote run summary");
        Ok(())
    }
}

//! Tracker orchestrator: the full detect/match/record/write cycle per time step.
//!
//! # Processing steps per time step
//! 1. Update and convert every dataset, take each dataset's grid
//! 2. For each hierarchy level in order, for each category (in parallel):
//!    a. Detect objects (grid-based, or grouping lower-level masks)
//!    b. Advance the category's state to the new time
//!    c. Match against the previous mask and assign universal ids
//!    d. Record attributes of the previous matched objects
//! 3. Hand due output to the sink (sequential)

use crate::attribute::{record, RecordContext, RecordTarget};
use crate::correlate::{FlowCorrelator, MotionCorrelator};
use crate::dataset::DatasetAdapter;
use crate::detect::detect;
use crate::error::{Result, TrackError};
use crate::grid::{Grid, Mask};
use crate::matcher::match_objects;
use crate::options::{DetectionMethod, ObjectOptions, TrackOptions};
use crate::tracks::ObjectTracks;
use crate::writer::{flush, RecordSink};
use grid_models::GridOptions;
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One object category: its options and its exclusively owned state.
#[derive(Clone, Debug)]
pub struct Category {
    pub options: ObjectOptions,
    pub tracks: ObjectTracks,
}

#[derive(Clone, Debug, Default)]
pub struct Level {
    pub categories: Vec<Category>,
}

/// Summary of one processed time step.
#[derive(Clone, Debug, Default)]
pub struct StepOutput {
    pub time: f64,
    /// Objects detected per category
    pub objects: Vec<(String, usize)>,
    /// Categories whose output was written this step
    pub written: Vec<String>,
    pub total_time_us: u64,
}

/// Everything a category needs from the step, shared read-only across threads.
struct StepInputs<'a> {
    time: f64,
    grids: &'a HashMap<String, Grid>,
    boundaries: &'a HashMap<String, DMatrix<bool>>,
    lower_masks: &'a HashMap<String, Mask>,
    grid_options: &'a GridOptions,
    correlator: &'a dyn MotionCorrelator,
}

pub struct Tracker {
    pub grid_options: GridOptions,
    pub levels: Vec<Level>,
    correlator: Box<dyn MotionCorrelator>,
    last_time: Option<f64>,
}

impl Tracker {
    /// Validate `options` against `datasets` and set up one state per
    /// category, using the default [`FlowCorrelator`].
    pub fn new<D: DatasetAdapter>(options: TrackOptions, grid_options: GridOptions, datasets: &[D]) -> Result<Self> {
        Self::with_correlator(options, grid_options, datasets, Box::new(FlowCorrelator))
    }

    pub fn with_correlator<D: DatasetAdapter>(
        options: TrackOptions,
        grid_options: GridOptions,
        datasets: &[D],
        correlator: Box<dyn MotionCorrelator>,
    ) -> Result<Self> {
        grid_options.check()?;
        for dataset in datasets {
            dataset.check_options()?;
        }
        let names: Vec<&str> = datasets.iter().map(|d| d.name()).collect();
        options.check(&names)?;

        let cell_areas = grid_options.cell_areas();
        let levels = options
            .levels
            .into_iter()
            .map(|level| Level {
                categories: level
                    .objects
                    .into_iter()
                    .map(|options| {
                        let tracks = ObjectTracks::new(
                            options.name.clone(),
                            options.deque_length,
                            cell_areas.clone(),
                            options.write.interval,
                        );
                        Category { options, tracks }
                    })
                    .collect(),
            })
            .collect();
        info!(datasets = ?names, "tracker initialised");
        Ok(Self {
            grid_options,
            levels,
            correlator,
            last_time: None,
        })
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.levels
            .iter()
            .flat_map(|l| l.categories.iter())
            .find(|c| c.options.name == name)
    }

    /// Process one time step. Times must strictly increase.
    pub fn step<D: DatasetAdapter>(
        &mut self,
        time: f64,
        datasets: &mut [D],
        sink: &mut dyn RecordSink,
    ) -> Result<StepOutput> {
        let start = Instant::now();
        if let Some(last) = self.last_time {
            if time <= last {
                return Err(TrackError::Dataset(format!("time {time} does not follow {last}")));
            }
        }
        self.last_time = Some(time);

        let mut grids = HashMap::new();
        let mut boundaries = HashMap::new();
        for dataset in datasets.iter_mut() {
            dataset.update(time)?;
            dataset.convert()?;
            match dataset.grid_from(time)? {
                Some(grid) => {
                    grids.insert(dataset.name().to_string(), grid);
                }
                None => warn!(dataset = dataset.name(), time, "no grid for time"),
            }
            if let Some(boundary) = dataset.boundary_mask() {
                boundaries.insert(dataset.name().to_string(), boundary.clone());
            }
        }

        let mut output = StepOutput {
            time,
            ..Default::default()
        };
        let mut lower_masks: HashMap<String, Mask> = HashMap::new();
        for level in &mut self.levels {
            let inputs = StepInputs {
                time,
                grids: &grids,
                boundaries: &boundaries,
                lower_masks: &lower_masks,
                grid_options: &self.grid_options,
                correlator: self.correlator.as_ref(),
            };
            level
                .categories
                .par_iter_mut()
                .map(|category| process_category(category, &inputs))
                .collect::<Result<Vec<()>>>()?;

            for category in &level.categories {
                if let Some(mask) = &category.tracks.current_mask {
                    if mask.time == time {
                        output.objects.push((category.options.name.clone(), mask.ids().len()));
                        lower_masks.insert(category.options.name.clone(), mask.clone());
                    }
                }
            }
        }

        for category in self.levels.iter_mut().flat_map(|l| l.categories.iter_mut()) {
            if category.tracks.write_schedule.due(time) {
                flush(&mut category.tracks, sink, time)?;
                output.written.push(category.options.name.clone());
            }
        }

        output.total_time_us = start.elapsed().as_micros() as u64;
        info!(time, objects = ?output.objects, elapsed_us = output.total_time_us, "step complete");
        Ok(output)
    }

    /// Record the last matched masks, write everything pending and aggregate.
    pub fn finish<D: DatasetAdapter>(&mut self, datasets: &[D], sink: &mut dyn RecordSink) -> Result<()> {
        let boundaries: HashMap<String, DMatrix<bool>> = datasets
            .iter()
            .filter_map(|d| d.boundary_mask().map(|b| (d.name().to_string(), b.clone())))
            .collect();
        for category in self.levels.iter_mut().flat_map(|l| l.categories.iter_mut()) {
            record_final(category, &self.grid_options, &boundaries)?;
            if let Some(time) = category.tracks.current_time {
                flush(&mut category.tracks, sink, time)?;
            }
        }
        sink.aggregate()?;
        info!("run finished");
        Ok(())
    }
}

fn process_category(category: &mut Category, inputs: &StepInputs<'_>) -> Result<()> {
    let options = &category.options;
    let tracks = &mut category.tracks;

    let grid = options.dataset.as_ref().and_then(|d| inputs.grids.get(d));
    let empty = Mask::empty(inputs.time, tracks.cell_areas.shape());
    let members: Vec<&Mask> = match &options.detection.method {
        DetectionMethod::Group { members } => members
            .iter()
            .map(|m| inputs.lower_masks.get(m).unwrap_or(&empty))
            .collect(),
        _ => {
            if grid.is_none() {
                warn!(object = %options.name, time = inputs.time, "no grid, skipping");
                return Ok(());
            }
            Vec::new()
        }
    };

    let mask = detect(inputs.time, grid, &options.detection, &tracks.cell_areas, &members)?;
    debug!(object = %options.name, objects = mask.max_id(), "detected");
    tracks.advance(inputs.time, grid.cloned(), mask);
    match_objects(tracks, options.tracking.as_ref(), inputs.grid_options, inputs.correlator)?;

    let boundary = options.dataset.as_ref().and_then(|d| inputs.boundaries.get(d));
    let context = RecordContext {
        attributes: &options.attributes,
        grid_options: inputs.grid_options,
        cell_areas: &tracks.cell_areas,
        boundary,
        time_interval: tracks.time_interval,
    };

    if options.tracking.is_some() {
        // Objects of the previous mask, now that their motion is known
        let (Some(previous_mask), Some(previous_matched)) =
            (tracks.previous_mask(), tracks.previous_matched_masks.latest())
        else {
            return Ok(());
        };
        let object_record = &tracks.object_record;
        let targets: Vec<RecordTarget> = object_record
            .previous_ids
            .iter()
            .enumerate()
            .map(|(k, &id)| RecordTarget {
                id,
                universal_id: Some(object_record.universal_ids[k]),
                displacement: object_record.current_displacements.get(k).copied().flatten(),
            })
            .collect();
        let rows = record(&context, previous_mask, &targets)?;
        let previous_matched = previous_matched.clone();
        tracks.attribute_rows.extend(rows);
        if options.write.save_masks {
            tracks.pending_masks.push(previous_matched);
        }
    } else if let Some(mask) = &tracks.current_mask {
        let targets: Vec<RecordTarget> = mask
            .ids()
            .into_iter()
            .map(|id| RecordTarget {
                id,
                universal_id: None,
                displacement: None,
            })
            .collect();
        let rows = record(&context, mask, &targets)?;
        let mask = mask.clone();
        tracks.attribute_rows.extend(rows);
        if options.write.save_masks {
            tracks.pending_masks.push(mask);
        }
    }
    Ok(())
}

/// Record the current matched objects of a tracked category without
/// velocities; no later step will supply their motion.
fn record_final(
    category: &mut Category,
    grid_options: &GridOptions,
    boundaries: &HashMap<String, DMatrix<bool>>,
) -> Result<()> {
    let options = &category.options;
    let tracks = &mut category.tracks;
    if options.tracking.is_none() {
        return Ok(());
    }
    let (Some(mask), Some(matched)) = (&tracks.current_mask, &tracks.current_matched_mask) else {
        return Ok(());
    };
    let targets: Vec<RecordTarget> = mask
        .ids()
        .into_iter()
        .map(|id| RecordTarget {
            id,
            universal_id: tracks.universal_id_of(id),
            displacement: None,
        })
        .collect();
    let context = RecordContext {
        attributes: &options.attributes,
        grid_options,
        cell_areas: &tracks.cell_areas,
        boundary: options.dataset.as_ref().and_then(|d| boundaries.get(d)),
        time_interval: None,
    };
    let rows = record(&context, mask, &targets)?;
    let matched = matched.clone();
    tracks.attribute_rows.extend(rows);
    if options.write.save_masks {
        tracks.pending_masks.push(matched);
    }
    Ok(())
}

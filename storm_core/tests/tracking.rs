//! End-to-end tracking over a few frames of synthetic storms.

use approx::assert_abs_diff_eq;
use grid_models::GridOptions;
use nalgebra::DMatrix;
use storm_core::dataset::DatasetAdapter;
use storm_core::error::Result;
use storm_core::grid::Grid;
use storm_core::options::{LevelOptions, ObjectOptions, TrackOptions};
use storm_core::{MemorySink, Tracker, UniversalId};

const STEP: f64 = 600.0;
const SPACING: f64 = 2500.0;

/// A storm: start position, per-step motion and the steps it is alive.
#[derive(Clone, Copy)]
struct Storm {
    start: (f64, f64),
    velocity: (f64, f64),
    alive: (usize, usize),
}

struct MovingStorms {
    options: GridOptions,
    storms: Vec<Storm>,
    field: Option<DMatrix<f64>>,
}

impl MovingStorms {
    fn new(storms: Vec<Storm>) -> Self {
        Self {
            options: GridOptions::cartesian((60, 60), (0.0, 0.0), [SPACING, SPACING]),
            storms,
            field: None,
        }
    }
}

impl DatasetAdapter for MovingStorms {
    fn name(&self) -> &str {
        "moving"
    }

    fn grid_options(&self) -> &GridOptions {
        &self.options
    }

    fn check_options(&self) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, time: f64) -> Result<()> {
        let step = (time / STEP).round() as usize;
        let live: Vec<(f64, f64)> = self
            .storms
            .iter()
            .filter(|s| (s.alive.0..=s.alive.1).contains(&step))
            .map(|s| {
                (
                    s.start.0 + s.velocity.0 * step as f64,
                    s.start.1 + s.velocity.1 * step as f64,
                )
            })
            .collect();
        let (n_rows, n_cols) = self.options.shape();
        self.field = Some(DMatrix::from_fn(n_rows, n_cols, |i, j| {
            live.iter()
                .map(|&(r, c)| {
                    let d2 = (i as f64 - r).powi(2) + (j as f64 - c).powi(2);
                    50.0 * (-d2 / 18.0).exp()
                })
                .fold(0.0, f64::max)
        }));
        Ok(())
    }

    fn convert(&mut self) -> Result<()> {
        Ok(())
    }

    fn grid_from(&self, time: f64) -> Result<Option<Grid>> {
        self.field
            .clone()
            .map(|field| Grid::from_options(time, field, &self.options))
            .transpose()
    }

    fn boundary_mask(&self) -> Option<&DMatrix<bool>> {
        None
    }
}

fn cell_options() -> TrackOptions {
    TrackOptions {
        levels: vec![LevelOptions {
            objects: vec![ObjectOptions {
                name: "cell".into(),
                dataset: Some("moving".into()),
                ..Default::default()
            }],
        }],
    }
}

fn run(storms: Vec<Storm>, steps: usize) -> (Tracker, MemorySink) {
    let mut datasets = vec![MovingStorms::new(storms)];
    let grid_options = datasets[0].options.clone();
    let mut tracker = Tracker::new(cell_options(), grid_options, &datasets).unwrap();
    let mut sink = MemorySink::default();
    for step in 0..steps {
        tracker.step(step as f64 * STEP, &mut datasets, &mut sink).unwrap();
    }
    tracker.finish(&datasets, &mut sink).unwrap();
    (tracker, sink)
}

#[test]
fn persistent_storms_keep_their_ids() {
    let storms = vec![
        Storm {
            start: (12.0, 12.0),
            velocity: (1.0, 1.0),
            alive: (0, 10),
        },
        Storm {
            start: (40.0, 30.0),
            velocity: (1.0, 1.0),
            alive: (0, 10),
        },
    ];
    let (tracker, sink) = run(storms, 5);

    let cell = tracker.category("cell").unwrap();
    assert_eq!(cell.tracks.object_count, 2);
    assert!(sink.aggregated);

    let rows = &sink.rows["cell"];
    assert_eq!(rows.len(), 10);
    for row in rows {
        assert!(matches!(row.universal_id, Some(UniversalId(1)) | Some(UniversalId(2))));
    }
    // Every row but the final ones carries the storms' velocity
    for row in rows.iter().filter(|r| r.time < 4.0 * STEP) {
        assert_abs_diff_eq!(row.u.unwrap(), SPACING / STEP, epsilon = 1e-6);
        assert_abs_diff_eq!(row.v.unwrap(), SPACING / STEP, epsilon = 1e-6);
    }
    assert!(rows.iter().filter(|r| r.time == 4.0 * STEP).all(|r| r.u.is_none()));
    assert_eq!(sink.masks["cell"].len(), 5);
}

#[test]
fn universal_ids_are_never_reused() {
    let storms = vec![
        Storm {
            start: (10.0, 10.0),
            velocity: (0.0, 1.0),
            alive: (0, 10),
        },
        Storm {
            start: (45.0, 20.0),
            velocity: (0.0, 1.0),
            alive: (0, 1),
        },
        Storm {
            start: (30.0, 45.0),
            velocity: (0.0, -1.0),
            alive: (3, 10),
        },
    ];
    let (tracker, sink) = run(storms, 5);

    let cell = tracker.category("cell").unwrap();
    assert_eq!(cell.tracks.object_count, 3);

    let ids_at = |t: f64| {
        let mut ids: Vec<u64> = sink.rows["cell"]
            .iter()
            .filter(|r| r.time == t)
            .filter_map(|r| r.universal_id.map(|u| u.0))
            .collect();
        ids.sort_unstable();
        ids
    };
    assert_eq!(ids_at(0.0), vec![1, 2]);
    assert_eq!(ids_at(2.0 * STEP), vec![1]);
    assert_eq!(ids_at(3.0 * STEP), vec![1, 3]);
    assert_eq!(ids_at(4.0 * STEP), vec![1, 3]);

    let matched = cell.tracks.current_matched_mask.as_ref().unwrap();
    let mut labels: Vec<u32> = matched.labels.iter().copied().filter(|&l| l != 0).collect();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels, vec![1, 3]);
}

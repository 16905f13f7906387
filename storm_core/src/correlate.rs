//! Motion estimation and candidate matching between consecutive masks.
//!
//! # Algorithm ([`FlowCorrelator`])
//! 1. **Global flow**: the shift (within `global_flow_margin` pixels) that
//!    maximises the normalised cross-correlation of the previous and current
//!    fields over the whole domain.
//! 2. **Local flow**: per previous object, the shift within
//!    `local_flow_margin` pixels of the global flow that maximises the
//!    correlation over the object's bounding box padded by `search_margin`.
//! 3. **Prediction**: previous centre + local flow.
//! 4. **Gating**: a current object is a candidate if its centre lies within
//!    `max_match_distance` pixels of the prediction.
//! 5. **Assignment**: minimum total distance one-to-one matching per group of
//!    linked candidates ([`assign`]).

use crate::association::{assign, CandidateGraph};
use crate::error::{Result, TrackError};
use crate::grid::Mask;
use crate::object::object_geometries;
use crate::options::TrackingOptions;
use crate::tracks::ObjectTracks;
use crate::types::{Displacement, TransientId};
use grid_models::GridOptions;
use nalgebra::DMatrix;
use tracing::debug;

/// Matches between the previous and the current mask of one category.
/// All vectors are parallel to `previous_ids`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchData {
    pub previous_ids: Vec<TransientId>,
    pub matched_current_ids: Vec<Option<TransientId>>,
    /// Local flow used to predict each previous object's position
    pub previous_displacements: Vec<Displacement>,
    /// Centre shift from each previous object to its match
    pub current_displacements: Vec<Option<Displacement>>,
    pub global_flow: Option<Displacement>,
}

/// Estimates motion and pairs previous objects with current ones.
pub trait MotionCorrelator: Send + Sync {
    fn get_matches(
        &self,
        tracks: &ObjectTracks,
        options: &TrackingOptions,
        grid_options: &GridOptions,
    ) -> Result<MatchData>;
}

/// Cross-correlation flow + minimum-cost assignment.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowCorrelator;

/// Inclusive cell region: rows `r0..=r1`, cols `c0..=c1`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Region {
    r0: usize,
    r1: usize,
    c0: usize,
    c1: usize,
}

impl MotionCorrelator for FlowCorrelator {
    fn get_matches(
        &self,
        tracks: &ObjectTracks,
        options: &TrackingOptions,
        _grid_options: &GridOptions,
    ) -> Result<MatchData> {
        let (Some(previous_mask), Some(current_mask)) = (tracks.previous_mask(), tracks.current_mask.as_ref()) else {
            return Ok(MatchData::default());
        };
        if previous_mask.shape() != current_mask.shape() {
            return Err(TrackError::Shape {
                expected: previous_mask.shape(),
                got: current_mask.shape(),
            });
        }

        let (n_rows, n_cols) = previous_mask.shape();
        if n_rows == 0 || n_cols == 0 {
            return Ok(MatchData::default());
        }
        let previous_field = correlation_field(tracks.previous_grid().map(|g| &g.values), previous_mask);
        let current_field = correlation_field(tracks.current_grid.as_ref().map(|g| &g.values), current_mask);
        let domain = Region {
            r0: 0,
            r1: n_rows - 1,
            c0: 0,
            c1: n_cols - 1,
        };

        let global_flow = best_shift(
            &previous_field,
            &current_field,
            domain,
            (0, 0),
            options.global_flow_margin as i64,
        );
        debug!(object = %tracks.name, rows = global_flow.rows, cols = global_flow.cols, "global flow");

        let previous = object_geometries(previous_mask, &tracks.cell_areas)?;
        let current = object_geometries(current_mask, &tracks.cell_areas)?;
        let previous_ids: Vec<TransientId> = previous.keys().copied().collect();
        let current_ids: Vec<TransientId> = current.keys().copied().collect();

        let margin = options.search_margin;
        let previous_displacements: Vec<Displacement> = previous
            .values()
            .map(|geo| {
                let (r0, r1, c0, c1) = geo.bbox;
                let region = Region {
                    r0: r0.saturating_sub(margin),
                    r1: (r1 + margin).min(n_rows - 1),
                    c0: c0.saturating_sub(margin),
                    c1: (c1 + margin).min(n_cols - 1),
                };
                best_shift(
                    &previous_field,
                    &current_field,
                    region,
                    (global_flow.rows as i64, global_flow.cols as i64),
                    options.local_flow_margin as i64,
                )
            })
            .collect();

        let mut graph = CandidateGraph::new(previous_ids.len(), current_ids.len());
        for (i, geo) in previous.values().enumerate() {
            let predicted = geo.center.offset(previous_displacements[i]);
            for (j, cur) in current.values().enumerate() {
                let distance = predicted.displacement_to(&cur.center).norm();
                if distance <= options.max_match_distance {
                    graph.add(i, j, distance);
                }
            }
        }

        let previous_geo: Vec<_> = previous.values().collect();
        let current_geo: Vec<_> = current.values().collect();
        let assignment = assign(&graph, options.dummy_cost);
        let matched_current_ids: Vec<Option<TransientId>> =
            assignment.iter().map(|m| m.map(|j| current_ids[j])).collect();
        let current_displacements = assignment
            .iter()
            .enumerate()
            .map(|(i, m)| m.map(|j| previous_geo[i].center.displacement_to(&current_geo[j].center)))
            .collect();
        debug!(
            object = %tracks.name,
            previous = previous_ids.len(),
            current = current_ids.len(),
            matched = matched_current_ids.iter().flatten().count(),
            "correlated objects"
        );

        Ok(MatchData {
            previous_ids,
            matched_current_ids,
            previous_displacements,
            current_displacements,
            global_flow: Some(global_flow),
        })
    }
}

/// Field used for correlation: the grid with NaN as 0, or, for categories
/// detected without a grid, the binary object mask.
fn correlation_field(values: Option<&DMatrix<f64>>, mask: &Mask) -> DMatrix<f64> {
    match values {
        Some(v) if v.shape() == mask.shape() => v.map(|x| if x.is_nan() { 0.0 } else { x }),
        _ => mask.labels.map(|l| if l != 0 { 1.0 } else { 0.0 }),
    }
}

/// Shift `(dr, dc)` within `margin` of `center` maximising the normalised
/// cross-correlation of `previous` over `region` with `current` displaced by
/// the shift. Ties keep the shift closest to `center`.
fn best_shift(
    previous: &DMatrix<f64>,
    current: &DMatrix<f64>,
    region: Region,
    center: (i64, i64),
    margin: i64,
) -> Displacement {
    let mut shifts: Vec<(i64, i64)> = (-margin..=margin)
        .flat_map(|dr| (-margin..=margin).map(move |dc| (dr, dc)))
        .collect();
    shifts.sort_by_key(|&(dr, dc)| dr * dr + dc * dc);

    let mut best = (center, f64::NEG_INFINITY);
    for (dr, dc) in shifts {
        let shift = (center.0 + dr, center.1 + dc);
        let score = correlation(previous, current, region, shift);
        if score > best.1 {
            best = (shift, score);
        }
    }
    Displacement::new(best.0 .0 as f64, best.0 .1 as f64)
}

fn correlation(previous: &DMatrix<f64>, current: &DMatrix<f64>, region: Region, shift: (i64, i64)) -> f64 {
    let (n_rows, n_cols) = (current.nrows() as i64, current.ncols() as i64);
    let (mut ab, mut aa, mut bb) = (0.0, 0.0, 0.0);
    for i in region.r0..=region.r1 {
        let si = i as i64 + shift.0;
        if si < 0 || si >= n_rows {
            continue;
        }
        for j in region.c0..=region.c1 {
            let sj = j as i64 + shift.1;
            if sj < 0 || sj >= n_cols {
                continue;
            }
            let a = previous[(i, j)];
            let b = current[(si as usize, sj as usize)];
            ab += a * b;
            aa += a * a;
            bb += b * b;
        }
    }
    let denom = (aa * bb).sqrt();
    if denom > 0.0 {
        ab / denom
    } else {
        0.0
    }
}

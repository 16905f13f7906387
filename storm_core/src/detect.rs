//! Object detection: turn a grid (or lower-level masks) into a labelled mask.
//!
//! Regions are 4-connected. Labels are assigned 1..=n in row-major order of
//! each region's first cell, after objects smaller than `min_area` km² are
//! removed.

use crate::association::DisjointSets;
use crate::error::{Result, TrackError};
use crate::grid::{Grid, Mask};
use crate::options::{DetectionMethod, DetectionOptions};
use crate::steiner::{classify, CONVECTIVE};
use nalgebra::DMatrix;
use tracing::debug;

/// Label 4-connected regions of cells for which `inside` holds.
pub fn label_regions(shape: (usize, usize), inside: impl Fn(usize, usize) -> bool) -> DMatrix<u32> {
    let (n_rows, n_cols) = shape;
    let idx = |i: usize, j: usize| i * n_cols + j;
    let mut uf = DisjointSets::new(n_rows * n_cols);
    for i in 0..n_rows {
        for j in 0..n_cols {
            if !inside(i, j) {
                continue;
            }
            if j + 1 < n_cols && inside(i, j + 1) {
                uf.union(idx(i, j), idx(i, j + 1));
            }
            if i + 1 < n_rows && inside(i + 1, j) {
                uf.union(idx(i, j), idx(i + 1, j));
            }
        }
    }

    let mut root_label = vec![0u32; n_rows * n_cols];
    let mut next = 0u32;
    let mut labels = DMatrix::zeros(n_rows, n_cols);
    for i in 0..n_rows {
        for j in 0..n_cols {
            if !inside(i, j) {
                continue;
            }
            let root = uf.find(idx(i, j));
            if root_label[root] == 0 {
                next += 1;
                root_label[root] = next;
            }
            labels[(i, j)] = root_label[root];
        }
    }
    labels
}

/// Drop objects whose area is below `min_area` (km²) and renumber the rest
/// contiguously, preserving order.
pub fn remove_small_objects(labels: &DMatrix<u32>, cell_areas: &DMatrix<f64>, min_area: f64) -> Result<DMatrix<u32>> {
    if labels.shape() != cell_areas.shape() {
        return Err(TrackError::Shape {
            expected: labels.shape(),
            got: cell_areas.shape(),
        });
    }
    let n_ids = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut areas = vec![0.0f64; n_ids + 1];
    for (label, area) in labels.iter().zip(cell_areas.iter()) {
        areas[*label as usize] += area;
    }
    let mut table = vec![0u32; n_ids + 1];
    let mut next = 0u32;
    for id in 1..=n_ids {
        if areas[id] > 0.0 && areas[id] >= min_area {
            next += 1;
            table[id] = next;
        }
    }
    Ok(labels.map(|v| table[v as usize]))
}

/// Detect the objects of one category.
///
/// `grid` is required for grid-based methods; `members` holds the current
/// masks of a group's member objects.
pub fn detect(
    time: f64,
    grid: Option<&Grid>,
    options: &DetectionOptions,
    cell_areas: &DMatrix<f64>,
    members: &[&Mask],
) -> Result<Mask> {
    let labels = match &options.method {
        DetectionMethod::Steiner { steiner } => {
            let grid = require_grid(grid)?;
            let classes = classify(&grid.values, &grid.x, &grid.y, steiner, grid.coordinates);
            label_regions(grid.shape(), |i, j| classes[(i, j)] == CONVECTIVE)
        }
        DetectionMethod::Threshold { threshold } => {
            let grid = require_grid(grid)?;
            label_regions(grid.shape(), |i, j| grid.values[(i, j)] >= *threshold)
        }
        DetectionMethod::Group { .. } => {
            let shape = cell_areas.shape();
            if let Some(bad) = members.iter().find(|m| m.shape() != shape) {
                return Err(TrackError::Shape {
                    expected: shape,
                    got: bad.shape(),
                });
            }
            label_regions(shape, |i, j| members.iter().any(|m| m.labels[(i, j)] != 0))
        }
    };
    let labels = remove_small_objects(&labels, cell_areas, options.min_area)?;
    let mask = Mask::new(time, labels);
    debug!(objects = mask.max_id(), "detected objects");
    Ok(mask)
}

fn require_grid(grid: Option<&Grid>) -> Result<&Grid> {
    grid.ok_or_else(|| TrackError::Dataset("grid-based detection requires a grid".into()))
}

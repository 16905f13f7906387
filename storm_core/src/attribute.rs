//! Per-object attributes recorded each time step.

use crate::error::{ConfigError, Result, TrackError};
use crate::grid::Mask;
use crate::object::object_geometries;
use crate::options::ObjectOptions;
use crate::types::{Displacement, TransientId, UniversalId};
use grid_models::GridOptions;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Time,
    Id,
    UniversalId,
    /// Area-weighted centre in grid coordinates
    Center,
    /// km²
    Area,
    /// Eastward/northward speed in m/s
    Velocity,
    /// Fraction of the object's area on the domain boundary
    BoundaryOverlap,
}

impl AttributeKind {
    pub fn defaults() -> Vec<AttributeKind> {
        vec![
            AttributeKind::Time,
            AttributeKind::Id,
            AttributeKind::UniversalId,
            AttributeKind::Center,
            AttributeKind::Area,
            AttributeKind::Velocity,
        ]
    }
}

/// Validate the attribute set of one object category. At least one of `Id`
/// and `UniversalId` identifies each row.
pub fn check_attributes(attributes: &[AttributeKind], object: &ObjectOptions) -> Result<()> {
    let missing_id =
        !attributes.contains(&AttributeKind::Id) && !attributes.contains(&AttributeKind::UniversalId);
    if missing_id {
        return Err(ConfigError::MissingIdAttribute {
            object: object.name.clone(),
        }
        .into());
    }
    if attributes.contains(&AttributeKind::BoundaryOverlap) && object.dataset.is_none() {
        return Err(ConfigError::MissingDataset {
            object: object.name.clone(),
        }
        .into());
    }
    Ok(())
}

/// One object at one time. Attributes that were not requested stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeRow {
    pub time: f64,
    pub id: TransientId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub universal_id: Option<UniversalId>,
    /// Row coordinate of the centre (latitude or y)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_row: Option<f64>,
    /// Column coordinate of the centre (longitude or x)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_col: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub u: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary_overlap: Option<f64>,
}

/// An object to record: its transient id in the mask being recorded, its
/// universal id and its displacement (pixels) over the following interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordTarget {
    pub id: TransientId,
    pub universal_id: Option<UniversalId>,
    pub displacement: Option<Displacement>,
}

/// Everything attribute recording needs besides the objects themselves.
#[derive(Clone, Copy, Debug)]
pub struct RecordContext<'a> {
    pub attributes: &'a [AttributeKind],
    pub grid_options: &'a GridOptions,
    pub cell_areas: &'a DMatrix<f64>,
    pub boundary: Option<&'a DMatrix<bool>>,
    /// Seconds over which `RecordTarget::displacement` happened
    pub time_interval: Option<f64>,
}

/// Record the attributes of `targets` in `mask` at `mask.time`.
pub fn record(context: &RecordContext<'_>, mask: &Mask, targets: &[RecordTarget]) -> Result<Vec<AttributeRow>> {
    let geometries = object_geometries(mask, context.cell_areas)?;
    let wants = |kind| context.attributes.contains(&kind);
    let overlaps = if wants(AttributeKind::BoundaryOverlap) {
        Some(boundary_overlaps(mask, context.cell_areas, context.boundary)?)
    } else {
        None
    };

    let mut rows = Vec::with_capacity(targets.len());
    for target in targets {
        let Some(geo) = geometries.get(&target.id) else {
            continue;
        };
        let mut row = AttributeRow {
            time: mask.time,
            id: target.id,
            ..Default::default()
        };
        if wants(AttributeKind::UniversalId) {
            row.universal_id = target.universal_id;
        }
        if wants(AttributeKind::Center) {
            let (r, c) = context.grid_options.pixel_to_coordinates(geo.center.row, geo.center.col);
            row.center_row = Some(r);
            row.center_col = Some(c);
        }
        if wants(AttributeKind::Area) {
            row.area = Some(geo.area);
        }
        if wants(AttributeKind::Velocity) {
            if let (Some(d), Some(dt)) = (target.displacement, context.time_interval.filter(|&dt| dt > 0.0)) {
                let (row_idx, col_idx) = geo.center.rounded();
                let (dy, dx) = context
                    .grid_options
                    .pixel_to_cartesian_vector(row_idx, col_idx, (d.rows, d.cols));
                row.u = Some(dx / dt);
                row.v = Some(dy / dt);
            }
        }
        if let Some(overlaps) = &overlaps {
            row.boundary_overlap = overlaps.get(target.id as usize).copied();
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Area fraction of every object lying on boundary cells, indexed by id.
/// Without a boundary mask every fraction is 0.
fn boundary_overlaps(mask: &Mask, cell_areas: &DMatrix<f64>, boundary: Option<&DMatrix<bool>>) -> Result<Vec<f64>> {
    let n_ids = mask.max_id() as usize;
    let Some(boundary) = boundary else {
        return Ok(vec![0.0; n_ids + 1]);
    };
    if boundary.shape() != mask.shape() {
        return Err(TrackError::Shape {
            expected: mask.shape(),
            got: boundary.shape(),
        });
    }
    let mut total = vec![0.0; n_ids + 1];
    let mut on_edge = vec![0.0; n_ids + 1];
    for ((&id, &area), &edge) in mask.labels.iter().zip(cell_areas.iter()).zip(boundary.iter()) {
        total[id as usize] += area;
        if edge {
            on_edge[id as usize] += area;
        }
    }
    Ok(total
        .iter()
        .zip(&on_edge)
        .map(|(&t, &e)| if t > 0.0 { e / t } else { 0.0 })
        .collect())
}

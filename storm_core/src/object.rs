//! Object records and per-object geometry.
//!
//! # Object record
//! For one matching step, the record lists every object of the previous mask
//! (`previous_ids`), the current object each one matched (or `None`), and the
//! universal id each one carries. The record is rebuilt every step; the old one
//! is pushed onto a bounded history.

use crate::correlate::MatchData;
use crate::error::{ConfigError, Result, TrackError};
use crate::grid::Mask;
use crate::tracks::ObjectTracks;
use crate::types::{Displacement, PixelCenter, TransientId, UniversalId};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Matching state of the objects in the previous mask.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub previous_ids: Vec<TransientId>,
    /// Current-mask id each previous id matched, parallel to `previous_ids`
    pub matched_current_ids: Vec<Option<TransientId>>,
    /// Universal id of each previous id, parallel to `previous_ids`
    pub universal_ids: Vec<UniversalId>,
    /// Current objects formed from several previous objects: universal id of
    /// the merged object → universal ids of all its predecessors
    pub parents: BTreeMap<UniversalId, Vec<UniversalId>>,
    pub global_flow: Option<Displacement>,
    /// Flow-based displacement predicted for each previous object
    pub previous_displacements: Vec<Displacement>,
    /// Observed centre displacement to the matched current object
    pub current_displacements: Vec<Option<Displacement>>,
}

impl ObjectRecord {
    pub fn is_empty(&self) -> bool {
        self.previous_ids.is_empty()
    }

    /// Universal id carried by previous object `previous_id`, if recorded.
    pub fn universal_id_of(&self, previous_id: TransientId) -> Option<UniversalId> {
        self.previous_ids
            .iter()
            .position(|&p| p == previous_id)
            .map(|k| self.universal_ids[k])
    }
}

/// Build the record from scratch: the category has just become matchable.
pub fn initialize_object_record(match_data: MatchData, tracks: &mut ObjectTracks) -> Result<()> {
    info!(object = %tracks.name, "new matchable objects, initializing object record");
    tracks.object_record = record_from_matches(match_data, tracks)?;
    Ok(())
}

/// Replace the record, keeping the old one in the bounded history.
pub fn update_object_record(match_data: MatchData, tracks: &mut ObjectTracks) -> Result<()> {
    debug!(object = %tracks.name, "updating object record");
    let record = record_from_matches(match_data, tracks)?;
    let previous = std::mem::replace(&mut tracks.object_record, record);
    tracks.previous_object_records.push(previous);
    Ok(())
}

/// Previous objects keep the universal id they were given when current. A
/// previous id absent from the matched mask means the correlator reported an
/// object that was never labelled.
fn record_from_matches(match_data: MatchData, tracks: &ObjectTracks) -> Result<ObjectRecord> {
    let universal_ids = match_data
        .previous_ids
        .iter()
        .map(|id| {
            tracks.universal_id_map.get(id).copied().ok_or_else(|| {
                TrackError::Dataset(format!("{}: previous object {id} has no universal id", tracks.name))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ObjectRecord {
        previous_ids: match_data.previous_ids,
        matched_current_ids: match_data.matched_current_ids,
        universal_ids,
        parents: BTreeMap::new(),
        global_flow: match_data.global_flow,
        previous_displacements: match_data.previous_displacements,
        current_displacements: match_data.current_displacements,
    })
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Area-weighted centre and total area (km²) of one object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectGeometry {
    pub center: PixelCenter,
    pub area: f64,
    /// Bounding box: (row_min, row_max, col_min, col_max), inclusive
    pub bbox: (usize, usize, usize, usize),
}

/// Area of object `id` in km².
pub fn object_area(mask: &Mask, id: TransientId, cell_areas: &DMatrix<f64>) -> f64 {
    mask.labels
        .iter()
        .zip(cell_areas.iter())
        .filter(|(&l, _)| l == id)
        .map(|(_, a)| a)
        .sum()
}

/// Weighted centre of object `id`. Weights are cell areas or field values;
/// a centroid without a weighting source is a configuration error.
pub fn object_center(mask: &Mask, id: TransientId, weights: Option<&DMatrix<f64>>) -> Result<Option<PixelCenter>> {
    let weights = weights.ok_or(ConfigError::MissingCellAreas)?;
    Ok(object_geometries(mask, weights)?.get(&id).map(|g| g.center))
}

/// Geometry of every object in `mask`, in one pass. NaN weights count as zero;
/// an object with zero total weight falls back to its unweighted centre.
pub fn object_geometries(mask: &Mask, weights: &DMatrix<f64>) -> Result<BTreeMap<TransientId, ObjectGeometry>> {
    if mask.shape() != weights.shape() {
        return Err(TrackError::Shape {
            expected: mask.shape(),
            got: weights.shape(),
        });
    }

    struct Acc {
        w: f64,
        wr: f64,
        wc: f64,
        n: f64,
        r: f64,
        c: f64,
        bbox: (usize, usize, usize, usize),
    }

    let mut accs: BTreeMap<TransientId, Acc> = BTreeMap::new();
    let (n_rows, n_cols) = mask.shape();
    for i in 0..n_rows {
        for j in 0..n_cols {
            let id = mask.labels[(i, j)];
            if id == 0 {
                continue;
            }
            let w = weights[(i, j)];
            let w = if w.is_nan() { 0.0 } else { w };
            let acc = accs.entry(id).or_insert(Acc {
                w: 0.0,
                wr: 0.0,
                wc: 0.0,
                n: 0.0,
                r: 0.0,
                c: 0.0,
                bbox: (i, i, j, j),
            });
            acc.w += w;
            acc.wr += w * i as f64;
            acc.wc += w * j as f64;
            acc.n += 1.0;
            acc.r += i as f64;
            acc.c += j as f64;
            acc.bbox.0 = acc.bbox.0.min(i);
            acc.bbox.1 = acc.bbox.1.max(i);
            acc.bbox.2 = acc.bbox.2.min(j);
            acc.bbox.3 = acc.bbox.3.max(j);
        }
    }

    Ok(accs
        .into_iter()
        .map(|(id, a)| {
            let center = if a.w > 0.0 {
                PixelCenter {
                    row: a.wr / a.w,
                    col: a.wc / a.w,
                }
            } else {
                PixelCenter {
                    row: a.r / a.n,
                    col: a.c / a.n,
                }
            };
            (
                id,
                ObjectGeometry {
                    center,
                    area: a.w,
                    bbox: a.bbox,
                },
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mask() -> Mask {
        #[rustfmt::skip]
        let labels = DMatrix::from_row_slice(3, 4, &[
            1, 1, 0, 2,
            1, 1, 0, 2,
            0, 0, 0, 2,
        ]);
        Mask::new(0.0, labels)
    }

    #[test]
    fn area_weighted_centre() {
        let mut areas = DMatrix::from_element(3, 4, 1.0);
        areas[(1, 1)] = 3.0;
        let c = object_center(&mask(), 1, Some(&areas)).unwrap().unwrap();
        // weights 1,1,1,3 on (0,0),(0,1),(1,0),(1,1)
        assert_abs_diff_eq!(c.row, 4.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.col, 4.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(object_area(&mask(), 2, &areas), 3.0);
    }

    #[test]
    fn centre_without_weights_is_config_error() {
        let err = object_center(&mask(), 1, None).unwrap_err();
        assert!(matches!(err, TrackError::Config(ConfigError::MissingCellAreas)));
    }

    #[test]
    fn geometries_include_bounding_boxes() {
        let areas = DMatrix::from_element(3, 4, 2.0);
        let geo = object_geometries(&mask(), &areas).unwrap();
        assert_eq!(geo.len(), 2);
        assert_eq!(geo[&2].bbox, (0, 2, 3, 3));
        assert_abs_diff_eq!(geo[&2].area, 6.0);
        assert_abs_diff_eq!(geo[&2].center.row, 1.0);
    }

    #[test]
    fn missing_object_has_no_centre() {
        let areas = DMatrix::from_element(3, 4, 1.0);
        assert!(object_center(&mask(), 9, Some(&areas)).unwrap().is_none());
    }
}

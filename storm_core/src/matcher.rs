//! Matching step and identity management.
//!
//! # Identity rules
//! - A current object targeted by a matched previous object inherits that
//!   object's universal id.
//! - A current object matched by several previous objects (merge) inherits
//!   the universal id of the last of them in record order; all predecessors
//!   are recorded as its parents.
//! - Every other current object receives a new universal id, minted in
//!   ascending transient-id order.
//! - Unmatched previous objects are dropped; their ids are never reused.
//! - Background (0) maps to 0.

use crate::correlate::MotionCorrelator;
use crate::error::Result;
use crate::object::{initialize_object_record, update_object_record, ObjectRecord};
use crate::options::TrackingOptions;
use crate::tracks::ObjectTracks;
use crate::types::{TransientId, UniversalId};
use grid_models::GridOptions;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Match the current mask of `tracks` against the previous one and relabel it
/// with universal ids. `None` options disable matching for the category.
pub fn match_objects(
    tracks: &mut ObjectTracks,
    options: Option<&TrackingOptions>,
    grid_options: &GridOptions,
    correlator: &dyn MotionCorrelator,
) -> Result<()> {
    let Some(options) = options else {
        return Ok(());
    };
    if tracks.current_mask.is_none() {
        return Ok(());
    }

    let previous_has_objects = tracks.previous_mask().is_some_and(|m| m.has_objects());
    if !previous_has_objects {
        info!(object = %tracks.name, "no previous objects, all current objects are new");
        tracks.object_record = ObjectRecord::default();
    } else {
        let match_data = correlator.get_matches(tracks, options, grid_options)?;
        if tracks.object_record.is_empty() {
            initialize_object_record(match_data, tracks)?;
        } else {
            update_object_record(match_data, tracks)?;
        }
    }
    build_matched_mask(tracks)
}

/// Assign universal ids to the current mask and store the relabelled mask.
fn build_matched_mask(tracks: &mut ObjectTracks) -> Result<()> {
    let Some(current_mask) = tracks.current_mask.as_ref() else {
        return Ok(());
    };

    let record = &tracks.object_record;
    let mut predecessors: BTreeMap<TransientId, Vec<UniversalId>> = BTreeMap::new();
    for (k, matched) in record.matched_current_ids.iter().enumerate() {
        if let Some(current_id) = matched {
            predecessors.entry(*current_id).or_default().push(record.universal_ids[k]);
        }
    }

    let current_ids = current_mask.ids();
    let mut table = vec![UniversalId::BACKGROUND.as_label()?; current_mask.max_id() as usize + 1];
    let mut universal_id_map = BTreeMap::new();
    let mut parents = BTreeMap::new();
    let mut new_objects = 0usize;
    for id in current_ids {
        let universal_id = match predecessors.remove(&id) {
            Some(preds) => {
                // Later entries overwrite earlier ones
                let carried = preds[preds.len() - 1];
                if preds.len() > 1 {
                    parents.insert(carried, preds);
                }
                carried
            }
            None => {
                new_objects += 1;
                tracks.mint_universal_id()
            }
        };
        table[id as usize] = universal_id.as_label()?;
        universal_id_map.insert(id, universal_id);
    }

    let matched_mask = tracks.current_mask.as_ref().map(|m| m.relabel(&table));
    if let Some(old) = std::mem::replace(&mut tracks.current_matched_mask, matched_mask) {
        tracks.previous_matched_masks.push(old);
    }
    tracks.universal_id_map = universal_id_map;
    if !parents.is_empty() {
        debug!(object = %tracks.name, merges = parents.len(), "merged objects");
    }
    tracks.object_record.parents = parents;
    debug!(
        object = %tracks.name,
        new_objects,
        object_count = tracks.object_count,
        "built matched mask"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::MatchData;
    use crate::error::{Result, TrackError};
    use crate::grid::Mask;
    use crate::types::Displacement;
    use nalgebra::DMatrix;

    /// Returns canned matches.
    struct StubCorrelator(MatchData);

    impl MotionCorrelator for StubCorrelator {
        fn get_matches(&self, _: &ObjectTracks, _: &TrackingOptions, _: &GridOptions) -> Result<MatchData> {
            Ok(self.0.clone())
        }
    }

    fn matches(previous: &[(TransientId, Option<TransientId>)]) -> StubCorrelator {
        StubCorrelator(MatchData {
            previous_ids: previous.iter().map(|p| p.0).collect(),
            matched_current_ids: previous.iter().map(|p| p.1).collect(),
            previous_displacements: vec![Displacement::default(); previous.len()],
            current_displacements: previous.iter().map(|p| p.1.map(|_| Displacement::default())).collect(),
            global_flow: Some(Displacement::default()),
        })
    }

    fn mask(time: f64, labels: &[u32]) -> Mask {
        Mask::new(time, DMatrix::from_row_slice(1, labels.len(), labels))
    }

    fn tracks_with_previous(previous: Mask, universal: &[(TransientId, u64)], object_count: u64) -> ObjectTracks {
        let mut tracks = ObjectTracks::new("cell", 2, DMatrix::from_element(1, previous.labels.ncols(), 1.0), 3600.0);
        tracks.advance(previous.time, None, previous);
        tracks.universal_id_map = universal.iter().map(|&(t, u)| (t, UniversalId(u))).collect();
        tracks.object_count = object_count;
        tracks
    }

    #[test]
    fn first_step_mints_ascending_ids() {
        let mut tracks = ObjectTracks::new("cell", 2, DMatrix::from_element(1, 6, 1.0), 3600.0);
        tracks.advance(0.0, None, mask(0.0, &[0, 2, 0, 1, 3, 3]));
        let stub = matches(&[]);
        match_objects(&mut tracks, Some(&TrackingOptions::default()), &GridOptions::default(), &stub).unwrap();
        assert_eq!(tracks.object_count, 3);
        let matched = tracks.current_matched_mask.as_ref().unwrap();
        assert_eq!(matched.labels, DMatrix::from_row_slice(1, 6, &[0, 2, 0, 1, 3, 3]));
        assert_eq!(tracks.object_record.global_flow, None);
        assert!(tracks.object_record.is_empty());
    }

    #[test]
    fn matched_object_keeps_universal_id() {
        let mut tracks = tracks_with_previous(mask(0.0, &[0, 5, 5, 0]), &[(5, 42)], 42);
        tracks.advance(600.0, None, mask(600.0, &[3, 0, 7, 7]));
        let stub = matches(&[(5, Some(7))]);
        match_objects(&mut tracks, Some(&TrackingOptions::default()), &GridOptions::default(), &stub).unwrap();

        assert_eq!(tracks.universal_id_of(7), Some(UniversalId(42)));
        assert_eq!(tracks.universal_id_of(3), Some(UniversalId(43)));
        assert_eq!(tracks.object_count, 43);
        let matched = tracks.current_matched_mask.as_ref().unwrap();
        assert_eq!(matched.labels, DMatrix::from_row_slice(1, 4, &[43, 0, 42, 42]));
        assert_eq!(tracks.object_record.universal_ids, vec![UniversalId(42)]);
    }

    #[test]
    fn unmatched_previous_ids_are_retired() {
        let mut tracks = tracks_with_previous(mask(0.0, &[1, 0, 2]), &[(1, 1), (2, 2)], 2);
        tracks.advance(600.0, None, mask(600.0, &[0, 0, 1]));
        let stub = matches(&[(1, None), (2, Some(1))]);
        match_objects(&mut tracks, Some(&TrackingOptions::default()), &GridOptions::default(), &stub).unwrap();
        assert_eq!(tracks.universal_id_of(1), Some(UniversalId(2)));
        assert_eq!(tracks.object_count, 2);

        // Next step: a brand new object gets 3, never 1
        tracks.advance(1200.0, None, mask(1200.0, &[1, 0, 2]));
        let stub = matches(&[(1, Some(2))]);
        match_objects(&mut tracks, Some(&TrackingOptions::default()), &GridOptions::default(), &stub).unwrap();
        assert_eq!(tracks.universal_id_of(2), Some(UniversalId(2)));
        assert_eq!(tracks.universal_id_of(1), Some(UniversalId(3)));
        assert_eq!(tracks.previous_object_records.len(), 1);
    }

    #[test]
    fn merge_carries_last_matched_previous_id() {
        let mut tracks = tracks_with_previous(mask(0.0, &[1, 0, 2]), &[(1, 7), (2, 4)], 7);
        tracks.advance(600.0, None, mask(600.0, &[1, 1, 1]));
        let stub = matches(&[(1, Some(1)), (2, Some(1))]);
        match_objects(&mut tracks, Some(&TrackingOptions::default()), &GridOptions::default(), &stub).unwrap();
        assert_eq!(tracks.universal_id_of(1), Some(UniversalId(4)));
        assert_eq!(
            tracks.object_record.parents.get(&UniversalId(4)),
            Some(&vec![UniversalId(7), UniversalId(4)])
        );
        assert_eq!(tracks.object_count, 7);
        assert_eq!(
            tracks.current_matched_mask.as_ref().unwrap().labels,
            DMatrix::from_row_slice(1, 3, &[4, 4, 4])
        );
    }

    #[test]
    fn unknown_previous_id_is_an_error() {
        let mut tracks = tracks_with_previous(mask(0.0, &[1, 0, 2]), &[(1, 1)], 1);
        tracks.advance(600.0, None, mask(600.0, &[1, 0, 0]));
        let stub = matches(&[(1, Some(1)), (2, None)]);
        let err = match_objects(&mut tracks, Some(&TrackingOptions::default()), &GridOptions::default(), &stub)
            .unwrap_err();
        assert!(matches!(err, TrackError::Dataset(_)));
        assert_eq!(tracks.object_count, 1);
    }

    #[test]
    fn universal_ids_beyond_label_range_are_rejected() {
        let mut tracks = ObjectTracks::new("cell", 2, DMatrix::from_element(1, 2, 1.0), 3600.0);
        tracks.object_count = u32::MAX as u64;
        tracks.advance(0.0, None, mask(0.0, &[1, 0]));
        let err = match_objects(&mut tracks, Some(&TrackingOptions::default()), &GridOptions::default(), &matches(&[]))
            .unwrap_err();
        assert!(matches!(err, TrackError::LabelOverflow(_)));
    }

    #[test]
    fn disabled_tracking_is_noop() {
        let mut tracks = ObjectTracks::new("anvil", 2, DMatrix::from_element(1, 2, 1.0), 3600.0);
        tracks.advance(0.0, None, mask(0.0, &[1, 2]));
        match_objects(&mut tracks, None, &GridOptions::default(), &matches(&[])).unwrap();
        assert!(tracks.current_matched_mask.is_none());
        assert_eq!(tracks.object_count, 0);
    }

    #[test]
    fn previous_matched_mask_is_kept_in_history() {
        let mut tracks = ObjectTracks::new("cell", 2, DMatrix::from_element(1, 2, 1.0), 3600.0);
        let opts = TrackingOptions::default();
        tracks.advance(0.0, None, mask(0.0, &[1, 0]));
        match_objects(&mut tracks, Some(&opts), &GridOptions::default(), &matches(&[])).unwrap();
        tracks.advance(600.0, None, mask(600.0, &[0, 1]));
        match_objects(&mut tracks, Some(&opts), &GridOptions::default(), &matches(&[(1, Some(1))])).unwrap();

        let previous = tracks.previous_matched_masks.latest().unwrap();
        assert_eq!(previous.time, 0.0);
        assert_eq!(previous.labels, DMatrix::from_row_slice(1, 2, &[1, 0]));
        assert_eq!(
            tracks.current_matched_mask.as_ref().unwrap().labels,
            DMatrix::from_row_slice(1, 2, &[0, 1])
        );
    }
}

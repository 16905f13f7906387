//! Per-category tracking state.
//!
//! Each object category (e.g. "cell", "mcs") owns one [`ObjectTracks`]. Nothing
//! in it is shared with other categories, so a level's categories can be
//! processed in parallel.

use crate::attribute::AttributeRow;
use crate::grid::{Grid, Mask};
use crate::object::ObjectRecord;
use crate::types::{TransientId, UniversalId};
use crate::writer::WriteSchedule;
use nalgebra::DMatrix;
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Bounded history
// ---------------------------------------------------------------------------

/// Fixed-capacity history; pushing onto a full history evicts the oldest entry.
#[derive(Clone, Debug)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push `item` as the newest entry, returning the evicted oldest entry.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// ObjectTracks
// ---------------------------------------------------------------------------

/// Tracking state of one object category.
#[derive(Clone, Debug)]
pub struct ObjectTracks {
    pub name: String,
    /// Universal ids handed out so far; the next one is `object_count + 1`
    pub object_count: u64,

    pub current_grid: Option<Grid>,
    pub previous_grids: History<Grid>,
    pub current_mask: Option<Mask>,
    pub previous_masks: History<Mask>,
    pub current_time: Option<f64>,
    pub previous_times: History<f64>,
    /// Seconds between the previous and the current time
    pub time_interval: Option<f64>,
    pub previous_time_intervals: History<f64>,

    /// Current mask relabelled with universal ids
    pub current_matched_mask: Option<Mask>,
    pub previous_matched_masks: History<Mask>,
    /// Transient id of the current mask → universal id
    pub universal_id_map: BTreeMap<TransientId, UniversalId>,

    pub object_record: ObjectRecord,
    pub previous_object_records: History<ObjectRecord>,

    /// Cell areas (km²) of the category's grid
    pub cell_areas: DMatrix<f64>,
    /// Attribute rows recorded since the last write
    pub attribute_rows: Vec<AttributeRow>,
    /// Matched masks recorded since the last write
    pub pending_masks: Vec<Mask>,
    pub write_schedule: WriteSchedule,
}

impl ObjectTracks {
    pub fn new(name: impl Into<String>, deque_length: usize, cell_areas: DMatrix<f64>, write_interval: f64) -> Self {
        Self {
            name: name.into(),
            object_count: 0,
            current_grid: None,
            previous_grids: History::new(deque_length),
            current_mask: None,
            previous_masks: History::new(deque_length),
            current_time: None,
            previous_times: History::new(deque_length),
            time_interval: None,
            previous_time_intervals: History::new(deque_length),
            current_matched_mask: None,
            previous_matched_masks: History::new(deque_length),
            universal_id_map: BTreeMap::new(),
            object_record: ObjectRecord::default(),
            previous_object_records: History::new(deque_length),
            cell_areas,
            attribute_rows: Vec::new(),
            pending_masks: Vec::new(),
            write_schedule: WriteSchedule::new(write_interval),
        }
    }

    /// Hand out the next universal id. Ids are never reused.
    pub fn mint_universal_id(&mut self) -> UniversalId {
        self.object_count += 1;
        UniversalId(self.object_count)
    }

    /// Make `mask` (and `grid`) current at `time`, shifting the old current
    /// values into the histories.
    pub fn advance(&mut self, time: f64, grid: Option<Grid>, mask: Mask) {
        if let Some(old) = self.current_grid.take() {
            self.previous_grids.push(old);
        }
        if let Some(old) = self.current_mask.take() {
            self.previous_masks.push(old);
        }
        if let Some(old) = self.current_time.replace(time) {
            self.previous_times.push(old);
            if let Some(interval) = self.time_interval.replace(time - old) {
                self.previous_time_intervals.push(interval);
            }
        }
        self.current_grid = grid;
        self.current_mask = Some(mask);
    }

    pub fn previous_mask(&self) -> Option<&Mask> {
        self.previous_masks.latest()
    }

    pub fn previous_grid(&self) -> Option<&Grid> {
        self.previous_grids.latest()
    }

    pub fn previous_time(&self) -> Option<f64> {
        self.previous_times.latest().copied()
    }

    /// Universal id carried by current transient id `id`.
    pub fn universal_id_of(&self, id: TransientId) -> Option<UniversalId> {
        self.universal_id_map.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_evicts_oldest() {
        let mut h = History::new(2);
        assert_eq!(h.push(1), None);
        assert_eq!(h.push(2), None);
        assert_eq!(h.push(3), Some(1));
        assert_eq!(h.len(), 2);
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(h.latest(), Some(&3));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut h = History::new(0);
        h.push('a');
        h.push('b');
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.latest(), Some(&'b'));
    }

    #[test]
    fn advance_rotates_state_and_intervals() {
        let mut tracks = ObjectTracks::new("cell", 2, DMatrix::from_element(2, 2, 1.0), 3600.0);
        tracks.advance(0.0, None, Mask::empty(0.0, (2, 2)));
        assert!(tracks.previous_mask().is_none());
        assert_eq!(tracks.time_interval, None);

        tracks.advance(600.0, None, Mask::empty(600.0, (2, 2)));
        assert_eq!(tracks.previous_time(), Some(0.0));
        assert_eq!(tracks.time_interval, Some(600.0));
        assert_eq!(tracks.previous_mask().map(|m| m.time), Some(0.0));

        tracks.advance(1500.0, None, Mask::empty(1500.0, (2, 2)));
        assert_eq!(tracks.time_interval, Some(900.0));
        assert_eq!(tracks.previous_time_intervals.latest(), Some(&600.0));
    }

    #[test]
    fn minted_ids_are_monotonic() {
        let mut tracks = ObjectTracks::new("cell", 2, DMatrix::zeros(1, 1), 3600.0);
        assert_eq!(tracks.mint_universal_id(), UniversalId(1));
        assert_eq!(tracks.mint_universal_id(), UniversalId(2));
        assert_eq!(tracks.object_count, 2);
    }
}

//! Query view over the aggregated visibility windows.
//!
//! Answers "who can see whom at time t" from the tagged interval
//! collection produced by a visibility-history batch.

use std::collections::HashSet;

use crate::error::VisResult;
use crate::interval::IntervalSet;
use crate::types::{ObjectId, PairTag};
use crate::window_list::{build_window_list, sorted_unique_ids, WindowList};

/// Visibility windows of every sensor/target pair, with the ids that
/// appear in them.
#[derive(Debug, Clone)]
pub struct Schedule {
    intervals: IntervalSet<PairTag>,
    /// Sorted distinct target ids.
    target_ids: Vec<ObjectId>,
    /// Sorted distinct sensor ids.
    sensor_ids: Vec<ObjectId>,
}

impl Schedule {
    /// Fails if sensor (or target) ids mix numeric and textual kinds.
    pub fn new(intervals: IntervalSet<PairTag>) -> VisResult<Self> {
        let target_ids = sorted_unique_ids(intervals.iter().map(|iv| &iv.data.target_id))?;
        let sensor_ids = sorted_unique_ids(intervals.iter().map(|iv| &iv.data.sensor_id))?;
        Ok(Schedule {
            intervals,
            target_ids,
            sensor_ids,
        })
    }

    pub fn intervals(&self) -> &IntervalSet<PairTag> {
        &self.intervals
    }

    pub fn target_ids(&self) -> &[ObjectId] {
        &self.target_ids
    }

    pub fn sensor_ids(&self) -> &[ObjectId] {
        &self.sensor_ids
    }

    pub fn num_targets(&self) -> usize {
        self.target_ids.len()
    }

    pub fn num_sensors(&self) -> usize {
        self.sensor_ids.len()
    }

    /// Targets seen by at least one sensor at `t`, sorted.
    pub fn targets_at(&self, t: f64) -> Vec<ObjectId> {
        let active: HashSet<&ObjectId> = self
            .intervals
            .at(t)
            .map(|iv| &iv.data.target_id)
            .collect();
        self.target_ids
            .iter()
            .filter(|id| active.contains(id))
            .cloned()
            .collect()
    }

    /// Sensors seeing at least one target at `t`, sorted.
    pub fn sensors_at(&self, t: f64) -> Vec<ObjectId> {
        let active: HashSet<&ObjectId> = self
            .intervals
            .at(t)
            .map(|iv| &iv.data.sensor_id)
            .collect();
        self.sensor_ids
            .iter()
            .filter(|id| active.contains(id))
            .cloned()
            .collect()
    }

    /// True if `sensor_id` can see `target_id` at `t`.
    pub fn is_vis(&self, t: f64, sensor_id: &ObjectId, target_id: &ObjectId) -> bool {
        self.intervals
            .at(t)
            .any(|iv| &iv.data.sensor_id == sensor_id && &iv.data.target_id == target_id)
    }

    /// Window list using this schedule's id order.
    pub fn window_list(&self) -> WindowList {
        build_window_list(
            &self.intervals,
            self.sensor_ids.clone(),
            self.target_ids.clone(),
        )
    }
}

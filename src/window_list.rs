//! Reshape tagged visibility windows into per-sensor/per-target lists.
//!
//! The output is the nested `[sensor][target] -> [(start, duration)]`
//! layout that schedule availability plots consume.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{VisError, VisResult};
use crate::interval::IntervalSet;
use crate::types::{ObjectId, PairTag};

/// `(start, duration)` of one window.
pub type Window = (f64, f64);

/// Windows indexed `[sensor][target]`, with the matching labels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowList {
    pub windows: Vec<Vec<Vec<Window>>>,
    pub sensor_ids: Vec<ObjectId>,
    pub target_ids: Vec<ObjectId>,
}

/// Distinct ids in natural order. Numeric and textual ids can't be mixed.
pub(crate) fn sorted_unique_ids<'a>(
    ids: impl Iterator<Item = &'a ObjectId>,
) -> VisResult<Vec<ObjectId>> {
    let unique: HashSet<&ObjectId> = ids.collect();
    let mut ints = Vec::new();
    let mut texts = Vec::new();
    for id in unique {
        match id {
            ObjectId::Int(v) => ints.push(*v),
            ObjectId::Text(s) => texts.push(s.clone()),
        }
    }
    if let (Some(&i), Some(s)) = (ints.first(), texts.first()) {
        return Err(VisError::IncomparableIds {
            left: ObjectId::Int(i),
            right: ObjectId::Text(s.clone()),
        });
    }
    ints.sort_unstable();
    texts.sort_unstable();
    Ok(ints
        .into_iter()
        .map(ObjectId::Int)
        .chain(texts.into_iter().map(ObjectId::Text))
        .collect())
}

/// Fill the window grid for already-ordered labels.
pub(crate) fn build_window_list(
    schedule: &IntervalSet<PairTag>,
    sensor_ids: Vec<ObjectId>,
    target_ids: Vec<ObjectId>,
) -> WindowList {
    let sensor_index: HashMap<&ObjectId, usize> = sensor_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let target_index: HashMap<&ObjectId, usize> = target_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();

    let mut windows = vec![vec![Vec::new(); target_ids.len()]; sensor_ids.len()];
    for iv in schedule {
        let (Some(&i), Some(&j)) = (
            sensor_index.get(&iv.data.sensor_id),
            target_index.get(&iv.data.target_id),
        ) else {
            continue;
        };
        windows[i][j].push((iv.start, iv.duration()));
    }

    WindowList {
        windows,
        sensor_ids,
        target_ids,
    }
}

/// Convert a tagged interval collection into a window list.
///
/// Sensor and target ids are sorted in their natural order; a collection
/// that mixes numeric and textual ids within the sensors (or within the
/// targets) fails with [`VisError::IncomparableIds`]. Pairs without
/// windows get an empty list. Window order within a cell is unspecified.
pub fn int_tree_to_window_list(schedule: &IntervalSet<PairTag>) -> VisResult<WindowList> {
    let sensor_ids = sorted_unique_ids(schedule.iter().map(|iv| &iv.data.sensor_id))?;
    let target_ids = sorted_unique_ids(schedule.iter().map(|iv| &iv.data.target_id))?;
    Ok(build_window_list(schedule, sensor_ids, target_ids))
}

/// [`int_tree_to_window_list`] ordering ids by a caller-provided key.
pub fn int_tree_to_window_list_by<K, F>(schedule: &IntervalSet<PairTag>, key: F) -> WindowList
where
    K: Ord,
    F: Fn(&ObjectId) -> K,
{
    let ordered = |ids: HashSet<&ObjectId>| -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = ids.into_iter().cloned().collect();
        ids.sort_by_key(|id| key(id));
        ids
    };
    let sensor_ids = ordered(schedule.iter().map(|iv| &iv.data.sensor_id).collect());
    let target_ids = ordered(schedule.iter().map(|iv| &iv.data.target_id).collect());
    build_window_list(schedule, sensor_ids, target_ids)
}

/// Spread `scheduled` windows over the shape of `availability`.
///
/// `scheduled` covers a subset of the available sensors and targets. The
/// result has one row per availability sensor and one cell per
/// availability target; cells for pairs `scheduled` doesn't mention are
/// empty.
pub fn pad_schedule_list(
    availability: &WindowList,
    scheduled: &WindowList,
) -> VisResult<Vec<Vec<Vec<Window>>>> {
    if scheduled.windows.len() != scheduled.sensor_ids.len() {
        return Err(VisError::shape(
            "scheduled sensors",
            scheduled.sensor_ids.len(),
            scheduled.windows.len(),
        ));
    }
    if let Some(row) = scheduled
        .windows
        .iter()
        .find(|row| row.len() != scheduled.target_ids.len())
    {
        return Err(VisError::shape(
            "scheduled targets",
            scheduled.target_ids.len(),
            row.len(),
        ));
    }

    let position = |ids: &[ObjectId], id: &ObjectId, role: &'static str| {
        ids.iter()
            .position(|x| x == id)
            .ok_or_else(|| VisError::UnknownId {
                role,
                id: id.clone(),
            })
    };
    let sensor_slots = scheduled
        .sensor_ids
        .iter()
        .map(|id| position(&availability.sensor_ids, id, "sensor"))
        .collect::<VisResult<Vec<usize>>>()?;
    let target_slots = scheduled
        .target_ids
        .iter()
        .map(|id| position(&availability.target_ids, id, "target"))
        .collect::<VisResult<Vec<usize>>>()?;

    let mut padded =
        vec![vec![Vec::new(); availability.target_ids.len()]; availability.sensor_ids.len()];
    for (row, &i) in scheduled.windows.iter().zip(&sensor_slots) {
        for (cell, &j) in row.iter().zip(&target_slots) {
            padded[i][j] = cell.clone();
        }
    }
    Ok(padded)
}

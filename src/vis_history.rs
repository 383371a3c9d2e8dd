//! Visibility history across every sensor/target pair.
//!
//! Evaluates the visibility function for each (sensor, target, time)
//! triple, extracts the visibility windows of each pair and unions them
//! into one tagged interval collection.

use ndarray::{s, Array1, Array3};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{VisError, VisResult};
use crate::interval::IntervalSet;
use crate::types::{
    pair_tag, position, CrossingFit, ObjectRecord, PairTag, StateVector, VisHistParams,
    VisHistResult, EARTH_RADIUS_KM,
};
use crate::visibility::{visibility_func, zero_crossing_fit_with};

/// Geometry and interpolation settings for a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisHistOptions {
    pub planet_radius: f64,
    pub extra_height: f64,
    pub crossing_fit: CrossingFit,
}

impl Default for VisHistOptions {
    fn default() -> Self {
        VisHistOptions {
            planet_radius: EARTH_RADIUS_KM,
            extra_height: 0.0,
            crossing_fit: CrossingFit::Linear,
        }
    }
}

/// Compute the visibility history of every sensor/target pair.
///
/// Returns the union of all pairs' visibility windows, each tagged with
/// its `{target_id, sensor_id}`, and an `[M x N x T]` array of visibility
/// function values (M sensors, N targets, T times).
///
/// `x_targets[n]` is the state history of `targets[n]` sampled at `time`,
/// likewise for sensors. A single invalid state anywhere aborts the whole
/// batch.
pub fn get_vis_hist(
    targets: &[ObjectRecord],
    sensors: &[ObjectRecord],
    x_targets: &[Vec<StateVector>],
    x_sensors: &[Vec<StateVector>],
    time: &[f64],
    planet_radius: f64,
    extra_height: f64,
) -> VisResult<(IntervalSet<PairTag>, Array3<f64>)> {
    let options = VisHistOptions {
        planet_radius,
        extra_height,
        ..VisHistOptions::default()
    };
    get_vis_hist_with(targets, sensors, x_targets, x_sensors, time, &options)
}

fn check_shapes(
    targets: &[ObjectRecord],
    sensors: &[ObjectRecord],
    x_targets: &[Vec<StateVector>],
    x_sensors: &[Vec<StateVector>],
    time: &[f64],
) -> VisResult<()> {
    if x_targets.len() != targets.len() {
        return Err(VisError::shape("x_targets", targets.len(), x_targets.len()));
    }
    if x_sensors.len() != sensors.len() {
        return Err(VisError::shape("x_sensors", sensors.len(), x_sensors.len()));
    }
    for (what, histories) in [("x_targets", x_targets), ("x_sensors", x_sensors)] {
        for (i, hist) in histories.iter().enumerate() {
            if hist.len() != time.len() {
                return Err(VisError::shape(
                    format!("{what}[{i}]"),
                    time.len(),
                    hist.len(),
                ));
            }
        }
    }
    Ok(())
}

/// Visibility function values of one sensor/target pair over time.
fn pair_history(
    sensor: &[StateVector],
    target: &[StateVector],
    options: &VisHistOptions,
) -> VisResult<Vec<f64>> {
    sensor
        .iter()
        .zip(target)
        .map(|(xs, xt)| {
            visibility_func(
                &position(xs),
                &position(xt),
                options.planet_radius,
                options.extra_height,
            )
            .map(|sample| sample.vis)
        })
        .collect()
}

/// Per-worker accumulator for the parallel pair loop.
#[derive(Default)]
struct PairAccum {
    intervals: IntervalSet<PairTag>,
    /// (sensor index, target index, visibility over time)
    rows: Vec<(usize, usize, Vec<f64>)>,
}

/// [`get_vis_hist`] with explicit options.
pub fn get_vis_hist_with(
    targets: &[ObjectRecord],
    sensors: &[ObjectRecord],
    x_targets: &[Vec<StateVector>],
    x_sensors: &[Vec<StateVector>],
    time: &[f64],
    options: &VisHistOptions,
) -> VisResult<(IntervalSet<PairTag>, Array3<f64>)> {
    check_shapes(targets, sensors, x_targets, x_sensors, time)?;

    let num_sensors = sensors.len();
    let num_targets = targets.len();
    debug!(
        sensors = num_sensors,
        targets = num_targets,
        times = time.len(),
        "computing visibility history"
    );

    // Parallel pair loop: each rayon worker folds pairs into its own
    // accumulator, then the accumulators are merged. Pairs share nothing
    // while running.
    let merged = (0..num_sensors * num_targets)
        .into_par_iter()
        .try_fold(PairAccum::default, |mut acc, pair| {
            let (i_sensor, i_target) = (pair / num_targets, pair % num_targets);
            let row = pair_history(&x_sensors[i_sensor], &x_targets[i_target], options)?;
            let found = zero_crossing_fit_with(
                &row,
                time,
                pair_tag(&targets[i_target], &sensors[i_sensor]),
                options.crossing_fit,
            )?;
            acc.intervals.extend(found.intervals);
            acc.rows.push((i_sensor, i_target, row));
            Ok::<_, VisError>(acc)
        })
        .try_reduce(PairAccum::default, |mut a, b| {
            a.intervals = a.intervals.union(b.intervals);
            a.rows.extend(b.rows);
            Ok(a)
        })?;

    let mut vis = Array3::<f64>::zeros((num_sensors, num_targets, time.len()));
    for (i_sensor, i_target, row) in merged.rows {
        vis.slice_mut(s![i_sensor, i_target, ..])
            .assign(&Array1::from(row));
    }

    debug!(
        intervals = merged.intervals.len(),
        "visibility history done"
    );
    Ok((merged.intervals, vis))
}

impl VisHistParams {
    pub fn options(&self) -> VisHistOptions {
        VisHistOptions {
            planet_radius: self.planet_radius,
            extra_height: self.extra_height,
            crossing_fit: self.crossing_fit,
        }
    }

    /// Run the batch described by these parameters.
    pub fn run(&self) -> VisResult<VisHistResult> {
        let (intervals, vis) = get_vis_hist_with(
            &self.targets,
            &self.sensors,
            &self.x_targets,
            &self.x_sensors,
            &self.time,
            &self.options(),
        )?;
        let visibility: Vec<Vec<Vec<f64>>> = vis
            .outer_iter()
            .map(|per_sensor| {
                per_sensor
                    .outer_iter()
                    .map(|row| row.to_vec())
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(VisHistResult {
            intervals,
            visibility,
        })
    }
}

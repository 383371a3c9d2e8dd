//! Line-of-sight visibility between two points near a spherical body.
//!
//! The visibility function (Lawton, 1987) compares the angular separation
//! of two position vectors against the half-angles of the cones tangent
//! to the obstructing sphere from each point. A sampled history of that
//! function is turned into rise/set events and visibility windows by
//! locating its zero crossings.

use tracing::{trace, warn};

use crate::error::{VisError, VisResult};
use crate::interval::IntervalSet;
use crate::types::{CrossingFit, Position, RiseSet, VisibilitySample};

/// Relative tolerance for points sitting on the sphere and for the
/// separation-angle cosine.
const EPS: f64 = 1e-13;

/// Bisection steps for cubic crossing refinement.
const MAX_BISECTIONS: usize = 100;

fn dot(a: &Position, b: &Position) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: &Position) -> f64 {
    dot(a, a).sqrt()
}

/// Half-angle of the cone tangent to a sphere of radius `radius` as seen
/// from distance `dist`. Points within `EPS` below the surface are
/// treated as sitting on it.
fn horizon_angle(radius: f64, dist: f64, which: &str) -> VisResult<f64> {
    let ratio = radius / dist;
    if ratio > 1.0 + EPS {
        return Err(VisError::domain(format!(
            "{which} is inside the obstructing sphere (|r| = {dist}, R = {radius})"
        )));
    }
    if ratio > 1.0 {
        warn!(
            which,
            dist,
            radius,
            "point just below sphere surface, snapped to surface"
        );
        return Ok(0.0);
    }
    Ok(ratio.acos())
}

/// Evaluate the visibility function for two position vectors.
///
/// `extra_height` raises the obstructing sphere above `body_radius`.
/// Fails with [`VisError::Domain`] if either point is the zero vector or
/// lies strictly inside the obstructing sphere.
pub fn visibility_func(
    r1: &Position,
    r2: &Position,
    body_radius: f64,
    extra_height: f64,
) -> VisResult<VisibilitySample> {
    let radius = body_radius + extra_height;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(VisError::domain(format!(
            "effective radius must be positive and finite, got {radius}"
        )));
    }

    let n1 = norm(r1);
    let n2 = norm(r2);
    for (which, n) in [("r1", n1), ("r2", n2)] {
        if !n.is_finite() {
            return Err(VisError::domain(format!(
                "{which} has non-finite components"
            )));
        }
        if n == 0.0 {
            return Err(VisError::domain(format!("{which} is the zero vector")));
        }
    }

    let alpha1 = horizon_angle(radius, n1, "r1")?;
    let alpha2 = horizon_angle(radius, n2, "r2")?;

    let cos_phi = dot(r1, r2) / (n1 * n2);
    if !(-1.0 - EPS..=1.0 + EPS).contains(&cos_phi) {
        return Err(VisError::domain(format!(
            "separation cosine {cos_phi} outside [-1, 1]"
        )));
    }
    let phi = cos_phi.clamp(-1.0, 1.0).acos();

    let vis = alpha1 + alpha2 - phi;
    if !vis.is_finite() {
        return Err(VisError::domain(format!(
            "non-finite visibility (alpha1={alpha1}, alpha2={alpha2}, phi={phi})"
        )));
    }

    Ok(VisibilitySample {
        vis,
        phi,
        alpha1,
        alpha2,
    })
}

/// True if the two points can see each other. Tangency counts as visible.
pub fn is_vis(
    r1: &Position,
    r2: &Position,
    body_radius: f64,
    extra_height: f64,
) -> VisResult<bool> {
    Ok(visibility_func(r1, r2, body_radius, extra_height)?.vis >= 0.0)
}

// -- Zero crossings ------------------------------------------------

/// Output of [`zero_crossing_fit`].
#[derive(Debug, Clone)]
pub struct Crossings<T> {
    /// Interpolated sign-change times, ascending. Window edges that come
    /// from the ends of the sample range are not included.
    pub times: Vec<f64>,
    /// Direction of each entry in `times`.
    pub directions: Vec<RiseSet>,
    /// Spans where the visibility function is non-negative.
    pub intervals: IntervalSet<T>,
}

fn validate_samples(vis: &[f64], t: &[f64]) -> VisResult<()> {
    if vis.len() != t.len() {
        return Err(VisError::Value(format!(
            "{} visibility samples for {} times",
            vis.len(),
            t.len()
        )));
    }
    if t.len() < 2 {
        return Err(VisError::Value(format!(
            "need at least 2 samples, got {}",
            t.len()
        )));
    }
    if let Some(i) = vis.iter().position(|v| !v.is_finite()) {
        return Err(VisError::Value(format!(
            "visibility sample {i} is not finite"
        )));
    }
    if let Some(i) = t.iter().position(|v| !v.is_finite()) {
        return Err(VisError::Value(format!("time {i} is not finite")));
    }
    if let Some(i) = t.windows(2).position(|w| w[1] <= w[0]) {
        return Err(VisError::Value(format!(
            "times must be strictly increasing (t[{}]={} >= t[{}]={})",
            i,
            t[i],
            i + 1,
            t[i + 1]
        )));
    }
    Ok(())
}

fn linear_crossing(vis: &[f64], t: &[f64], i: usize) -> f64 {
    t[i] - vis[i] * (t[i + 1] - t[i]) / (vis[i + 1] - vis[i])
}

/// Lagrange polynomial through `(ts, vs)` evaluated at `x`.
fn lagrange(ts: &[f64], vs: &[f64], x: f64) -> f64 {
    let mut sum = 0.0;
    for j in 0..ts.len() {
        let mut basis = 1.0;
        for k in 0..ts.len() {
            if k != j {
                basis *= (x - ts[k]) / (ts[j] - ts[k]);
            }
        }
        sum += vs[j] * basis;
    }
    sum
}

/// Root of the cubic through the four samples around `[t[i], t[i+1]]`,
/// found by bisection inside that bracket.
fn cubic_crossing(vis: &[f64], t: &[f64], i: usize) -> f64 {
    let n = vis.len();
    if n < 4 {
        return linear_crossing(vis, t, i);
    }
    if vis[i] == 0.0 {
        return t[i];
    }
    if vis[i + 1] == 0.0 {
        return t[i + 1];
    }
    let first = i.saturating_sub(1).min(n - 4);
    let (ts, vs) = (&t[first..first + 4], &vis[first..first + 4]);

    // The cubic interpolates the samples, so it has opposite signs at the
    // bracket ends.
    let lo_visible = vis[i] >= 0.0;
    let (mut lo, mut hi) = (t[i], t[i + 1]);
    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if (lagrange(ts, vs, mid) >= 0.0) == lo_visible {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Extract zero crossings and visibility windows from a sampled
/// visibility history, using linear interpolation between samples.
///
/// A sample counts as visible when `vis >= 0`. If the first sample is
/// visible the first window opens at `t[0]`; if the last is visible the
/// last window closes at the final time. Every window carries a clone of
/// `tag`.
pub fn zero_crossing_fit<T: Clone>(vis: &[f64], t: &[f64], tag: T) -> VisResult<Crossings<T>> {
    zero_crossing_fit_with(vis, t, tag, CrossingFit::Linear)
}

/// [`zero_crossing_fit`] with a choice of crossing interpolation.
pub fn zero_crossing_fit_with<T: Clone>(
    vis: &[f64],
    t: &[f64],
    tag: T,
    fit: CrossingFit,
) -> VisResult<Crossings<T>> {
    validate_samples(vis, t)?;
    let last = vis.len() - 1;

    let mut times = Vec::new();
    let mut directions = Vec::new();
    for i in 0..last {
        let direction = match (vis[i] >= 0.0, vis[i + 1] >= 0.0) {
            (false, true) => RiseSet::Rise,
            (true, false) => RiseSet::Set,
            _ => continue,
        };
        let crossing = match fit {
            CrossingFit::Linear => linear_crossing(vis, t, i),
            CrossingFit::Cubic => cubic_crossing(vis, t, i),
        };
        if !crossing.is_finite() {
            return Err(VisError::Arithmetic { index: i });
        }
        // Rounding can push the crossing an ulp outside its bracket, which
        // would put a rise after the following set.
        let floor = times.last().map_or(t[i], |&prev: &f64| prev.max(t[i]));
        let crossing = crossing.clamp(floor, t[i + 1]);
        trace!(index = i, time = crossing, ?direction, "zero crossing");
        times.push(crossing);
        directions.push(direction);
    }

    let mut intervals = IntervalSet::new();
    let mut open = (vis[0] >= 0.0).then_some(t[0]);
    for (&time, &direction) in times.iter().zip(&directions) {
        match (direction, open.take()) {
            (RiseSet::Rise, None) => open = Some(time),
            (RiseSet::Set, Some(start)) => intervals.insert(start, time, tag.clone()),
            (direction, prev) => {
                unreachable!("{direction:?} at {time} with open window {prev:?}")
            }
        }
    }
    if let Some(start) = open {
        intervals.insert(start, t[last], tag);
    }

    Ok(Crossings {
        times,
        directions,
        intervals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const RE: f64 = 6371.0;

    fn spans<T>(set: &IntervalSet<T>) -> Vec<(f64, f64)> {
        let mut out: Vec<(f64, f64)> = set.iter().map(|iv| (iv.start, iv.end)).collect();
        out.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out
    }

    // -- visibility_func --

    #[test]
    fn coradial_point_on_surface() {
        let r1 = [1.1, 0.0, 0.0];
        let r2 = [1.0, 0.0, 0.0];
        let s = visibility_func(&r1, &r2, 1.0, 0.0).unwrap();
        assert_abs_diff_eq!(s.alpha1, (1.0_f64 / 1.1).acos(), epsilon = 1e-12);
        assert_abs_diff_eq!(s.alpha1, 0.4298, epsilon = 1e-3);
        assert_eq!(s.alpha2, 0.0);
        assert_eq!(s.phi, 0.0);
        assert_abs_diff_eq!(s.vis, (1.0_f64 / 1.1).acos(), epsilon = 1e-12);
        assert!(is_vis(&r1, &r2, 1.0, 0.0).unwrap());
    }

    #[test]
    fn vis_is_sum_of_angles() {
        let cases = [
            ([7000.0, 0.0, 0.0], [0.0, 8000.0, 0.0]),
            ([7000.0, 100.0, -50.0], [-7100.0, 300.0, 20.0]),
            ([RE, 0.0, 0.0], [RE * 3.0, RE, 0.0]),
            ([0.0, 0.0, 42164.0], [6500.0, 6500.0, 0.0]),
        ];
        for (r1, r2) in cases {
            let s = visibility_func(&r1, &r2, RE, 0.0).unwrap();
            assert_abs_diff_eq!(s.vis, s.alpha1 + s.alpha2 - s.phi, epsilon = 1e-15);
            assert!(s.phi >= 0.0 && s.phi <= std::f64::consts::PI);
            assert!(s.alpha1 >= 0.0 && s.alpha2 >= 0.0);
            assert_eq!(is_vis(&r1, &r2, RE, 0.0).unwrap(), s.vis >= 0.0);
        }
    }

    #[test]
    fn symmetric_in_arguments() {
        let r1 = [7000.0, 1200.0, -300.0];
        let r2 = [-2000.0, 7500.0, 900.0];
        let a = visibility_func(&r1, &r2, RE, 50.0).unwrap();
        let b = visibility_func(&r2, &r1, RE, 50.0).unwrap();
        assert_abs_diff_eq!(a.vis, b.vis, epsilon = 1e-14);
        assert_eq!(a.phi, b.phi);
        assert_eq!(a.alpha1, b.alpha2);
    }

    #[test]
    fn tangent_segment_is_boundary() {
        // Both points at distance 2R, symmetric about the x axis; the chord
        // between them touches the sphere at (R, 0, 0) when each point sits
        // at 60 degrees from the axis.
        let d = 2.0 * RE;
        let ang = std::f64::consts::FRAC_PI_3;
        let r1 = [d * ang.cos(), d * ang.sin(), 0.0];
        let r2 = [d * ang.cos(), -d * ang.sin(), 0.0];
        let s = visibility_func(&r1, &r2, RE, 0.0).unwrap();
        assert_abs_diff_eq!(s.vis, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.phi, 2.0 * ang, epsilon = 1e-12);
        assert!(is_vis(&r1, &r2, RE, 0.0).unwrap());
    }

    #[test]
    fn opposite_sides_blocked() {
        let r1 = [8000.0, 0.0, 0.0];
        let r2 = [-8800.0, 0.0, 0.0];
        let s = visibility_func(&r1, &r2, RE, 0.0).unwrap();
        assert_abs_diff_eq!(s.phi, std::f64::consts::PI, epsilon = 1e-12);
        assert!(s.vis < 0.0);
        assert!(!is_vis(&r1, &r2, RE, 0.0).unwrap());
    }

    #[test]
    fn extra_height_shrinks_visibility() {
        let r1 = [7000.0, 0.0, 0.0];
        let r2 = [0.0, 7000.0, 0.0];
        let low = visibility_func(&r1, &r2, RE, 0.0).unwrap();
        let high = visibility_func(&r1, &r2, RE, 300.0).unwrap();
        assert!(high.vis < low.vis);
        assert_eq!(low.phi, high.phi);
    }

    #[test]
    fn point_inside_sphere_is_domain_error() {
        let inside = [RE - 1.0, 0.0, 0.0];
        let outside = [RE + 500.0, 0.0, 0.0];
        assert!(matches!(
            visibility_func(&inside, &outside, RE, 0.0),
            Err(VisError::Domain { .. })
        ));
        assert!(matches!(
            visibility_func(&outside, &inside, RE, 0.0),
            Err(VisError::Domain { .. })
        ));
        // Above the body but below the raised sphere.
        assert!(matches!(
            visibility_func(&[RE + 10.0, 0.0, 0.0], &outside, RE, 20.0),
            Err(VisError::Domain { .. })
        ));
    }

    #[test]
    fn zero_vector_is_domain_error() {
        let res = visibility_func(&[0.0; 3], &[7000.0, 0.0, 0.0], RE, -RE + 1e-9);
        assert!(matches!(res, Err(VisError::Domain { .. })));
    }

    #[test]
    fn non_positive_radius_is_domain_error() {
        let r = [7000.0, 0.0, 0.0];
        assert!(matches!(
            visibility_func(&r, &r, RE, -RE),
            Err(VisError::Domain { .. })
        ));
    }

    #[test]
    fn point_just_below_surface_is_snapped() {
        let r1 = [RE * (1.0 - 1e-15), 0.0, 0.0];
        let r2 = [RE * 2.0, 0.0, 0.0];
        let s = visibility_func(&r1, &r2, RE, 0.0).unwrap();
        assert_eq!(s.alpha1, 0.0);
    }

    // -- zero_crossing_fit --

    #[test]
    fn all_positive_single_window() {
        let c = zero_crossing_fit(&[1.0, 2.0, 3.0], &[0.0, 1.0, 2.0], "p").unwrap();
        assert!(c.times.is_empty());
        assert!(c.directions.is_empty());
        assert_eq!(spans(&c.intervals), vec![(0.0, 2.0)]);
        assert_eq!(c.intervals.iter().next().unwrap().data, "p");
    }

    #[test]
    fn all_negative_nothing() {
        let c = zero_crossing_fit(&[-1.0, -2.0, -3.0], &[0.0, 1.0, 2.0], ()).unwrap();
        assert!(c.times.is_empty());
        assert!(c.directions.is_empty());
        assert!(c.intervals.is_empty());
    }

    #[test]
    fn rise_then_set() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0];
        let vis = [-1.0, -0.5, 0.5, 1.0, -1.0];
        let c = zero_crossing_fit(&vis, &t, 7).unwrap();
        assert_eq!(c.directions, vec![RiseSet::Rise, RiseSet::Set]);
        assert_abs_diff_eq!(c.times[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c.times[1], 3.5, epsilon = 1e-12);
        assert_eq!(c.intervals.len(), 1);
        let iv = c.intervals.iter().next().unwrap();
        assert_eq!((iv.start, iv.end, iv.data), (c.times[0], c.times[1], 7));
        assert!(iv.start > t[1] && iv.start < t[2]);
    }

    #[test]
    fn window_open_at_start_and_end() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0];
        let vis = [2.0, -2.0, -1.0, 1.0, 3.0];
        let c = zero_crossing_fit(&vis, &t, ()).unwrap();
        assert_eq!(c.directions, vec![RiseSet::Set, RiseSet::Rise]);
        assert_eq!(c.times, vec![0.5, 2.5]);
        assert_eq!(spans(&c.intervals), vec![(0.0, 0.5), (2.5, 4.0)]);
    }

    #[test]
    fn several_windows_in_order() {
        let t: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let vis = [-1.0, 1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0];
        let c = zero_crossing_fit(&vis, &t, ()).unwrap();
        assert_eq!(c.times, vec![0.5, 1.5, 2.5, 4.5, 6.5, 7.5]);
        assert_eq!(
            spans(&c.intervals),
            vec![(0.5, 1.5), (2.5, 4.5), (6.5, 7.5)]
        );
        assert!(c.times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_sample_counts_as_visible() {
        // Touching zero from below is a rise with a zero-width window.
        let c = zero_crossing_fit(&[-1.0, 0.0], &[0.0, 1.0], ()).unwrap();
        assert_eq!(c.directions, vec![RiseSet::Rise]);
        assert_eq!(spans(&c.intervals), vec![(1.0, 1.0)]);

        let c = zero_crossing_fit(&[0.0, -1.0], &[0.0, 1.0], ()).unwrap();
        assert_eq!(c.directions, vec![RiseSet::Set]);
        assert_eq!(spans(&c.intervals), vec![(0.0, 0.0)]);

        let c = zero_crossing_fit(&[0.0, 0.0, 0.0], &[0.0, 1.0, 2.0], ()).unwrap();
        assert!(c.times.is_empty());
        assert_eq!(spans(&c.intervals), vec![(0.0, 2.0)]);
    }

    #[test]
    fn crossings_stay_inside_their_bracket() {
        // A sample barely above zero puts both crossings on t[1]; unclamped
        // interpolation lands the rise one ulp past t[1].
        let t = [-49.961056203713966, 45.49961541408508, 90.99923082817016];
        let vis = [-1.0, 1e-300, -1.0];
        let c = zero_crossing_fit(&vis, &t, ()).unwrap();
        assert_eq!(c.directions, vec![RiseSet::Rise, RiseSet::Set]);
        assert_eq!(c.times, vec![t[1], t[1]]);
        assert!(c.times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(spans(&c.intervals), vec![(t[1], t[1])]);

        let c = zero_crossing_fit_with(&vis, &t, (), CrossingFit::Cubic).unwrap();
        let iv = c.intervals.iter().next().unwrap();
        assert!(iv.start <= iv.end);
        assert!(c.times.iter().all(|&x| x >= t[0] && x <= t[2]));
    }

    #[test]
    fn rejects_bad_samples() {
        let short = zero_crossing_fit(&[1.0], &[0.0], ());
        assert!(matches!(short, Err(VisError::Value(_))));

        let mismatched = zero_crossing_fit(&[1.0, 2.0], &[0.0, 1.0, 2.0], ());
        assert!(matches!(mismatched, Err(VisError::Value(_))));

        let repeated = zero_crossing_fit(&[1.0, -1.0, 1.0], &[0.0, 1.0, 1.0], ());
        assert!(matches!(repeated, Err(VisError::Value(_))));

        let backwards = zero_crossing_fit(&[1.0, -1.0], &[1.0, 0.0], ());
        assert!(matches!(backwards, Err(VisError::Value(_))));

        let nan = zero_crossing_fit(&[1.0, f64::NAN], &[0.0, 1.0], ());
        assert!(matches!(nan, Err(VisError::Value(_))));
    }

    #[test]
    fn cubic_fit_recovers_cubic_root() {
        // v(t) = t^3 - 2 has its root at 2^(1/3).
        let t: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let vis: Vec<f64> = t.iter().map(|x| x * x * x - 2.0).collect();

        let linear = zero_crossing_fit(&vis, &t, ()).unwrap();
        let cubic = zero_crossing_fit_with(&vis, &t, (), CrossingFit::Cubic).unwrap();
        let root = 2.0_f64.cbrt();

        assert_eq!(cubic.directions, vec![RiseSet::Rise]);
        assert_abs_diff_eq!(cubic.times[0], root, epsilon = 1e-9);
        assert!((linear.times[0] - root).abs() > 1e-2);
        assert_eq!(spans(&cubic.intervals), vec![(cubic.times[0], 4.0)]);
    }

    #[test]
    fn cubic_fit_stays_in_bracket_near_edges() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let vis = [1.0, -1.0, -2.0, -2.0, -1.0, 1.0];
        let c = zero_crossing_fit_with(&vis, &t, (), CrossingFit::Cubic).unwrap();
        assert_eq!(c.directions, vec![RiseSet::Set, RiseSet::Rise]);
        assert!(c.times[0] > 0.0 && c.times[0] < 1.0);
        assert!(c.times[1] > 4.0 && c.times[1] < 5.0);
    }

    #[test]
    fn cubic_fit_short_history_falls_back_to_linear() {
        let c = zero_crossing_fit_with(&[-1.0, 1.0, 3.0], &[0.0, 1.0, 2.0], (), CrossingFit::Cubic)
            .unwrap();
        assert_eq!(c.times, vec![0.5]);
    }
}

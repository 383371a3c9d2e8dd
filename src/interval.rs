//! Tagged time intervals and an append-only interval collection.
//!
//! `IntervalSet` is a multiset: it never merges overlapping intervals,
//! never deduplicates, and makes no promise about iteration order.
//! Union consumes both operands, so a set handed to `union` can't be
//! observed half-merged by anyone else.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// A `[start, end]` span carrying a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub start: f64,
    pub end: f64,
    pub data: T,
}

impl<T> Interval<T> {
    pub fn new(start: f64, end: f64, data: T) -> Self {
        debug_assert!(start <= end, "interval start {start} after end {end}");
        Interval { start, end, data }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open point test, `start <= t < end`.
    /// Zero-width intervals contain no points.
    pub fn contains_point(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalSet<T> {
    intervals: Vec<Interval<T>>,
}

impl<T> Default for IntervalSet<T> {
    fn default() -> Self {
        IntervalSet {
            intervals: Vec::new(),
        }
    }
}

impl<T> IntervalSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, start: f64, end: f64, data: T) {
        self.intervals.push(Interval::new(start, end, data));
    }

    pub fn push(&mut self, interval: Interval<T>) {
        debug_assert!(interval.start <= interval.end);
        self.intervals.push(interval);
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval<T>> {
        self.intervals.iter()
    }

    /// Multiset union. Every interval of both operands is kept.
    pub fn union(mut self, mut other: IntervalSet<T>) -> IntervalSet<T> {
        if self.intervals.len() < other.intervals.len() {
            std::mem::swap(&mut self, &mut other);
        }
        self.intervals.append(&mut other.intervals);
        self
    }

    /// Intervals containing `t` (half-open, see [`Interval::contains_point`]).
    pub fn at(&self, t: f64) -> impl Iterator<Item = &Interval<T>> + '_ {
        self.intervals.iter().filter(move |iv| iv.contains_point(t))
    }

    pub fn into_vec(self) -> Vec<Interval<T>> {
        self.intervals
    }
}

impl<T> BitOr for IntervalSet<T> {
    type Output = IntervalSet<T>;

    fn bitor(self, rhs: IntervalSet<T>) -> IntervalSet<T> {
        self.union(rhs)
    }
}

impl<T> Extend<Interval<T>> for IntervalSet<T> {
    fn extend<I: IntoIterator<Item = Interval<T>>>(&mut self, iter: I) {
        for iv in iter {
            self.push(iv);
        }
    }
}

impl<T> FromIterator<Interval<T>> for IntervalSet<T> {
    fn from_iter<I: IntoIterator<Item = Interval<T>>>(iter: I) -> Self {
        let mut set = IntervalSet::new();
        set.extend(iter);
        set
    }
}

impl<T> IntoIterator for IntervalSet<T> {
    type Item = Interval<T>;
    type IntoIter = std::vec::IntoIter<Interval<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a IntervalSet<T> {
    type Item = &'a Interval<T>;
    type IntoIter = std::slice::Iter<'a, Interval<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

//! Normalised sets of half-open presentation time ranges
//!
//! A [`TimeRanges`] value is always sorted and disjoint. Ranges that overlap
//! or touch are merged on insertion, so `[0, 1) + [1, 2)` is stored as
//! `[0, 2)`.

use crate::time::MediaTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start
    pub start: MediaTime,
    /// Exclusive end
    pub end: MediaTime,
}

impl TimeRange {
    /// Create a range
    pub fn new(start: MediaTime, end: MediaTime) -> Self {
        Self { start, end }
    }

    /// Length of the range, zero when empty
    pub fn duration(&self) -> MediaTime {
        if self.end > self.start {
            self.end - self.start
        } else {
            MediaTime::ZERO
        }
    }

    /// Whether `time` lies inside the range
    pub fn contains(&self, time: MediaTime) -> bool {
        self.start <= time && time < self.end
    }

    fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Sorted, disjoint set of time ranges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRanges {
    ranges: Vec<TimeRange>,
}

impl TimeRanges {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding a single range
    pub fn from_range(start: MediaTime, end: MediaTime) -> Self {
        let mut ranges = Self::new();
        ranges.add(start, end);
        ranges
    }

    /// Number of disjoint ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Start of the range at `index`
    pub fn start(&self, index: usize) -> Option<MediaTime> {
        self.ranges.get(index).map(|r| r.start)
    }

    /// End of the range at `index`
    pub fn end(&self, index: usize) -> Option<MediaTime> {
        self.ranges.get(index).map(|r| r.end)
    }

    /// Iterate ranges in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &TimeRange> {
        self.ranges.iter()
    }

    /// Remove every range
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Insert `[start, end)`, merging with overlapping or touching ranges.
    /// Empty intervals are ignored.
    pub fn add(&mut self, start: MediaTime, end: MediaTime) {
        let mut incoming = TimeRange::new(start, end);
        if incoming.is_empty() {
            return;
        }

        let mut merged = Vec::with_capacity(self.ranges.len() + 1);
        let mut inserted = false;
        for range in self.ranges.drain(..) {
            if range.end < incoming.start {
                merged.push(range);
            } else if incoming.end < range.start {
                if !inserted {
                    merged.push(incoming);
                    inserted = true;
                }
                merged.push(range);
            } else {
                incoming.start = incoming.start.min(range.start);
                incoming.end = incoming.end.max(range.end);
            }
        }
        if !inserted {
            merged.push(incoming);
        }
        self.ranges = merged;
    }

    /// Remove `[start, end)` from the set, splitting ranges as needed
    pub fn subtract(&mut self, start: MediaTime, end: MediaTime) {
        if end <= start {
            return;
        }
        let mut remaining = Vec::with_capacity(self.ranges.len() + 1);
        for range in self.ranges.drain(..) {
            if range.end <= start || range.start >= end {
                remaining.push(range);
                continue;
            }
            if range.start < start {
                remaining.push(TimeRange::new(range.start, start));
            }
            if range.end > end {
                remaining.push(TimeRange::new(end, range.end));
            }
        }
        self.ranges = remaining;
    }

    /// Remove every range of `other` from this set
    pub fn subtract_ranges(&mut self, other: &TimeRanges) {
        for range in &other.ranges {
            self.subtract(range.start, range.end);
        }
    }

    /// Add every range of `other` to this set
    pub fn union_with(&mut self, other: &TimeRanges) {
        for range in &other.ranges {
            self.add(range.start, range.end);
        }
    }

    /// Keep only the parts of this set also covered by `other`
    pub fn intersect_with(&mut self, other: &TimeRanges) {
        *self = self.intersect(other);
    }

    /// Intersection of two sets
    pub fn intersect(&self, other: &TimeRanges) -> TimeRanges {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start < end {
                result.push(TimeRange::new(start, end));
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        TimeRanges { ranges: result }
    }

    /// Index of the range containing `time`
    pub fn find(&self, time: MediaTime) -> Option<usize> {
        let index = self.ranges.partition_point(|r| r.end <= time);
        self.ranges
            .get(index)
            .filter(|r| r.contains(time))
            .map(|_| index)
    }

    /// Whether any range contains `time`
    pub fn contains(&self, time: MediaTime) -> bool {
        self.find(time).is_some()
    }

    /// Whether `[start, end)` is fully covered by a single range
    pub fn contains_range(&self, start: MediaTime, end: MediaTime) -> bool {
        match self.find(start) {
            Some(index) => self.ranges[index].end >= end,
            None => false,
        }
    }

    /// Closest buffered time to `time`: `time` itself when buffered,
    /// otherwise the nearest range boundary
    pub fn nearest(&self, time: MediaTime) -> Option<MediaTime> {
        if self.contains(time) {
            return Some(time);
        }
        let mut best: Option<(MediaTime, MediaTime)> = None;
        for range in &self.ranges {
            for candidate in [range.start, range.end] {
                let distance = (candidate - time).abs();
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((candidate, distance));
                }
            }
        }
        best.map(|(candidate, _)| candidate)
    }

    /// Sum of range lengths
    pub fn total_duration(&self) -> MediaTime {
        self.ranges
            .iter()
            .fold(MediaTime::ZERO, |acc, r| acc + r.duration())
    }

    /// Gaps between consecutive ranges
    pub fn gaps(&self) -> TimeRanges {
        let ranges = self
            .ranges
            .windows(2)
            .map(|pair| TimeRange::new(pair[0].end, pair[1].start))
            .collect();
        TimeRanges { ranges }
    }
}

impl<'a> IntoIterator for &'a TimeRanges {
    type Item = &'a TimeRange;
    type IntoIter = std::slice::Iter<'a, TimeRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl fmt::Display for TimeRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|r| format!("[{}, {})", r.start, r.end))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(seconds: f64) -> MediaTime {
        MediaTime::from_secs_f64(seconds)
    }

    fn pairs(ranges: &TimeRanges) -> Vec<(f64, f64)> {
        ranges
            .iter()
            .map(|r| (r.start.as_secs_f64(), r.end.as_secs_f64()))
            .collect()
    }

    #[test]
    fn test_touching_ranges_merge() {
        let mut ranges = TimeRanges::new();
        ranges.add(s(0.0), s(1.0));
        ranges.add(s(2.0), s(3.0));
        ranges.add(s(1.0), s(2.0));
        assert_eq!(pairs(&ranges), vec![(0.0, 3.0)]);
    }

    #[test]
    fn test_add_keeps_order() {
        let mut ranges = TimeRanges::new();
        ranges.add(s(5.0), s(6.0));
        ranges.add(s(0.0), s(1.0));
        ranges.add(s(2.5), s(3.0));
        ranges.add(s(2.0), s(2.0));
        assert_eq!(pairs(&ranges), vec![(0.0, 1.0), (2.5, 3.0), (5.0, 6.0)]);
        assert_eq!(ranges.start(1), Some(s(2.5)));
        assert_eq!(ranges.end(3), None);
    }

    #[test]
    fn test_subtract_splits() {
        let mut ranges = TimeRanges::from_range(s(0.0), s(10.0));
        ranges.subtract(s(2.0), s(4.0));
        ranges.subtract(s(9.0), s(12.0));
        assert_eq!(pairs(&ranges), vec![(0.0, 2.0), (4.0, 9.0)]);
        assert_eq!(ranges.total_duration(), s(7.0));
        assert_eq!(pairs(&ranges.gaps()), vec![(2.0, 4.0)]);
    }

    #[test]
    fn test_intersect_and_union() {
        let mut a = TimeRanges::from_range(s(0.0), s(5.0));
        a.add(s(8.0), s(10.0));
        let mut b = TimeRanges::from_range(s(3.0), s(9.0));

        assert_eq!(pairs(&a.intersect(&b)), vec![(3.0, 5.0), (8.0, 9.0)]);

        b.union_with(&a);
        assert_eq!(pairs(&b), vec![(0.0, 10.0)]);

        b.subtract_ranges(&a);
        assert_eq!(pairs(&b), vec![(5.0, 8.0)]);
    }

    #[test]
    fn test_lookup() {
        let mut ranges = TimeRanges::from_range(s(0.0), s(1.0));
        ranges.add(s(3.0), s(4.0));
        assert_eq!(ranges.find(s(3.5)), Some(1));
        assert_eq!(ranges.find(s(1.0)), None);
        assert!(ranges.contains(s(0.0)));
        assert!(ranges.contains_range(s(3.0), s(4.0)));
        assert!(!ranges.contains_range(s(0.5), s(3.5)));
        assert_eq!(ranges.nearest(s(2.2)), Some(s(3.0)));
        assert_eq!(ranges.nearest(s(0.5)), Some(s(0.5)));
        assert_eq!(TimeRanges::new().nearest(s(1.0)), None);
    }
}

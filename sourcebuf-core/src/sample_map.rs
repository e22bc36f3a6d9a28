//! Dual-indexed sample store
//!
//! Samples are owned by a map keyed on decode timestamp. A second ordered set
//! of `(presentation, decode)` keys provides the presentation-order view.
//! Both views always hold the same samples. Queries hand out `&Sample`
//! borrows or owned values, so any result is invalidated by the borrow checker
//! before the next mutation.

use crate::error::{CoreError, CoreResult};
use crate::sample::Sample;
use crate::time::MediaTime;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PresentationKey {
    presentation_time: MediaTime,
    decode_time: MediaTime,
}

impl PresentationKey {
    fn of(sample: &Sample) -> Self {
        Self {
            presentation_time: sample.presentation_time(),
            decode_time: sample.decode_time(),
        }
    }

    fn lowest(presentation_time: MediaTime) -> Self {
        Self {
            presentation_time,
            decode_time: MediaTime::MIN,
        }
    }

    fn highest(presentation_time: MediaTime) -> Self {
        Self {
            presentation_time,
            decode_time: MediaTime::MAX,
        }
    }
}

/// Per-track sample storage ordered by decode and by presentation time
#[derive(Debug, Clone, Default)]
pub struct SampleMap {
    decode_order: BTreeMap<MediaTime, Sample>,
    presentation_order: BTreeSet<PresentationKey>,
    total_size: usize,
    max_duration: MediaTime,
}

impl SampleMap {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.decode_order.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.decode_order.is_empty()
    }

    /// Sum of payload sizes in bytes
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Insert a sample. Decode timestamps are unique per track.
    pub fn insert(&mut self, sample: Sample) -> CoreResult<()> {
        let decode_time = sample.decode_time();
        if self.decode_order.contains_key(&decode_time) {
            return Err(CoreError::DuplicateDecodeTimestamp { decode_time });
        }
        self.presentation_order.insert(PresentationKey::of(&sample));
        self.total_size += sample.size();
        self.max_duration = self.max_duration.max(sample.duration());
        self.decode_order.insert(decode_time, sample);
        Ok(())
    }

    /// Remove the sample with the given decode timestamp
    pub fn remove_sample(&mut self, decode_time: MediaTime) -> Option<Sample> {
        let sample = self.decode_order.remove(&decode_time)?;
        self.presentation_order.remove(&PresentationKey::of(&sample));
        self.total_size = self.total_size.saturating_sub(sample.size());
        if self.decode_order.is_empty() {
            self.max_duration = MediaTime::ZERO;
        }
        Some(sample)
    }

    /// Remove every sample whose presentation start lies in `[start, end)`,
    /// returned in presentation order
    pub fn remove_range(&mut self, start: MediaTime, end: MediaTime) -> Vec<Sample> {
        self.decode_times_in_presentation_range(start, end)
            .into_iter()
            .filter_map(|decode_time| self.remove_sample(decode_time))
            .collect()
    }

    /// Decode timestamps of samples whose presentation start lies in
    /// `[start, end)`, in presentation order
    pub fn decode_times_in_presentation_range(
        &self,
        start: MediaTime,
        end: MediaTime,
    ) -> Vec<MediaTime> {
        if end <= start {
            return Vec::new();
        }
        self.presentation_order
            .range(PresentationKey::lowest(start)..PresentationKey::lowest(end))
            .map(|key| key.decode_time)
            .collect()
    }

    /// Sample with the given decode timestamp
    pub fn find_by_decode_time(&self, decode_time: MediaTime) -> Option<&Sample> {
        self.decode_order.get(&decode_time)
    }

    /// The last sample starting at or before `time`, if it still covers `time`
    pub fn find_containing(&self, time: MediaTime) -> Option<&Sample> {
        self.presentation_order
            .range(..=PresentationKey::highest(time))
            .next_back()
            .and_then(|key| self.decode_order.get(&key.decode_time))
            .filter(|sample| sample.contains(time))
    }

    /// First sample starting at or after `time`
    pub fn find_after(&self, time: MediaTime) -> Option<&Sample> {
        self.presentation_order
            .range(PresentationKey::lowest(time)..)
            .next()
            .and_then(|key| self.decode_order.get(&key.decode_time))
    }

    /// First sync sample starting at or after `time`
    pub fn find_sync_after(&self, time: MediaTime) -> Option<&Sample> {
        self.presentation_order
            .range(PresentationKey::lowest(time)..)
            .filter_map(|key| self.decode_order.get(&key.decode_time))
            .find(|sample| sample.is_sync())
    }

    /// Last sync sample starting at or before `time`
    pub fn find_sync_before(&self, time: MediaTime) -> Option<&Sample> {
        self.presentation_order
            .range(..=PresentationKey::highest(time))
            .rev()
            .filter_map(|key| self.decode_order.get(&key.decode_time))
            .find(|sample| sample.is_sync())
    }

    /// First sync sample strictly after `decode_time` in decode order
    pub fn next_sync_in_decode_order(&self, decode_time: MediaTime) -> Option<&Sample> {
        self.decode_order
            .range((Bound::Excluded(decode_time), Bound::Unbounded))
            .map(|(_, sample)| sample)
            .find(|sample| sample.is_sync())
    }

    /// Decode timestamps of the non-sync samples that follow `decode_time`
    /// in decode order, up to the next sync sample
    pub fn dependent_decode_times(&self, decode_time: MediaTime) -> Vec<MediaTime> {
        self.decode_order
            .range((Bound::Excluded(decode_time), Bound::Unbounded))
            .take_while(|(_, sample)| !sample.is_sync())
            .map(|(dts, _)| *dts)
            .collect()
    }

    /// Last sample starting strictly before `time`
    pub fn previous_in_presentation_order(&self, time: MediaTime) -> Option<&Sample> {
        self.presentation_order
            .range(..PresentationKey::lowest(time))
            .next_back()
            .and_then(|key| self.decode_order.get(&key.decode_time))
    }

    /// First sample starting strictly after `time`
    pub fn next_in_presentation_order(&self, time: MediaTime) -> Option<&Sample> {
        self.presentation_order
            .range((Bound::Excluded(PresentationKey::highest(time)), Bound::Unbounded))
            .next()
            .and_then(|key| self.decode_order.get(&key.decode_time))
    }

    /// Samples whose presentation interval intersects `[start, end)`
    pub fn overlapping(&self, start: MediaTime, end: MediaTime) -> impl Iterator<Item = &Sample> {
        let lower = start - self.max_duration;
        let upper = if end > lower { end } else { lower };
        self.presentation_order
            .range(PresentationKey::lowest(lower)..PresentationKey::lowest(upper))
            .filter_map(move |key| self.decode_order.get(&key.decode_time))
            .filter(move |sample| sample.presentation_end() > start)
    }

    /// Samples from `decode_time` onward, in decode order
    pub fn iter_decode_from(&self, decode_time: MediaTime) -> impl Iterator<Item = &Sample> {
        self.decode_order.range(decode_time..).map(|(_, sample)| sample)
    }

    /// All samples in decode order
    pub fn iter_decode(&self) -> impl Iterator<Item = &Sample> {
        self.decode_order.values()
    }

    /// All samples in presentation order
    pub fn iter_presentation(&self) -> impl Iterator<Item = &Sample> {
        self.presentation_order
            .iter()
            .filter_map(|key| self.decode_order.get(&key.decode_time))
    }

    /// Sample with the lowest presentation timestamp
    pub fn first_presentation(&self) -> Option<&Sample> {
        self.presentation_order
            .first()
            .and_then(|key| self.decode_order.get(&key.decode_time))
    }

    /// Sample with the highest presentation timestamp
    pub fn last_presentation(&self) -> Option<&Sample> {
        self.presentation_order
            .last()
            .and_then(|key| self.decode_order.get(&key.decode_time))
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.decode_order.clear();
        self.presentation_order.clear();
        self.total_size = 0;
        self.max_duration = MediaTime::ZERO;
    }
}

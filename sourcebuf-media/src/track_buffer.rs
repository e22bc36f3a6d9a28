//! Per-track buffers and the parent-owned track map
//!
//! [`TrackBufferMap`] owns every [`TrackBuffer`] of a source buffer together
//! with the aggregate buffered range set and the buffer-wide highest
//! presentation end. All sample removal goes through
//! [`TrackBufferMap::erase_samples`], which keeps the store, the decode queue
//! and the buffered ranges consistent.

use crate::tracks::TrackDescription;
use sourcebuf_core::{MediaKind, MediaTime, Sample, SampleMap, TimeRanges, TrackId};
use std::collections::{BTreeMap, BTreeSet};

/// Samples and rolling ingest state for one track
#[derive(Debug, Clone)]
pub struct TrackBuffer {
    pub(crate) description: TrackDescription,
    pub(crate) samples: SampleMap,
    pub(crate) decode_queue: BTreeSet<MediaTime>,
    pub(crate) last_decode_timestamp: Option<MediaTime>,
    pub(crate) last_frame_duration: Option<MediaTime>,
    pub(crate) highest_presentation_timestamp: Option<MediaTime>,
    pub(crate) last_enqueued_presentation_time: Option<MediaTime>,
    pub(crate) need_random_access_point: bool,
    quota_bytes: usize,
}

impl TrackBuffer {
    /// Create an empty track buffer
    pub fn new(description: TrackDescription, quota_bytes: usize) -> Self {
        Self {
            description,
            samples: SampleMap::new(),
            decode_queue: BTreeSet::new(),
            last_decode_timestamp: None,
            last_frame_duration: None,
            highest_presentation_timestamp: None,
            last_enqueued_presentation_time: None,
            need_random_access_point: true,
            quota_bytes,
        }
    }

    /// Track description from the first initialization segment
    pub fn description(&self) -> &TrackDescription {
        &self.description
    }

    /// Media kind of the track
    pub fn kind(&self) -> MediaKind {
        self.description.kind
    }

    /// Stored samples
    pub fn samples(&self) -> &SampleMap {
        &self.samples
    }

    /// Number of samples waiting to be handed to the renderer
    pub fn decode_queue_len(&self) -> usize {
        self.decode_queue.len()
    }

    /// Decode timestamp of the last accepted frame
    pub fn last_decode_timestamp(&self) -> Option<MediaTime> {
        self.last_decode_timestamp
    }

    /// Duration of the last accepted frame
    pub fn last_frame_duration(&self) -> Option<MediaTime> {
        self.last_frame_duration
    }

    /// Highest presentation end appended since the last reset
    pub fn highest_presentation_timestamp(&self) -> Option<MediaTime> {
        self.highest_presentation_timestamp
    }

    /// Presentation time of the last sample handed to the renderer
    pub fn last_enqueued_presentation_time(&self) -> Option<MediaTime> {
        self.last_enqueued_presentation_time
    }

    /// Whether non-sync frames are currently dropped
    pub fn needs_random_access_point(&self) -> bool {
        self.need_random_access_point
    }

    /// Byte quota for this track
    pub fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    /// Stored payload bytes
    pub fn total_size(&self) -> usize {
        self.samples.total_size()
    }

    /// Whether `new_data_size` more bytes fit under the quota
    pub fn has_room_for(&self, new_data_size: usize) -> bool {
        self.samples.total_size().saturating_add(new_data_size) <= self.quota_bytes
    }

    /// Forget the rolling ingest state. The next frame must be a sync frame.
    pub fn reset_rolling_state(&mut self) {
        self.last_decode_timestamp = None;
        self.last_frame_duration = None;
        self.highest_presentation_timestamp = None;
        self.need_random_access_point = true;
    }

    /// Pop the next queued sample in decode order
    pub(crate) fn dequeue_next(&mut self) -> Option<Sample> {
        while let Some(decode_time) = self.decode_queue.pop_first() {
            if let Some(sample) = self.samples.find_by_decode_time(decode_time) {
                return Some(sample.clone());
            }
        }
        None
    }
}

/// Every track buffer of one source buffer plus buffer-wide state
#[derive(Debug, Clone, Default)]
pub struct TrackBufferMap {
    tracks: BTreeMap<TrackId, TrackBuffer>,
    buffered: TimeRanges,
    highest_presentation_end: Option<MediaTime>,
}

impl TrackBufferMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track buffer. Returns false if the id is already present.
    pub fn insert_track(&mut self, buffer: TrackBuffer) -> bool {
        let id = buffer.description.id.clone();
        if self.tracks.contains_key(&id) {
            return false;
        }
        self.tracks.insert(id, buffer);
        true
    }

    /// Move a track buffer to a new id, re-attributing its samples. Returns
    /// false if `old` is missing or `new` is taken.
    pub fn rename_track(&mut self, old: &TrackId, new: &TrackId) -> bool {
        if old == new {
            return self.tracks.contains_key(old);
        }
        if self.tracks.contains_key(new) {
            return false;
        }
        let Some(mut buffer) = self.tracks.remove(old) else {
            return false;
        };

        let mut renamed = SampleMap::new();
        for sample in buffer.samples.iter_decode() {
            // Decode times are unique within the source map
            let _ = renamed.insert(sample.with_track_id(new.clone()));
        }
        buffer.samples = renamed;
        buffer.description.id = new.clone();
        self.tracks.insert(new.clone(), buffer);
        tracing::info!("Track {} renamed to {}", old, new);
        true
    }

    /// Track buffer by id
    pub fn get(&self, id: &TrackId) -> Option<&TrackBuffer> {
        self.tracks.get(id)
    }

    /// Mutable track buffer by id
    pub fn get_mut(&mut self, id: &TrackId) -> Option<&mut TrackBuffer> {
        self.tracks.get_mut(id)
    }

    /// Whether a track buffer exists
    pub fn contains(&self, id: &TrackId) -> bool {
        self.tracks.contains_key(id)
    }

    /// Iterate track buffers ordered by id
    pub fn iter(&self) -> impl Iterator<Item = (&TrackId, &TrackBuffer)> {
        self.tracks.iter()
    }

    /// Iterate mutable track buffers
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&TrackId, &mut TrackBuffer)> {
        self.tracks.iter_mut()
    }

    /// Track ids ordered
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.keys().cloned().collect()
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether no track exists yet
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Union of buffered intervals across tracks
    pub fn buffered(&self) -> &TimeRanges {
        &self.buffered
    }

    /// Highest presentation end across tracks since the last reset
    pub fn highest_presentation_end(&self) -> Option<MediaTime> {
        self.highest_presentation_end
    }

    /// Payload bytes across all tracks
    pub fn total_size(&self) -> usize {
        self.tracks.values().map(TrackBuffer::total_size).sum()
    }

    /// Reset the rolling ingest state of every track at once. Invoked when a
    /// discontinuity is detected on any track, and by abort.
    pub fn reset_rolling_state(&mut self) {
        for buffer in self.tracks.values_mut() {
            buffer.reset_rolling_state();
        }
    }

    /// Clear the buffer-wide highest presentation end
    pub fn clear_highest_presentation_end(&mut self) {
        self.highest_presentation_end = None;
    }

    pub(crate) fn set_highest_presentation_end(&mut self, time: Option<MediaTime>) {
        self.highest_presentation_end = time;
    }

    pub(crate) fn raise_highest_presentation_end(&mut self, time: MediaTime) {
        if self.highest_presentation_end.map_or(true, |end| time > end) {
            self.highest_presentation_end = Some(time);
        }
    }

    pub(crate) fn add_buffered(&mut self, start: MediaTime, end: MediaTime) {
        self.buffered.add(start, end);
    }

    /// Remove samples by decode timestamp from a track's store and decode
    /// queue, and drop their intervals from the buffered set. Intervals still
    /// covered by samples of any track are restored. Returns the removed
    /// samples in the order given.
    pub fn erase_samples(&mut self, id: &TrackId, decode_times: &[MediaTime]) -> Vec<Sample> {
        let removed: Vec<Sample> = match self.tracks.get_mut(id) {
            Some(buffer) => decode_times
                .iter()
                .filter_map(|decode_time| {
                    buffer.decode_queue.remove(decode_time);
                    buffer.samples.remove_sample(*decode_time)
                })
                .collect(),
            None => return Vec::new(),
        };
        if removed.is_empty() {
            return removed;
        }

        let mut erased = TimeRanges::new();
        for sample in &removed {
            erased.add(sample.presentation_time(), sample.presentation_end());
        }
        self.buffered.subtract_ranges(&erased);

        let mut still_held = TimeRanges::new();
        for range in erased.iter() {
            for buffer in self.tracks.values() {
                for sample in buffer.samples.overlapping(range.start, range.end) {
                    still_held.add(sample.presentation_time(), sample.presentation_end());
                }
            }
        }
        self.buffered.union_with(&still_held.intersect(&erased));

        tracing::debug!(
            "Erased {} samples from track {}, buffered now {}",
            removed.len(),
            id,
            self.buffered
        );
        removed
    }

    /// Remove every sample of a track whose presentation start lies in
    /// `[start, end)`
    pub fn erase_presentation_range(
        &mut self,
        id: &TrackId,
        start: MediaTime,
        end: MediaTime,
    ) -> Vec<Sample> {
        let decode_times = match self.tracks.get(id) {
            Some(buffer) => buffer.samples.decode_times_in_presentation_range(start, end),
            None => return Vec::new(),
        };
        self.erase_samples(id, &decode_times)
    }
}

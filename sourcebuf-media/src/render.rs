//! Pull-based delivery to the decoder
//!
//! The renderer asks for samples when it has room; the source buffer never
//! pushes from inside a mutation. [`SampleSink`] is the renderer side of that
//! contract and [`QueueSink`] a bounded in-memory implementation.

use crate::track_buffer::TrackBufferMap;
use sourcebuf_core::{MediaTime, Sample, TrackId};
use std::collections::{BTreeMap, VecDeque};

/// Consumer of buffered samples
pub trait SampleSink: Send {
    /// Whether the sink accepts another sample for `track`
    fn is_ready_for_more_samples(&self, track: &TrackId) -> bool;

    /// Hand over the next sample in decode order
    fn enqueue_sample(&mut self, track: &TrackId, sample: Sample);

    /// Drop queued samples and decode `samples` without displaying them
    fn flush_and_enqueue_non_displaying(&mut self, track: &TrackId, samples: Vec<Sample>);
}

/// Bounded per-track queue recording everything it receives
#[derive(Debug, Clone)]
pub struct QueueSink {
    capacity: usize,
    queues: BTreeMap<TrackId, VecDeque<Sample>>,
    non_displaying: BTreeMap<TrackId, Vec<Sample>>,
}

impl QueueSink {
    /// Sink holding up to `capacity` samples per track
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queues: BTreeMap::new(),
            non_displaying: BTreeMap::new(),
        }
    }

    /// Samples queued for `track`
    pub fn queued(&self, track: &TrackId) -> Vec<&Sample> {
        self.queues
            .get(track)
            .map(|queue| queue.iter().collect())
            .unwrap_or_default()
    }

    /// Samples last given as non-displaying for `track`
    pub fn non_displaying(&self, track: &TrackId) -> &[Sample] {
        self.non_displaying
            .get(track)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Consume the oldest queued sample, making room for another
    pub fn pop(&mut self, track: &TrackId) -> Option<Sample> {
        self.queues.get_mut(track).and_then(VecDeque::pop_front)
    }
}

impl SampleSink for QueueSink {
    fn is_ready_for_more_samples(&self, track: &TrackId) -> bool {
        self.queues.get(track).map_or(0, VecDeque::len) < self.capacity
    }

    fn enqueue_sample(&mut self, track: &TrackId, sample: Sample) {
        self.queues.entry(track.clone()).or_default().push_back(sample);
    }

    fn flush_and_enqueue_non_displaying(&mut self, track: &TrackId, samples: Vec<Sample>) {
        self.queues.remove(track);
        self.non_displaying.insert(track.clone(), samples);
    }
}

/// Move samples from the track's decode queue into the sink while it has
/// room. Returns the number of samples delivered.
pub fn provide_media_data(
    tracks: &mut TrackBufferMap,
    track: &TrackId,
    sink: &mut dyn SampleSink,
) -> usize {
    let Some(buffer) = tracks.get_mut(track) else {
        return 0;
    };
    let mut delivered = 0;
    while sink.is_ready_for_more_samples(track) {
        let Some(sample) = buffer.dequeue_next() else {
            break;
        };
        buffer.last_enqueued_presentation_time = Some(sample.presentation_time());
        sink.enqueue_sample(track, sample);
        delivered += 1;
    }
    tracing::debug!("Delivered {} samples on track {}", delivered, track);
    delivered
}

/// Re-prime every track for playback from `time`.
///
/// The samples between the preceding sync frame and the frame containing
/// `time` are handed over as non-displaying so the decoder can rebuild its
/// reference state. The decode queue then restarts at that frame.
pub fn seek_to_time(tracks: &mut TrackBufferMap, time: MediaTime, sink: &mut dyn SampleSink) {
    for track in tracks.track_ids() {
        let Some(buffer) = tracks.get_mut(&track) else {
            continue;
        };

        let target = buffer.samples.find_containing(time).or_else(|| buffer.samples.find_after(time));
        let Some(target_decode) = target.map(|s| s.decode_time()) else {
            buffer.decode_queue.clear();
            sink.flush_and_enqueue_non_displaying(&track, Vec::new());
            continue;
        };

        let sync_decode = buffer
            .samples
            .iter_decode()
            .take_while(|s| s.decode_time() <= target_decode)
            .filter(|s| s.is_sync())
            .last()
            .map(|s| s.decode_time())
            .unwrap_or(target_decode);

        let non_displaying: Vec<Sample> = buffer
            .samples
            .iter_decode_from(sync_decode)
            .take_while(|s| s.decode_time() < target_decode)
            .cloned()
            .collect();
        buffer.decode_queue = buffer
            .samples
            .iter_decode_from(target_decode)
            .map(|s| s.decode_time())
            .collect();
        buffer.last_enqueued_presentation_time = None;

        sink.flush_and_enqueue_non_displaying(&track, non_displaying);
        provide_media_data(tracks, &track, sink);
    }
}

/// Nearest sync frame presentation time to `time` within
/// `[time - negative_threshold, time + positive_threshold]` across tracks,
/// or `time` itself when none qualifies
pub fn fast_seek_time(
    tracks: &TrackBufferMap,
    time: MediaTime,
    negative_threshold: MediaTime,
    positive_threshold: MediaTime,
) -> MediaTime {
    let lower = time - negative_threshold;
    let upper = time + positive_threshold;
    let mut best: Option<(MediaTime, MediaTime)> = None;

    for (_, buffer) in tracks.iter() {
        let before = buffer.samples.find_sync_before(time).map(|s| s.presentation_time());
        let after = buffer.samples.find_sync_after(time).map(|s| s.presentation_time());
        for candidate in [before, after].into_iter().flatten() {
            if candidate < lower || candidate > upper {
                continue;
            }
            let distance = (candidate - time).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }
    }

    best.map_or(time, |(candidate, _)| candidate)
}

//! Coded frame processing
//!
//! [`CodedFrameProcessor`] ingests one demuxed sample at a time into a
//! [`TrackBufferMap`]: it applies the timestamp offset, detects decode
//! discontinuities, enforces the append window and the random access gate,
//! resolves overlaps with previously buffered data, removes dependent frames
//! and finally indexes the new frame and extends the buffered ranges.

use crate::error::{SourceBufferError, SourceBufferResult};
use crate::track_buffer::TrackBufferMap;
use serde::{Deserialize, Serialize};
use sourcebuf_core::{MediaKind, MediaTime, Sample, TrackId};
use std::collections::BTreeSet;

/// Configuration for coded frame processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// A new frame replaces an overlapped one when it starts less than this
    /// far after the overlapped frame. Also the smallest audio gap bridged.
    pub overlap_epsilon: MediaTime,
    /// Report audio gaps shorter than one frame as buffered
    pub merge_audio_gaps: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            overlap_epsilon: MediaTime::MICROSECOND,
            merge_audio_gaps: true,
        }
    }
}

/// Presentation interval outside of which frames are dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendWindow {
    /// Earliest accepted presentation timestamp
    pub start: MediaTime,
    /// Latest accepted frame end
    pub end: MediaTime,
}

impl Default for AppendWindow {
    fn default() -> Self {
        Self {
            start: MediaTime::ZERO,
            end: MediaTime::MAX,
        }
    }
}

impl AppendWindow {
    /// Whether a frame spanning `[start, end)` is inside the window
    pub fn admits(&self, start: MediaTime, end: MediaTime) -> bool {
        start >= self.start && end <= self.end
    }
}

/// Per-append parameters owned by the source buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendContext {
    /// Added to every presentation and decode timestamp
    pub timestamp_offset: MediaTime,
    /// Frames outside this window are dropped
    pub append_window: AppendWindow,
}

/// Why a frame was not buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Track is waiting for a sync frame
    NeedRandomAccessPoint,
    /// Frame lies outside the append window
    OutsideAppendWindow,
}

/// Result of processing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame was indexed
    Added,
    /// Frame was dropped without error
    Dropped(DropReason),
}

/// Processing counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingStats {
    /// Frames indexed
    pub frames_added: u64,
    /// Non-sync frames dropped while waiting for a random access point
    pub frames_dropped: u64,
    /// Frames dropped by the append window
    pub frames_outside_window: u64,
    /// Decode discontinuities detected
    pub discontinuities: u64,
    /// Stored frames removed by overlap resolution or dependency removal
    pub samples_replaced: u64,
    /// Media seconds indexed, consumed by the buffering rate monitor
    pub buffered_seconds_added: f64,
}

/// Ingests demuxed samples into track buffers
#[derive(Debug, Default)]
pub struct CodedFrameProcessor {
    config: ProcessingConfig,
    stats: ProcessingStats,
}

impl CodedFrameProcessor {
    /// Create a processor with default configuration
    pub fn new() -> Self {
        Self::with_config(ProcessingConfig::default())
    }

    /// Create a processor with custom configuration
    pub fn with_config(config: ProcessingConfig) -> Self {
        Self {
            config,
            stats: ProcessingStats::default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Counters since creation
    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Take and reset the media seconds buffered since the last call
    pub fn take_buffered_seconds(&mut self) -> f64 {
        std::mem::take(&mut self.stats.buffered_seconds_added)
    }

    /// Process one coded frame.
    ///
    /// Returns `Err` with a decode error when the offset frame has a negative
    /// timestamp or belongs to a track no initialization segment declared,
    /// and `QuotaExceeded` when the frame does not fit its track's quota.
    /// Dropped frames are not errors.
    pub fn process_sample(
        &mut self,
        tracks: &mut TrackBufferMap,
        sample: Sample,
        context: &AppendContext,
    ) -> SourceBufferResult<FrameOutcome> {
        let sample = sample.with_offset(context.timestamp_offset);
        let presentation_time = sample.presentation_time();
        let decode_time = sample.decode_time();
        let duration = sample.duration();
        let track_id = sample.track_id().clone();

        if presentation_time.is_negative() || decode_time.is_negative() {
            return Err(SourceBufferError::decode(format!(
                "negative timestamp on track {}: pts {}, dts {}",
                track_id, presentation_time, decode_time
            )));
        }

        let buffer = tracks.get(&track_id).ok_or_else(|| {
            SourceBufferError::decode(format!("sample for undeclared track {}", track_id))
        })?;

        if let (Some(last_decode), Some(last_duration)) =
            (buffer.last_decode_timestamp, buffer.last_frame_duration)
        {
            if decode_time < last_decode || (decode_time - last_decode).abs() > last_duration.mul_int(2) {
                tracing::info!(
                    "Discontinuity on track {}: dts {} after {}",
                    track_id,
                    decode_time,
                    last_decode
                );
                self.stats.discontinuities += 1;
                tracks.set_highest_presentation_end(Some(presentation_time));
                tracks.reset_rolling_state();
            }
        }

        let frame_end = presentation_time + duration;
        let epsilon = self.config.overlap_epsilon;
        let Some(buffer) = tracks.get_mut(&track_id) else {
            return Err(SourceBufferError::decode(format!("track {} vanished", track_id)));
        };

        if !context.append_window.admits(presentation_time, frame_end) {
            buffer.need_random_access_point = true;
            self.stats.frames_outside_window += 1;
            return Ok(FrameOutcome::Dropped(DropReason::OutsideAppendWindow));
        }

        if buffer.need_random_access_point {
            if !sample.is_sync() {
                self.stats.frames_dropped += 1;
                return Ok(FrameOutcome::Dropped(DropReason::NeedRandomAccessPoint));
            }
            buffer.need_random_access_point = false;
        }

        let mut erased: BTreeSet<MediaTime> = BTreeSet::new();

        if buffer.last_decode_timestamp.is_none() {
            if let Some(overlapped) = buffer.samples.find_containing(presentation_time) {
                if presentation_time < overlapped.presentation_time() + epsilon {
                    erased.insert(overlapped.decode_time());
                }
            }
        }

        let removal_start = match buffer.highest_presentation_timestamp {
            None => Some(presentation_time),
            Some(highest) if highest <= presentation_time => Some(highest),
            Some(_) => None,
        };
        if let Some(start) = removal_start {
            erased.extend(buffer.samples.decode_times_in_presentation_range(start, frame_end));
        }

        if buffer.samples.find_by_decode_time(decode_time).is_some() {
            erased.insert(decode_time);
        }

        let mut doomed = erased.clone();
        for erased_decode_time in &erased {
            doomed.extend(buffer.samples.dependent_decode_times(*erased_decode_time));
        }

        if !doomed.is_empty() {
            let decode_times: Vec<MediaTime> = doomed.into_iter().collect();
            let removed = tracks.erase_samples(&track_id, &decode_times);
            self.stats.samples_replaced += removed.len() as u64;
            tracing::debug!(
                "Frame at {} on track {} replaced {} buffered frames",
                presentation_time,
                track_id,
                removed.len()
            );
        }

        let Some(buffer) = tracks.get_mut(&track_id) else {
            return Err(SourceBufferError::decode(format!("track {} vanished", track_id)));
        };
        if !buffer.has_room_for(sample.size()) {
            buffer.need_random_access_point = true;
            let required = buffer.total_size().saturating_add(sample.size());
            let limit = buffer.quota_bytes();
            tracing::warn!(
                "Frame at {} does not fit track {}: {} bytes required, quota {}",
                presentation_time,
                track_id,
                required,
                limit
            );
            return Err(SourceBufferError::QuotaExceeded {
                track: track_id,
                required,
                limit,
            });
        }

        let kind = buffer.kind();
        buffer.samples.insert(sample)?;
        buffer.decode_queue.insert(decode_time);
        buffer.last_decode_timestamp = Some(decode_time);
        buffer.last_frame_duration = Some(duration);
        if buffer
            .highest_presentation_timestamp
            .map_or(true, |highest| frame_end > highest)
        {
            buffer.highest_presentation_timestamp = Some(frame_end);
        }

        let bridges = if kind == MediaKind::Audio && self.config.merge_audio_gaps {
            Self::audio_gap_bridges(tracks, &track_id, presentation_time, frame_end, epsilon)
        } else {
            Vec::new()
        };

        tracks.raise_highest_presentation_end(frame_end);
        tracks.add_buffered(presentation_time, frame_end);
        for (start, end) in bridges {
            tracks.add_buffered(start, end);
        }

        self.stats.frames_added += 1;
        self.stats.buffered_seconds_added += duration.as_secs_f64();
        Ok(FrameOutcome::Added)
    }

    // Private helper methods

    fn audio_gap_bridges(
        tracks: &TrackBufferMap,
        track_id: &TrackId,
        start: MediaTime,
        end: MediaTime,
        epsilon: MediaTime,
    ) -> Vec<(MediaTime, MediaTime)> {
        let Some(buffer) = tracks.get(track_id) else {
            return Vec::new();
        };
        let duration = end - start;
        let mut bridges = Vec::new();

        if let Some(previous) = buffer.samples.previous_in_presentation_order(start) {
            let gap = start - previous.presentation_end();
            if gap > epsilon && gap < duration {
                bridges.push((previous.presentation_end(), start));
            }
        }
        if let Some(next) = buffer.samples.next_in_presentation_order(start) {
            let gap = next.presentation_time() - end;
            if gap > epsilon && gap < duration {
                bridges.push((end, next.presentation_time()));
            }
        }
        bridges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_buffer::TrackBuffer;
    use crate::tracks::TrackDescription;
    use bytes::Bytes;

    fn ms(value: i64) -> MediaTime {
        MediaTime::from_millis(value)
    }

    fn tracks_for(kind: MediaKind) -> TrackBufferMap {
        let mut tracks = TrackBufferMap::new();
        tracks.insert_track(TrackBuffer::new(TrackDescription::new("t", kind, "c"), usize::MAX));
        tracks
    }

    fn frame(pts: i64, dts: i64, duration: i64, sync: bool) -> Sample {
        Sample::new("t", ms(pts), ms(dts), ms(duration), sync, Bytes::from_static(b"frame"))
    }

    #[test]
    fn test_audio_gap_smaller_than_frame_is_bridged() {
        let mut tracks = tracks_for(MediaKind::Audio);
        let mut processor = CodedFrameProcessor::new();
        let context = AppendContext::default();

        processor.process_sample(&mut tracks, frame(0, 0, 20, true), &context).unwrap();
        processor.process_sample(&mut tracks, frame(25, 25, 20, true), &context).unwrap();

        assert_eq!(tracks.buffered().len(), 1);
        assert!(tracks.buffered().contains_range(ms(0), ms(45)));
    }

    #[test]
    fn test_video_gap_is_not_bridged() {
        let mut tracks = tracks_for(MediaKind::Video);
        let mut processor = CodedFrameProcessor::new();
        let context = AppendContext::default();

        processor.process_sample(&mut tracks, frame(0, 0, 20, true), &context).unwrap();
        processor.process_sample(&mut tracks, frame(25, 25, 20, true), &context).unwrap();

        assert_eq!(tracks.buffered().len(), 2);
    }

    #[test]
    fn test_append_window_drops_and_requires_sync() {
        let mut tracks = tracks_for(MediaKind::Video);
        let mut processor = CodedFrameProcessor::new();
        let context = AppendContext {
            timestamp_offset: MediaTime::ZERO,
            append_window: AppendWindow {
                start: ms(100),
                end: ms(1000),
            },
        };

        let outcome = processor.process_sample(&mut tracks, frame(0, 0, 50, true), &context).unwrap();
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::OutsideAppendWindow));

        let outcome = processor.process_sample(&mut tracks, frame(100, 100, 50, false), &context).unwrap();
        assert_eq!(outcome, FrameOutcome::Dropped(DropReason::NeedRandomAccessPoint));

        let outcome = processor.process_sample(&mut tracks, frame(150, 150, 50, true), &context).unwrap();
        assert_eq!(outcome, FrameOutcome::Added);
        assert_eq!(processor.stats().frames_outside_window, 1);
        assert_eq!(processor.stats().frames_dropped, 1);
    }

    #[test]
    fn test_undeclared_track_is_decode_error() {
        let mut tracks = tracks_for(MediaKind::Video);
        let mut processor = CodedFrameProcessor::new();
        let stray = Sample::new("other", ms(0), ms(0), ms(10), true, Bytes::new());
        let result = processor.process_sample(&mut tracks, stray, &AppendContext::default());
        assert!(matches!(result, Err(SourceBufferError::Decode { .. })));
    }
}

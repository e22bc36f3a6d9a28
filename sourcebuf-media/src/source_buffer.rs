//! # Source buffer
//!
//! [`SourceBuffer`] ties the pieces together: it accepts appended bytes and
//! removal requests, runs them through the demuxer, the coded frame
//! processor and the removal and eviction engines, and records the lifecycle
//! events of every update cycle.
//!
//! Operations are split in two. `append_buffer` and `remove` validate their
//! arguments synchronously and move the buffer to `Updating`;
//! [`SourceBuffer::process_pending`] completes the operation and returns the
//! buffer to `Idle`. Between the two the caller may `abort`.

use crate::client::{MediaDuration, MediaSourceClient, ReadyState};
use crate::demux::{DemuxedItem, Demuxer};
use crate::error::{EndOfStreamError, SourceBufferError, SourceBufferResult};
use crate::events::SourceBufferEvent;
use crate::eviction::{evict_coded_frames, QuotaConfig};
use crate::monitor::BufferingRateMonitor;
use crate::processing::{AppendContext, AppendWindow, CodedFrameProcessor, ProcessingConfig, ProcessingStats};
use crate::removal::{remove_coded_frames, RemovalConfig};
use crate::render::{self, SampleSink};
use crate::track_buffer::{TrackBuffer, TrackBufferMap};
use crate::tracks::InitializationSegment;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sourcebuf_core::{MediaKind, MediaTime, TimeRanges, TrackId};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Source buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceBufferConfig {
    /// Per-kind byte quotas and eviction order
    pub quota: QuotaConfig,
    /// Coded frame processing settings
    pub processing: ProcessingConfig,
    /// Coded frame removal settings
    pub removal: RemovalConfig,
    /// How far from buffered data the playback position may be and still
    /// count as buffered
    pub current_time_tolerance: MediaTime,
}

impl Default for SourceBufferConfig {
    fn default() -> Self {
        Self {
            quota: QuotaConfig::default(),
            processing: ProcessingConfig::default(),
            removal: RemovalConfig::default(),
            // One frame at 24 fps
            current_time_tolerance: MediaTime::new(1, 24),
        }
    }
}

/// Operation in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Appended bytes are waiting to be processed
    Appending,
    /// A removal is waiting to be carried out
    Removing,
}

/// Source buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceBufferState {
    /// Ready for a new operation
    #[default]
    Idle,
    /// An operation is in progress
    Updating(UpdateKind),
}

impl SourceBufferState {
    /// Whether an operation is in progress
    pub fn is_updating(&self) -> bool {
        matches!(self, SourceBufferState::Updating(_))
    }
}

/// Buffer of appended media for one stream
pub struct SourceBuffer {
    id: Uuid,
    config: SourceBufferConfig,
    client: Arc<dyn MediaSourceClient>,
    demuxer: Box<dyn Demuxer>,
    tracks: TrackBufferMap,
    processor: CodedFrameProcessor,
    monitor: BufferingRateMonitor,
    state: SourceBufferState,
    operation: u64,
    removed: bool,
    active: bool,
    received_init_segment: bool,
    pending_append: Option<Bytes>,
    pending_remove: Option<(MediaTime, MediaTime)>,
    timestamp_offset: MediaTime,
    append_window: AppendWindow,
    events: VecDeque<SourceBufferEvent>,
}

impl fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("operation", &self.operation)
            .field("removed", &self.removed)
            .field("active", &self.active)
            .field("tracks", &self.tracks.len())
            .field("buffered", self.tracks.buffered())
            .finish_non_exhaustive()
    }
}

impl SourceBuffer {
    /// Create a source buffer with default configuration
    pub fn new(client: Arc<dyn MediaSourceClient>, demuxer: Box<dyn Demuxer>) -> Self {
        Self::with_config(SourceBufferConfig::default(), client, demuxer)
    }

    /// Create a source buffer with custom configuration
    pub fn with_config(
        config: SourceBufferConfig,
        client: Arc<dyn MediaSourceClient>,
        demuxer: Box<dyn Demuxer>,
    ) -> Self {
        let processor = CodedFrameProcessor::with_config(config.processing.clone());
        Self {
            id: Uuid::new_v4(),
            config,
            client,
            demuxer,
            tracks: TrackBufferMap::new(),
            processor,
            monitor: BufferingRateMonitor::new(),
            state: SourceBufferState::Idle,
            operation: 0,
            removed: false,
            active: false,
            received_init_segment: false,
            pending_append: None,
            pending_remove: None,
            timestamp_offset: MediaTime::ZERO,
            append_window: AppendWindow::default(),
            events: VecDeque::new(),
        }
    }

    /// Unique buffer id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Active configuration
    pub fn config(&self) -> &SourceBufferConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> SourceBufferState {
        self.state
    }

    /// Whether an append or remove is in progress
    pub fn is_updating(&self) -> bool {
        self.state.is_updating()
    }

    /// Whether the buffer was detached from its parent
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Whether an initialization segment created track buffers
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Queue bytes for processing.
    ///
    /// Eviction runs first; if it cannot make room the call fails with
    /// `QuotaExceeded` and the buffer stays `Idle`.
    pub fn append_buffer(&mut self, data: impl Into<Bytes>) -> SourceBufferResult<()> {
        let data = data.into();
        self.ensure_idle("append_buffer")?;

        let outcome = evict_coded_frames(
            &mut self.tracks,
            data.len(),
            self.client.current_time(),
            &self.config.quota,
        )?;
        if outcome.stalled {
            self.handle_stall();
        }

        tracing::debug!("Buffer {} appending {} bytes", self.id, data.len());
        self.pending_append = Some(data);
        self.operation += 1;
        self.state = SourceBufferState::Updating(UpdateKind::Appending);
        self.events.push_back(SourceBufferEvent::UpdateStart);
        Ok(())
    }

    /// Remove media presenting in `[start, end)`
    pub fn remove(&mut self, start: MediaTime, end: MediaTime) -> SourceBufferResult<()> {
        self.ensure_idle("remove")?;

        if start.is_negative() || end <= start {
            return Err(SourceBufferError::invalid_access(format!(
                "invalid removal range [{}, {})",
                start, end
            )));
        }
        let duration = self.client.duration();
        if duration == MediaDuration::Unset {
            return Err(SourceBufferError::invalid_access("duration is not set"));
        }
        if !duration.admits(start) || !duration.admits(end) {
            return Err(SourceBufferError::invalid_access(format!(
                "removal range [{}, {}) exceeds duration {:?}",
                start, end, duration
            )));
        }

        tracing::debug!("Buffer {} removing [{}, {})", self.id, start, end);
        self.pending_remove = Some((start, end));
        self.operation += 1;
        self.state = SourceBufferState::Updating(UpdateKind::Removing);
        self.events.push_back(SourceBufferEvent::UpdateStart);
        Ok(())
    }

    /// Id of the append or remove in progress. Every started operation gets
    /// a new id.
    pub fn current_operation(&self) -> Option<u64> {
        self.state.is_updating().then_some(self.operation)
    }

    /// Complete the operation in progress only if it is `operation`.
    /// Returns whether it was completed.
    pub fn complete_operation(&mut self, operation: u64) -> bool {
        if self.current_operation() != Some(operation) {
            return false;
        }
        self.process_pending();
        true
    }

    /// Complete the operation in progress. Does nothing when idle.
    pub fn process_pending(&mut self) {
        match self.state {
            SourceBufferState::Idle => {}
            SourceBufferState::Updating(UpdateKind::Appending) => self.complete_append(),
            SourceBufferState::Updating(UpdateKind::Removing) => self.complete_remove(),
        }
    }

    /// Cancel the operation in progress and reset the parser and all
    /// rolling ingest state
    pub fn abort(&mut self) -> SourceBufferResult<()> {
        self.ensure_not_removed("abort")?;

        if self.state.is_updating() {
            self.cancel_update();
        }
        self.demuxer.reset();
        self.tracks.reset_rolling_state();
        self.tracks.clear_highest_presentation_end();
        self.timestamp_offset = MediaTime::ZERO;
        self.append_window = AppendWindow::default();
        tracing::debug!("Buffer {} aborted", self.id);
        Ok(())
    }

    /// Detach the buffer from its parent. Every later operation fails with
    /// `InvalidState`.
    pub fn removed_from_parent(&mut self) {
        if self.removed {
            return;
        }
        if self.state.is_updating() {
            self.cancel_update();
        }
        self.demuxer.reset();
        self.removed = true;
        self.active = false;
        tracing::info!("Buffer {} removed from parent", self.id);
    }

    /// Offset added to the timestamps of appended frames
    pub fn timestamp_offset(&self) -> MediaTime {
        self.timestamp_offset
    }

    /// Change the timestamp offset. Not allowed while updating or in the
    /// middle of a media segment.
    pub fn set_timestamp_offset(&mut self, offset: MediaTime) -> SourceBufferResult<()> {
        self.ensure_idle("set_timestamp_offset")?;
        if self.demuxer.is_parsing_media_segment() {
            return Err(SourceBufferError::invalid_state(
                "cannot change timestamp offset while parsing a media segment",
            ));
        }
        self.timestamp_offset = offset;
        Ok(())
    }

    /// Presentation interval outside of which frames are dropped
    pub fn append_window(&self) -> AppendWindow {
        self.append_window
    }

    /// Change the append window
    pub fn set_append_window(&mut self, start: MediaTime, end: MediaTime) -> SourceBufferResult<()> {
        self.ensure_idle("set_append_window")?;
        if start.is_negative() || end <= start {
            return Err(SourceBufferError::invalid_access(format!(
                "invalid append window [{}, {})",
                start, end
            )));
        }
        self.append_window = AppendWindow { start, end };
        Ok(())
    }

    /// Snapshot of the buffered presentation ranges
    pub fn buffered(&self) -> SourceBufferResult<TimeRanges> {
        self.ensure_not_removed("buffered")?;
        Ok(self.tracks.buffered().clone())
    }

    /// Track buffer by id
    pub fn track_buffer(&self, id: &TrackId) -> Option<&TrackBuffer> {
        self.tracks.get(id)
    }

    /// Every track buffer
    pub fn track_buffers(&self) -> &TrackBufferMap {
        &self.tracks
    }

    /// Highest presentation end appended since the last reset
    pub fn highest_presentation_end_timestamp(&self) -> Option<MediaTime> {
        self.tracks.highest_presentation_end()
    }

    /// Frames dropped by the random access gate or the append window
    pub fn dropped_frame_count(&self) -> u64 {
        let stats = self.processor.stats();
        stats.frames_dropped + stats.frames_outside_window
    }

    /// Coded frame processing counters
    pub fn processing_stats(&self) -> &ProcessingStats {
        self.processor.stats()
    }

    /// Whether media is buffered at the playback position
    pub fn has_current_time(&self) -> bool {
        if self.removed || self.tracks.buffered().is_empty() {
            return false;
        }
        let current = self.client.current_time();
        if self.at_or_past_end(current) {
            return true;
        }
        self.tracks
            .buffered()
            .nearest(current)
            .map_or(false, |nearest| (nearest - current).abs() <= self.config.current_time_tolerance)
    }

    /// Whether media is buffered beyond the playback position
    pub fn has_future_time(&self) -> bool {
        if self.removed || self.tracks.buffered().is_empty() {
            return false;
        }
        let current = self.client.current_time();
        if self.at_or_past_end(current) {
            return true;
        }
        let tolerance = self.config.current_time_tolerance;
        let buffered = self.tracks.buffered();
        let Some(nearest) = buffered.nearest(current) else {
            return false;
        };
        if (nearest - current).abs() > tolerance {
            return false;
        }
        let Some(range) = buffered.iter().find(|r| r.start <= nearest && nearest <= r.end) else {
            return false;
        };
        if self.client.duration().finite() == Some(range.end) {
            return true;
        }
        range.end - current > tolerance
    }

    /// Whether buffering keeps ahead of playback until the end
    pub fn can_play_through(&mut self) -> bool {
        if self.removed {
            return false;
        }
        self.monitor.can_play_through(
            self.tracks.buffered(),
            self.client.current_time(),
            self.client.duration(),
            Instant::now(),
        )
    }

    /// Hand queued samples of one track to the renderer while it has room
    pub fn provide_media_data(&mut self, track: &TrackId, sink: &mut dyn SampleSink) -> usize {
        if self.removed {
            return 0;
        }
        render::provide_media_data(&mut self.tracks, track, sink)
    }

    /// Hand queued samples of every track to the renderer
    pub fn provide_all_media_data(&mut self, sink: &mut dyn SampleSink) -> usize {
        if self.removed {
            return 0;
        }
        self.tracks
            .track_ids()
            .iter()
            .map(|track| render::provide_media_data(&mut self.tracks, track, sink))
            .sum()
    }

    /// Restart delivery at `time`
    pub fn seek_to_time(&mut self, time: MediaTime, sink: &mut dyn SampleSink) {
        if self.removed {
            return;
        }
        tracing::debug!("Buffer {} seeking to {}", self.id, time);
        render::seek_to_time(&mut self.tracks, time, sink);
    }

    /// Nearest sync frame time to `time` within the given thresholds
    pub fn fast_seek_time(
        &self,
        time: MediaTime,
        negative_threshold: MediaTime,
        positive_threshold: MediaTime,
    ) -> MediaTime {
        render::fast_seek_time(&self.tracks, time, negative_threshold, positive_threshold)
    }

    /// Take the events recorded since the last call
    pub fn drain_events(&mut self) -> Vec<SourceBufferEvent> {
        self.events.drain(..).collect()
    }

    // Private helper methods

    fn ensure_not_removed(&self, operation: &str) -> SourceBufferResult<()> {
        if self.removed {
            return Err(SourceBufferError::invalid_state(format!(
                "{} on a buffer removed from its parent",
                operation
            )));
        }
        Ok(())
    }

    fn ensure_idle(&self, operation: &str) -> SourceBufferResult<()> {
        self.ensure_not_removed(operation)?;
        if self.state.is_updating() {
            return Err(SourceBufferError::invalid_state(format!(
                "{} while an update is in progress",
                operation
            )));
        }
        Ok(())
    }

    fn at_or_past_end(&self, current: MediaTime) -> bool {
        self.client.duration().finite().map_or(false, |duration| current >= duration)
    }

    fn cancel_update(&mut self) {
        self.pending_append = None;
        self.pending_remove = None;
        self.state = SourceBufferState::Idle;
        self.events.push_back(SourceBufferEvent::Abort);
        self.events.push_back(SourceBufferEvent::UpdateEnd);
    }

    fn complete_append(&mut self) {
        let data = self.pending_append.take().unwrap_or_default();
        let result = self.ingest(&data);

        let seconds = self.processor.take_buffered_seconds();
        self.monitor.record_buffered(seconds);
        self.monitor.update_at(Instant::now());

        match result {
            Ok(()) => {
                self.update_duration();
                self.state = SourceBufferState::Idle;
                self.events.push_back(SourceBufferEvent::Update);
                self.events.push_back(SourceBufferEvent::UpdateEnd);
                tracing::debug!(
                    "Buffer {} append complete, buffered {}",
                    self.id,
                    self.tracks.buffered()
                );
            }
            Err(error) => self.append_error(error),
        }
    }

    fn ingest(&mut self, data: &[u8]) -> SourceBufferResult<()> {
        let items = self.demuxer.append(data)?;
        let context = AppendContext {
            timestamp_offset: self.timestamp_offset,
            append_window: self.append_window,
        };

        for item in items {
            match item {
                DemuxedItem::InitializationSegment(segment) => {
                    self.initialization_segment_received(segment)?;
                }
                DemuxedItem::Sample(sample) => {
                    if !self.received_init_segment {
                        return Err(SourceBufferError::decode(
                            "media data before the first initialization segment",
                        ));
                    }
                    self.processor.process_sample(&mut self.tracks, sample, &context)?;
                }
            }
        }
        Ok(())
    }

    fn append_error(&mut self, error: SourceBufferError) {
        tracing::warn!("Buffer {} append failed: {}", self.id, error);
        self.demuxer.reset();
        self.pending_append = None;
        self.state = SourceBufferState::Idle;
        if error.is_fatal() {
            self.client.end_of_stream(EndOfStreamError::Decode);
        }
        self.events.push_back(SourceBufferEvent::Error { error });
        self.events.push_back(SourceBufferEvent::UpdateEnd);
    }

    fn complete_remove(&mut self) {
        if let Some((start, end)) = self.pending_remove.take() {
            let outcome = remove_coded_frames(
                &mut self.tracks,
                start,
                end,
                self.client.current_time(),
                &self.config.removal,
            );
            if outcome.stalled {
                self.handle_stall();
            }
            tracing::debug!(
                "Buffer {} removed {} frames, buffered {}",
                self.id,
                outcome.samples_removed,
                self.tracks.buffered()
            );
        }
        self.state = SourceBufferState::Idle;
        self.events.push_back(SourceBufferEvent::Update);
        self.events.push_back(SourceBufferEvent::UpdateEnd);
    }

    fn initialization_segment_received(&mut self, segment: InitializationSegment) -> SourceBufferResult<()> {
        if self.client.duration() == MediaDuration::Unset {
            let duration = segment
                .duration
                .map_or(MediaDuration::Unbounded, MediaDuration::Finite);
            self.client.set_duration(duration);
        }

        if segment.tracks.is_empty() {
            return Err(SourceBufferError::decode("initialization segment without tracks"));
        }

        if self.received_init_segment {
            self.match_tracks(&segment)?;
        } else {
            for description in &segment.tracks {
                let quota = self.config.quota.quota_for(description.kind);
                if !self.tracks.insert_track(TrackBuffer::new(description.clone(), quota)) {
                    return Err(SourceBufferError::decode(format!(
                        "duplicate track id {} in initialization segment",
                        description.id
                    )));
                }
            }
            self.active = true;
            self.received_init_segment = true;
            tracing::info!("Buffer {} created {} track buffers", self.id, segment.tracks.len());

            if self.client.ready_state() > ReadyState::HaveCurrentData {
                self.client.set_ready_state(ReadyState::HaveMetadata);
            }
        }

        if self.client.ready_state() == ReadyState::HaveNothing {
            self.client.set_ready_state(ReadyState::HaveMetadata);
        }
        Ok(())
    }

    fn match_tracks(&mut self, segment: &InitializationSegment) -> SourceBufferResult<()> {
        let mut renames = Vec::new();

        for kind in [MediaKind::Audio, MediaKind::Video, MediaKind::Text] {
            let existing: Vec<TrackId> = self
                .tracks
                .iter()
                .filter(|(_, buffer)| buffer.kind() == kind)
                .map(|(id, _)| id.clone())
                .collect();
            let incoming: Vec<&TrackId> = segment.tracks_of(kind).map(|t| &t.id).collect();

            if existing.len() != incoming.len() {
                return Err(SourceBufferError::decode(format!(
                    "initialization segment has {} {} tracks, expected {}",
                    incoming.len(),
                    kind,
                    existing.len()
                )));
            }
            match existing.as_slice() {
                [] => {}
                [only] => {
                    if only != incoming[0] {
                        renames.push((only.clone(), incoming[0].clone()));
                    }
                }
                _ => {
                    if let Some(unknown) = incoming.iter().find(|id| !existing.contains(**id)) {
                        return Err(SourceBufferError::decode(format!(
                            "initialization segment declares unknown {} track {}",
                            kind, unknown
                        )));
                    }
                }
            }
        }

        for (old, new) in renames {
            if !self.tracks.rename_track(&old, &new) {
                return Err(SourceBufferError::decode(format!(
                    "cannot rename track {} to {}",
                    old, new
                )));
            }
        }
        Ok(())
    }

    fn update_duration(&mut self) {
        let Some(highest_end) = self.tracks.highest_presentation_end() else {
            return;
        };
        if let MediaDuration::Finite(duration) = self.client.duration() {
            if highest_end > duration {
                tracing::debug!("Buffer {} extends duration to {}", self.id, highest_end);
                self.client.set_duration(MediaDuration::Finite(highest_end));
            }
        }
    }

    fn handle_stall(&mut self) {
        if self.active && self.client.ready_state() > ReadyState::HaveMetadata {
            tracing::info!("Buffer {} lost data at the playback position", self.id);
            self.client.set_ready_state(ReadyState::HaveMetadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PlaybackState;
    use crate::eviction::EvictionOrder;
    use crate::framing::{FrameWriter, FramedDemuxer};
    use crate::removal::SparseSyncPolicy;
    use crate::tracks::TrackDescription;
    use sourcebuf_core::Sample;

    fn setup() -> (Arc<PlaybackState>, SourceBuffer) {
        let client = Arc::new(PlaybackState::new());
        let buffer = SourceBuffer::new(client.clone(), Box::new(FramedDemuxer::new()));
        (client, buffer)
    }

    fn init_bytes(tracks: Vec<TrackDescription>) -> Bytes {
        let mut writer = FrameWriter::new();
        writer
            .write_init_segment(&InitializationSegment::new(Some(MediaTime::from_seconds(10)), tracks))
            .unwrap();
        writer.finish()
    }

    #[test]
    fn test_default_config() {
        let config = SourceBufferConfig::default();
        assert_eq!(config.current_time_tolerance, MediaTime::new(1, 24));
        assert_eq!(config.quota, QuotaConfig::default());
    }

    #[test]
    fn test_config_json() {
        let config = SourceBufferConfig {
            quota: QuotaConfig {
                video_bytes: 4096,
                eviction_order: EvictionOrder::FarthestFirst,
                ..QuotaConfig::constrained()
            },
            removal: RemovalConfig {
                sparse_sync_policy: SparseSyncPolicy::StopAtRangeEnd,
            },
            ..SourceBufferConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SourceBufferConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let partial: SourceBufferConfig =
            serde_json::from_str(r#"{ "removal": { "sparse_sync_policy": "StopAtRangeEnd" } }"#).unwrap();
        assert_eq!(partial.removal.sparse_sync_policy, SparseSyncPolicy::StopAtRangeEnd);
        assert_eq!(partial.quota, QuotaConfig::default());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let (_client, mut buffer) = setup();
        assert_eq!(buffer.current_operation(), None);

        buffer
            .append_buffer(init_bytes(vec![TrackDescription::new("v", MediaKind::Video, "avc1")]))
            .unwrap();
        let first = buffer.current_operation().unwrap();
        buffer.abort().unwrap();
        buffer
            .append_buffer(init_bytes(vec![TrackDescription::new("v", MediaKind::Video, "avc1")]))
            .unwrap();
        let second = buffer.current_operation().unwrap();
        assert_ne!(first, second);

        assert!(!buffer.complete_operation(first));
        assert!(buffer.is_updating());
        assert!(buffer.complete_operation(second));
        assert!(!buffer.is_updating());
        assert!(!buffer.complete_operation(second));
    }

    #[test]
    fn test_operations_rejected_while_updating() {
        let (_client, mut buffer) = setup();
        buffer.append_buffer(Bytes::new()).unwrap();
        assert_eq!(buffer.state(), SourceBufferState::Updating(UpdateKind::Appending));

        assert!(matches!(
            buffer.append_buffer(Bytes::new()),
            Err(SourceBufferError::InvalidState { .. })
        ));
        assert!(matches!(
            buffer.set_timestamp_offset(MediaTime::from_seconds(1)),
            Err(SourceBufferError::InvalidState { .. })
        ));

        buffer.process_pending();
        assert_eq!(buffer.state(), SourceBufferState::Idle);
    }

    #[test]
    fn test_init_segment_sets_duration_and_ready_state() {
        let (client, mut buffer) = setup();
        buffer
            .append_buffer(init_bytes(vec![TrackDescription::new("v", MediaKind::Video, "avc1")]))
            .unwrap();
        buffer.process_pending();

        assert!(buffer.is_active());
        assert_eq!(client.duration(), MediaDuration::Finite(MediaTime::from_seconds(10)));
        assert_eq!(client.ready_state(), ReadyState::HaveMetadata);
        assert!(buffer.track_buffer(&TrackId::new("v")).is_some());
    }

    #[test]
    fn test_single_track_renamed_by_later_init_segment() {
        let (_client, mut buffer) = setup();
        buffer
            .append_buffer(init_bytes(vec![TrackDescription::new("v1", MediaKind::Video, "avc1")]))
            .unwrap();
        buffer.process_pending();

        let mut writer = FrameWriter::new();
        writer
            .write_init_segment(&InitializationSegment::new(
                None,
                vec![TrackDescription::new("v2", MediaKind::Video, "avc1")],
            ))
            .unwrap()
            .write_sample(&Sample::new(
                "v2",
                MediaTime::ZERO,
                MediaTime::ZERO,
                MediaTime::from_millis(40),
                true,
                Bytes::from_static(b"key"),
            ))
            .unwrap();
        buffer.append_buffer(writer.finish()).unwrap();
        buffer.process_pending();

        assert!(buffer.track_buffer(&TrackId::new("v1")).is_none());
        assert_eq!(buffer.track_buffer(&TrackId::new("v2")).map(|b| b.samples().len()), Some(1));
    }

    #[test]
    fn test_duration_extended_past_buffered_end() {
        let (client, mut buffer) = setup();
        client.set_duration(MediaDuration::Finite(MediaTime::from_seconds(1)));

        let mut writer = FrameWriter::new();
        writer
            .write_init_segment(&InitializationSegment::new(
                None,
                vec![TrackDescription::new("a", MediaKind::Audio, "opus")],
            ))
            .unwrap()
            .write_sample(&Sample::new(
                "a",
                MediaTime::from_millis(980),
                MediaTime::from_millis(980),
                MediaTime::from_millis(40),
                true,
                Bytes::from_static(b"frame"),
            ))
            .unwrap();
        buffer.append_buffer(writer.finish()).unwrap();
        buffer.process_pending();

        assert_eq!(client.duration(), MediaDuration::Finite(MediaTime::from_millis(1020)));
    }

    #[test]
    fn test_has_current_and_future_time() {
        let (client, mut buffer) = setup();
        assert!(!buffer.has_current_time());

        let mut writer = FrameWriter::new();
        writer
            .write_init_segment(&InitializationSegment::new(
                Some(MediaTime::from_seconds(10)),
                vec![TrackDescription::new("a", MediaKind::Audio, "opus")],
            ))
            .unwrap();
        for index in 0..50 {
            let time = MediaTime::from_millis(index * 20);
            writer
                .write_sample(&Sample::new("a", time, time, MediaTime::from_millis(20), true, Bytes::from_static(b"a")))
                .unwrap();
        }
        buffer.append_buffer(writer.finish()).unwrap();
        buffer.process_pending();

        client.set_current_time(MediaTime::from_millis(500));
        assert!(buffer.has_current_time());
        assert!(buffer.has_future_time());

        client.set_current_time(MediaTime::from_millis(990));
        assert!(buffer.has_current_time());
        assert!(!buffer.has_future_time());

        client.set_current_time(MediaTime::from_seconds(3));
        assert!(!buffer.has_current_time());
    }
}

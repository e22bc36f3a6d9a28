//! Buffer health analysis
//!
//! Summarises a source buffer as a serializable [`BufferReport`]: what is
//! buffered, where the gaps are, and how close each track is to its quota.

use crate::DiagnosticsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sourcebuf_core::{MediaKind, TimeRanges};
use sourcebuf_media::{SourceBuffer, TrackBuffer};
use uuid::Uuid;

/// Presentation range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeReport {
    /// Range start
    pub start: f64,
    /// Range end
    pub end: f64,
}

/// Health of one track buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    /// Track id
    pub id: String,
    /// Media kind
    pub kind: MediaKind,
    /// Codec string
    pub codec: String,
    /// Stored samples
    pub sample_count: usize,
    /// Stored sync samples
    pub sync_sample_count: usize,
    /// Stored payload bytes
    pub bytes: usize,
    /// Track quota in bytes
    pub quota_bytes: usize,
    /// `bytes / quota_bytes`
    pub quota_utilization: f64,
    /// Samples waiting for the renderer
    pub queued_samples: usize,
    /// Earliest presentation time in seconds
    pub first_presentation: Option<f64>,
    /// Latest presentation end in seconds
    pub last_presentation_end: Option<f64>,
}

/// Snapshot of a source buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferReport {
    /// Source buffer id
    pub buffer_id: Uuid,
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Whether the buffer was removed from its parent
    pub removed: bool,
    /// Whether an append or remove was in progress
    pub updating: bool,
    /// Buffered ranges
    pub buffered: Vec<RangeReport>,
    /// Gaps between buffered ranges
    pub gaps: Vec<RangeReport>,
    /// Total buffered seconds
    pub buffered_seconds: f64,
    /// Highest presentation end since the last reset, in seconds
    pub highest_presentation_end: Option<f64>,
    /// Frames dropped by the random access gate or the append window
    pub dropped_frames: u64,
    /// Decode discontinuities seen
    pub discontinuities: u64,
    /// Per-track health
    pub tracks: Vec<TrackReport>,
    /// Tracks whose utilization is at or above the warning threshold
    pub near_quota: Vec<String>,
}

impl BufferReport {
    /// Render the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, DiagnosticsError> {
        serde_json::to_string_pretty(self).map_err(|e| DiagnosticsError::Serialization {
            reason: e.to_string(),
        })
    }

    /// Report for one track
    pub fn track(&self, id: &str) -> Option<&TrackReport> {
        self.tracks.iter().find(|track| track.id == id)
    }
}

/// Builds [`BufferReport`]s
#[derive(Debug, Clone)]
pub struct BufferAnalyzer {
    quota_warning_threshold: f64,
}

impl Default for BufferAnalyzer {
    fn default() -> Self {
        Self::new(0.9)
    }
}

impl BufferAnalyzer {
    /// Analyzer flagging tracks at or above `quota_warning_threshold` of
    /// their quota
    pub fn new(quota_warning_threshold: f64) -> Self {
        Self {
            quota_warning_threshold,
        }
    }

    /// Utilization at which a track is flagged
    pub fn quota_warning_threshold(&self) -> f64 {
        self.quota_warning_threshold
    }

    /// Build a report for `buffer`
    pub fn analyze(&self, buffer: &SourceBuffer) -> BufferReport {
        let tracks = buffer.track_buffers();
        let buffered = tracks.buffered();

        let track_reports: Vec<TrackReport> = tracks.iter().map(|(_, track)| Self::track_report(track)).collect();
        let near_quota: Vec<String> = track_reports
            .iter()
            .filter(|track| track.quota_utilization >= self.quota_warning_threshold)
            .map(|track| track.id.clone())
            .collect();
        for id in &near_quota {
            tracing::warn!("Track {} of buffer {} is close to its quota", id, buffer.id());
        }

        let stats = buffer.processing_stats();
        BufferReport {
            buffer_id: buffer.id(),
            generated_at: Utc::now(),
            removed: buffer.is_removed(),
            updating: buffer.is_updating(),
            buffered: Self::ranges(buffered),
            gaps: Self::ranges(&buffered.gaps()),
            buffered_seconds: buffered.total_duration().as_secs_f64(),
            highest_presentation_end: buffer.highest_presentation_end_timestamp().map(|t| t.as_secs_f64()),
            dropped_frames: buffer.dropped_frame_count(),
            discontinuities: stats.discontinuities,
            tracks: track_reports,
            near_quota,
        }
    }

    // Private helper methods

    fn track_report(track: &TrackBuffer) -> TrackReport {
        let samples = track.samples();
        let bytes = track.total_size();
        let quota = track.quota_bytes();
        let utilization = if quota == 0 { 1.0 } else { bytes as f64 / quota as f64 };

        TrackReport {
            id: track.description().id.to_string(),
            kind: track.kind(),
            codec: track.description().codec.clone(),
            sample_count: samples.len(),
            sync_sample_count: samples.iter_decode().filter(|s| s.is_sync()).count(),
            bytes,
            quota_bytes: quota,
            quota_utilization: utilization,
            queued_samples: track.decode_queue_len(),
            first_presentation: samples.first_presentation().map(|s| s.presentation_time().as_secs_f64()),
            last_presentation_end: samples
                .iter_presentation()
                .map(|s| s.presentation_end())
                .max()
                .map(|t| t.as_secs_f64()),
        }
    }

    fn ranges(ranges: &TimeRanges) -> Vec<RangeReport> {
        ranges
            .iter()
            .map(|range| RangeReport {
                start: range.start.as_secs_f64(),
                end: range.end.as_secs_f64(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sourcebuf_core::{MediaTime, Sample};
    use sourcebuf_media::{
        FrameWriter, FramedDemuxer, InitializationSegment, PlaybackState, QuotaConfig, SourceBufferConfig,
        TrackDescription,
    };
    use std::sync::Arc;

    fn loaded_buffer() -> SourceBuffer {
        let config = SourceBufferConfig {
            quota: QuotaConfig {
                audio_bytes: 1000,
                ..QuotaConfig::default()
            },
            ..SourceBufferConfig::default()
        };
        let mut buffer = SourceBuffer::with_config(
            config,
            Arc::new(PlaybackState::new()),
            Box::new(FramedDemuxer::new()),
        );

        let mut writer = FrameWriter::new();
        writer
            .write_init_segment(&InitializationSegment::new(
                Some(MediaTime::from_seconds(4)),
                vec![
                    TrackDescription::new("audio", MediaKind::Audio, "opus"),
                    TrackDescription::new("video", MediaKind::Video, "avc1"),
                ],
            ))
            .unwrap();
        for index in 0..10 {
            let time = MediaTime::from_millis(index * 100);
            writer
                .write_sample(&Sample::new("audio", time, time, MediaTime::from_millis(100), true, Bytes::from(vec![1u8; 95])))
                .unwrap();
        }
        for start in [0, 2000] {
            let time = MediaTime::from_millis(start);
            writer
                .write_sample(&Sample::new("video", time, time, MediaTime::from_millis(500), true, Bytes::from(vec![2u8; 10])))
                .unwrap();
        }
        buffer.append_buffer(writer.finish()).unwrap();
        buffer.process_pending();
        buffer
    }

    #[test]
    fn test_report_contents() {
        let buffer = loaded_buffer();
        let report = BufferAnalyzer::default().analyze(&buffer);

        assert_eq!(report.buffer_id, buffer.id());
        assert!(!report.removed);
        assert_eq!(
            report.buffered,
            vec![RangeReport { start: 0.0, end: 1.0 }, RangeReport { start: 2.0, end: 2.5 }]
        );
        assert_eq!(report.gaps, vec![RangeReport { start: 1.0, end: 2.0 }]);
        assert!((report.buffered_seconds - 1.5).abs() < 1e-9);

        let audio = report.track("audio").unwrap();
        assert_eq!(audio.sample_count, 10);
        assert_eq!(audio.bytes, 950);
        assert!((audio.quota_utilization - 0.95).abs() < 1e-9);
        assert_eq!(audio.last_presentation_end, Some(1.0));
        assert_eq!(report.near_quota, vec!["audio".to_string()]);

        let video = report.track("video").unwrap();
        assert_eq!(video.sync_sample_count, 2);
        assert_eq!(video.first_presentation, Some(0.0));
    }

    #[test]
    fn test_report_renders_as_json() {
        let report = BufferAnalyzer::new(0.99).analyze(&loaded_buffer());
        assert!(report.near_quota.is_empty());

        let json = report.to_json().unwrap();
        let parsed: BufferReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tracks.len(), 2);
        assert_eq!(parsed.buffer_id, report.buffer_id);
        assert!(json.contains("\"generated_at\""));
    }
}

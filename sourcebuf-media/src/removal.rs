//! Coded frame removal
//!
//! Removes a presentation range from every track buffer. The end of the
//! range is pushed forward to the next sync frame so no surviving frame loses
//! a frame it depends on.

use crate::track_buffer::TrackBufferMap;
use serde::{Deserialize, Serialize};
use sourcebuf_core::MediaTime;

/// What to do when no sync frame exists at or after the removal end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SparseSyncPolicy {
    /// Remove every frame from the range start to the end of the track
    #[default]
    RemoveToEndOfTrack,
    /// Remove only frames starting before the requested end
    StopAtRangeEnd,
}

/// Configuration for coded frame removal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Policy for tracks without a sync frame after the removal end
    pub sparse_sync_policy: SparseSyncPolicy,
}

/// Summary of one removal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// Frames removed across all tracks
    pub samples_removed: usize,
    /// Payload bytes released
    pub bytes_removed: usize,
    /// Data at the playback position was removed
    pub stalled: bool,
}

/// Remove frames starting in `[start, end)` from every track, extending the
/// end of each track's removal to its next sync frame at or after `end`.
pub fn remove_coded_frames(
    tracks: &mut TrackBufferMap,
    start: MediaTime,
    end: MediaTime,
    current_time: MediaTime,
    config: &RemovalConfig,
) -> RemovalOutcome {
    let mut outcome = RemovalOutcome::default();

    for track_id in tracks.track_ids() {
        let Some(buffer) = tracks.get_mut(&track_id) else {
            continue;
        };

        let next_sync = buffer.samples.find_sync_after(end).map(|s| s.presentation_time());
        let remove_end = match (next_sync, config.sparse_sync_policy) {
            (Some(sync), _) => Some(sync),
            (None, SparseSyncPolicy::RemoveToEndOfTrack) => None,
            (None, SparseSyncPolicy::StopAtRangeEnd) => Some(end),
        };

        if remove_end.is_none() {
            buffer.highest_presentation_timestamp = buffer
                .samples
                .previous_in_presentation_order(start)
                .map(|s| s.presentation_end());
        }

        let effective_end = remove_end.unwrap_or(MediaTime::MAX);
        let removed = tracks.erase_presentation_range(&track_id, start, effective_end);
        if removed.is_empty() {
            continue;
        }

        let first_removed = removed
            .iter()
            .map(|s| s.presentation_time())
            .min()
            .unwrap_or(start);
        if let Some(highest_end) = tracks.highest_presentation_end() {
            if first_removed < highest_end && highest_end <= effective_end {
                tracks.set_highest_presentation_end(Some(first_removed));
            }
        }

        if start <= current_time
            && current_time < effective_end
            && removed.iter().any(|s| s.presentation_time() <= current_time)
        {
            outcome.stalled = true;
        }

        outcome.samples_removed += removed.len();
        outcome.bytes_removed += removed.iter().map(|s| s.size()).sum::<usize>();
        tracing::debug!(
            "Removed {} frames from track {} in [{}, {})",
            removed.len(),
            track_id,
            start,
            effective_end
        );
    }

    outcome
}

//! Quota enforcement
//!
//! Before an append is accepted every track that would exceed its byte quota
//! gives up already played data first. If that is not enough, whole groups of
//! pictures are planned for removal in the configured order. Plans are only
//! carried out once every track's plan makes room, and the last remaining
//! group of a track is never evicted.

use crate::error::{SourceBufferError, SourceBufferResult};
use crate::track_buffer::TrackBufferMap;
use serde::{Deserialize, Serialize};
use sourcebuf_core::{MediaKind, MediaTime, TrackId};

/// Default audio track quota
pub const AUDIO_TRACK_QUOTA: usize = 2 * 1024 * 1024;
/// Default video track quota
pub const VIDEO_TRACK_QUOTA: usize = 25 * 1024 * 1024;
/// Default text track quota
pub const TEXT_TRACK_QUOTA: usize = 1024 * 1024;

/// Order in which groups of pictures are evicted once played data is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvictionOrder {
    /// Earliest group in decode order first
    #[default]
    OldestFirst,
    /// Latest group in decode order first
    FarthestFirst,
}

/// Per-kind byte quotas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Audio track quota in bytes
    pub audio_bytes: usize,
    /// Video track quota in bytes
    pub video_bytes: usize,
    /// Text track quota in bytes
    pub text_bytes: usize,
    /// Group eviction order
    pub eviction_order: EvictionOrder,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            audio_bytes: AUDIO_TRACK_QUOTA,
            video_bytes: VIDEO_TRACK_QUOTA,
            text_bytes: TEXT_TRACK_QUOTA,
            eviction_order: EvictionOrder::OldestFirst,
        }
    }
}

impl QuotaConfig {
    /// Quotas for memory constrained devices
    pub fn constrained() -> Self {
        Self {
            audio_bytes: 512 * 1024,
            video_bytes: 8 * 1024 * 1024,
            text_bytes: 256 * 1024,
            eviction_order: EvictionOrder::OldestFirst,
        }
    }

    /// No effective quota
    pub fn unlimited() -> Self {
        Self {
            audio_bytes: usize::MAX,
            video_bytes: usize::MAX,
            text_bytes: usize::MAX,
            eviction_order: EvictionOrder::OldestFirst,
        }
    }

    /// Quota applied to tracks of `kind`
    pub fn quota_for(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Audio => self.audio_bytes,
            MediaKind::Video => self.video_bytes,
            MediaKind::Text => self.text_bytes,
        }
    }
}

/// Summary of one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    /// Frames evicted across tracks
    pub samples_removed: usize,
    /// Payload bytes released
    pub bytes_freed: usize,
    /// Tracks that had to give up data
    pub tracks_evicted: Vec<TrackId>,
    /// Data at the playback position was evicted
    pub stalled: bool,
}

#[derive(Debug)]
struct Gop {
    decode_times: Vec<MediaTime>,
    bytes: usize,
    start: MediaTime,
    end: MediaTime,
}

/// Groups chosen for removal from one track
#[derive(Debug)]
struct EvictionPlan {
    track_id: TrackId,
    groups: Vec<Gop>,
}

/// Make room for `new_data_size` bytes on every track.
///
/// Fails with `QuotaExceeded` when a track cannot fit the new data without
/// evicting its last group of pictures, or when an empty track's quota is
/// smaller than the new data. Group removal is planned for every track
/// before anything unplayed is removed, so a failed call only releases
/// played data.
pub fn evict_coded_frames(
    tracks: &mut TrackBufferMap,
    new_data_size: usize,
    current_time: MediaTime,
    config: &QuotaConfig,
) -> SourceBufferResult<EvictionOutcome> {
    let mut outcome = EvictionOutcome::default();

    for track_id in tracks.track_ids() {
        let Some(buffer) = tracks.get(&track_id) else {
            continue;
        };
        if buffer.samples.is_empty() && !buffer.has_room_for(new_data_size) {
            return Err(quota_exceeded(track_id, new_data_size, buffer.quota_bytes()));
        }
    }

    let mut plans = Vec::new();
    for track_id in tracks.track_ids() {
        let Some(buffer) = tracks.get(&track_id) else {
            continue;
        };
        if buffer.has_room_for(new_data_size) {
            continue;
        }
        outcome.tracks_evicted.push(track_id.clone());

        evict_played(tracks, &track_id, current_time, &mut outcome);
        if let Some(plan) = plan_groups(tracks, &track_id, new_data_size, config)? {
            plans.push(plan);
        }
    }

    for plan in plans {
        for gop in &plan.groups {
            if gop.start <= current_time && current_time < gop.end {
                outcome.stalled = true;
            }
            let removed = tracks.erase_samples(&plan.track_id, &gop.decode_times);
            outcome.samples_removed += removed.len();
            outcome.bytes_freed += removed.iter().map(|s| s.size()).sum::<usize>();
        }

        if let Some(buffer) = tracks.get_mut(&plan.track_id) {
            let remaining_end = buffer.samples.last_presentation().map(|s| s.presentation_end());
            if let (Some(highest), Some(remaining)) = (buffer.highest_presentation_timestamp, remaining_end) {
                if remaining < highest {
                    buffer.highest_presentation_timestamp = Some(remaining);
                }
            }
        }
        tracing::info!("Evicted {} groups from track {}", plan.groups.len(), plan.track_id);
    }

    Ok(outcome)
}

/// Remove everything before the sync frame preceding the playback position
fn evict_played(
    tracks: &mut TrackBufferMap,
    track_id: &TrackId,
    current_time: MediaTime,
    outcome: &mut EvictionOutcome,
) {
    let played_end = tracks
        .get(track_id)
        .and_then(|buffer| buffer.samples.find_sync_before(current_time))
        .map(|s| s.presentation_time());
    let Some(played_end) = played_end else {
        return;
    };

    let removed = tracks.erase_presentation_range(track_id, MediaTime::ZERO, played_end);
    outcome.samples_removed += removed.len();
    outcome.bytes_freed += removed.iter().map(|s| s.size()).sum::<usize>();
    tracing::info!(
        "Evicted {} played frames before {} from track {}",
        removed.len(),
        played_end,
        track_id
    );
}

/// Groups to remove so `new_data_size` fits. `None` when it already fits.
fn plan_groups(
    tracks: &TrackBufferMap,
    track_id: &TrackId,
    new_data_size: usize,
    config: &QuotaConfig,
) -> SourceBufferResult<Option<EvictionPlan>> {
    let Some(buffer) = tracks.get(track_id) else {
        return Ok(None);
    };
    if buffer.has_room_for(new_data_size) {
        return Ok(None);
    }

    let size = buffer.total_size();
    let limit = buffer.quota_bytes();
    let mut gops = group_by_sync(tracks, track_id);
    if config.eviction_order == EvictionOrder::FarthestFirst {
        gops.reverse();
    }

    let evictable = gops.len().saturating_sub(1);
    let mut freed = 0usize;
    let mut planned = 0usize;
    for gop in gops.iter().take(evictable) {
        if (size - freed).saturating_add(new_data_size) <= limit {
            break;
        }
        freed += gop.bytes;
        planned += 1;
    }

    if (size - freed).saturating_add(new_data_size) > limit {
        tracing::warn!(
            "Track {} cannot fit {} bytes: {} buffered, quota {}",
            track_id,
            new_data_size,
            size,
            limit
        );
        return Err(quota_exceeded(
            track_id.clone(),
            size.saturating_add(new_data_size),
            limit,
        ));
    }

    gops.truncate(planned);
    Ok(Some(EvictionPlan {
        track_id: track_id.clone(),
        groups: gops,
    }))
}

fn quota_exceeded(track: TrackId, required: usize, limit: usize) -> SourceBufferError {
    SourceBufferError::QuotaExceeded {
        track,
        required,
        limit,
    }
}

fn group_by_sync(tracks: &TrackBufferMap, track_id: &TrackId) -> Vec<Gop> {
    let Some(buffer) = tracks.get(track_id) else {
        return Vec::new();
    };
    let mut gops: Vec<Gop> = Vec::new();
    for sample in buffer.samples.iter_decode() {
        let starts_group = sample.is_sync() || gops.is_empty();
        if starts_group {
            gops.push(Gop {
                decode_times: Vec::new(),
                bytes: 0,
                start: sample.presentation_time(),
                end: sample.presentation_end(),
            });
        }
        if let Some(gop) = gops.last_mut() {
            gop.decode_times.push(sample.decode_time());
            gop.bytes += sample.size();
            gop.start = gop.start.min(sample.presentation_time());
            gop.end = gop.end.max(sample.presentation_end());
        }
    }
    gops
}

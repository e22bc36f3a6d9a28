//! Track identifiers and immutable coded samples

use crate::time::MediaTime;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a track within one source buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(String);

impl TrackId {
    /// Create a track id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media type carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
    /// Timed text track
    Text,
}

impl MediaKind {
    /// Wire tag used by the framed record format
    pub fn as_u8(&self) -> u8 {
        match self {
            MediaKind::Audio => 0,
            MediaKind::Video => 1,
            MediaKind::Text => 2,
        }
    }

    /// Inverse of [`MediaKind::as_u8`]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MediaKind::Audio),
            1 => Some(MediaKind::Video),
            2 => Some(MediaKind::Text),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// One coded frame as delivered by a demuxer.
///
/// Samples are immutable once built. Cloning shares the payload, so handing
/// copies to the renderer or to removal results costs a reference count.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    track_id: TrackId,
    presentation_time: MediaTime,
    decode_time: MediaTime,
    duration: MediaTime,
    is_sync: bool,
    data: Bytes,
}

impl Sample {
    /// Build a sample
    pub fn new(
        track_id: impl Into<TrackId>,
        presentation_time: MediaTime,
        decode_time: MediaTime,
        duration: MediaTime,
        is_sync: bool,
        data: Bytes,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            presentation_time,
            decode_time,
            duration,
            is_sync,
            data,
        }
    }

    /// Track this sample belongs to
    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    /// Presentation timestamp
    pub fn presentation_time(&self) -> MediaTime {
        self.presentation_time
    }

    /// Decode timestamp
    pub fn decode_time(&self) -> MediaTime {
        self.decode_time
    }

    /// Frame duration
    pub fn duration(&self) -> MediaTime {
        self.duration
    }

    /// Presentation timestamp plus duration
    pub fn presentation_end(&self) -> MediaTime {
        self.presentation_time + self.duration
    }

    /// Whether this frame can be decoded without reference to earlier frames
    pub fn is_sync(&self) -> bool {
        self.is_sync
    }

    /// Coded payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Byte size counted against track quotas
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Copy of this sample with both timestamps shifted by `offset`
    pub fn with_offset(&self, offset: MediaTime) -> Self {
        if offset.is_zero() {
            return self.clone();
        }
        Self {
            presentation_time: self.presentation_time + offset,
            decode_time: self.decode_time + offset,
            ..self.clone()
        }
    }

    /// Copy of this sample attributed to another track
    pub fn with_track_id(&self, track_id: impl Into<TrackId>) -> Self {
        Self {
            track_id: track_id.into(),
            ..self.clone()
        }
    }

    /// Whether `time` falls inside `[presentation_time, presentation_end)`
    pub fn contains(&self, time: MediaTime) -> bool {
        self.presentation_time <= time && time < self.presentation_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pts_ms: i64, dts_ms: i64) -> Sample {
        Sample::new(
            "video",
            MediaTime::from_millis(pts_ms),
            MediaTime::from_millis(dts_ms),
            MediaTime::from_millis(40),
            false,
            Bytes::from_static(b"abcd"),
        )
    }

    #[test]
    fn test_sample_accessors() {
        let sample = frame(80, 40);
        assert_eq!(sample.track_id().as_str(), "video");
        assert_eq!(sample.presentation_end(), MediaTime::from_millis(120));
        assert_eq!(sample.size(), 4);
        assert!(sample.contains(MediaTime::from_millis(80)));
        assert!(!sample.contains(MediaTime::from_millis(120)));
    }

    #[test]
    fn test_offset_shifts_both_timestamps() {
        let shifted = frame(80, 40).with_offset(MediaTime::from_seconds(-1));
        assert_eq!(shifted.presentation_time(), MediaTime::from_millis(-920));
        assert_eq!(shifted.decode_time(), MediaTime::from_millis(-960));
        assert_eq!(shifted.duration(), MediaTime::from_millis(40));
        assert!(shifted.presentation_time().is_negative());
    }

    #[test]
    fn test_media_kind_tags() {
        for kind in [MediaKind::Audio, MediaKind::Video, MediaKind::Text] {
            assert_eq!(MediaKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(MediaKind::from_u8(9), None);
        assert_eq!(MediaKind::Video.to_string(), "video");
    }
}

//! Track descriptions and initialization segments

use serde::{Deserialize, Serialize};
use sourcebuf_core::{MediaKind, MediaTime, TrackId};

/// Description of one track announced by an initialization segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescription {
    /// Track ID
    pub id: TrackId,
    /// Media type of the track
    pub kind: MediaKind,
    /// Codec string, e.g. `avc1.64001f`
    pub codec: String,
}

impl TrackDescription {
    /// Create a track description
    pub fn new(id: impl Into<TrackId>, kind: MediaKind, codec: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            codec: codec.into(),
        }
    }
}

/// Stream-level metadata preceding media data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationSegment {
    /// Stream duration when the container declares one
    pub duration: Option<MediaTime>,
    /// Tracks carried by the stream
    pub tracks: Vec<TrackDescription>,
}

impl InitializationSegment {
    /// Create an initialization segment
    pub fn new(duration: Option<MediaTime>, tracks: Vec<TrackDescription>) -> Self {
        Self { duration, tracks }
    }

    /// Tracks of one media kind, in declaration order
    pub fn tracks_of(&self, kind: MediaKind) -> impl Iterator<Item = &TrackDescription> {
        self.tracks.iter().filter(move |track| track.kind == kind)
    }

    /// Number of tracks of one media kind
    pub fn count_of(&self, kind: MediaKind) -> usize {
        self.tracks_of(kind).count()
    }
}

//! Parent media source and playback clock seam
//!
//! A source buffer never owns the playback position or the stream duration.
//! It reads and updates both through [`MediaSourceClient`], implemented by
//! whatever owns the buffer. [`PlaybackState`] is a shareable in-memory
//! implementation for hosts without their own clock.

use crate::error::EndOfStreamError;
use parking_lot::RwLock;
use sourcebuf_core::MediaTime;

/// Stream duration as seen by the parent media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaDuration {
    /// No initialization segment has set a duration yet
    #[default]
    Unset,
    /// Finite duration
    Finite(MediaTime),
    /// Live or open-ended stream
    Unbounded,
}

impl MediaDuration {
    /// Finite duration, if any
    pub fn finite(&self) -> Option<MediaTime> {
        match self {
            MediaDuration::Finite(duration) => Some(*duration),
            _ => None,
        }
    }

    /// Whether `time` lies at or before the end of the stream
    pub fn admits(&self, time: MediaTime) -> bool {
        match self {
            MediaDuration::Unset => false,
            MediaDuration::Finite(duration) => time <= *duration,
            MediaDuration::Unbounded => true,
        }
    }
}

/// Media element readiness, ordered from least to most data available
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReadyState {
    /// Nothing known about the media
    #[default]
    HaveNothing,
    /// Duration and tracks known
    HaveMetadata,
    /// Data for the current position only
    HaveCurrentData,
    /// Data for the current position and a little beyond
    HaveFutureData,
    /// Enough data to play through without stalling
    HaveEnoughData,
}

/// Operations a source buffer performs on its parent
pub trait MediaSourceClient: Send + Sync {
    /// Current playback position
    fn current_time(&self) -> MediaTime;

    /// Stream duration
    fn duration(&self) -> MediaDuration;

    /// Update the stream duration
    fn set_duration(&self, duration: MediaDuration);

    /// Current ready state
    fn ready_state(&self) -> ReadyState;

    /// Update the ready state
    fn set_ready_state(&self, state: ReadyState);

    /// Signal that the stream ended because of an error
    fn end_of_stream(&self, error: EndOfStreamError);
}

#[derive(Debug, Default)]
struct PlaybackInner {
    current_time: MediaTime,
    duration: MediaDuration,
    ready_state: ReadyState,
    end_of_stream: Option<EndOfStreamError>,
}

/// In-memory [`MediaSourceClient`]
#[derive(Debug, Default)]
pub struct PlaybackState {
    inner: RwLock<PlaybackInner>,
}

impl PlaybackState {
    /// Create a playback state at time zero with an unset duration
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the playback position
    pub fn set_current_time(&self, time: MediaTime) {
        self.inner.write().current_time = time;
    }

    /// Last error reported through `end_of_stream`
    pub fn end_of_stream_error(&self) -> Option<EndOfStreamError> {
        self.inner.read().end_of_stream
    }
}

impl MediaSourceClient for PlaybackState {
    fn current_time(&self) -> MediaTime {
        self.inner.read().current_time
    }

    fn duration(&self) -> MediaDuration {
        self.inner.read().duration
    }

    fn set_duration(&self, duration: MediaDuration) {
        self.inner.write().duration = duration;
    }

    fn ready_state(&self) -> ReadyState {
        self.inner.read().ready_state
    }

    fn set_ready_state(&self, state: ReadyState) {
        self.inner.write().ready_state = state;
    }

    fn end_of_stream(&self, error: EndOfStreamError) {
        tracing::warn!("End of stream signalled: {:?}", error);
        self.inner.write().end_of_stream = Some(error);
    }
}

//! # sourcebuf media
//!
//! Buffer management for appended media streams. This crate holds the track
//! buffers, the coded frame processing algorithm, the removal and eviction
//! engines and the [`SourceBuffer`] state machine that drives them, together
//! with the seams to the demuxer, the parent media source and the renderer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod demux;
pub mod error;
pub mod events;
pub mod eviction;
pub mod framing;
pub mod monitor;
pub mod processing;
pub mod removal;
pub mod render;
pub mod source_buffer;
pub mod track_buffer;
pub mod tracks;

// Re-export main types
pub use client::{MediaDuration, MediaSourceClient, PlaybackState, ReadyState};
pub use demux::{DemuxError, DemuxedItem, Demuxer};
pub use error::{EndOfStreamError, ErrorCategory, SourceBufferError, SourceBufferResult};
pub use events::SourceBufferEvent;
pub use eviction::{
    evict_coded_frames, EvictionOrder, EvictionOutcome, QuotaConfig, AUDIO_TRACK_QUOTA,
    TEXT_TRACK_QUOTA, VIDEO_TRACK_QUOTA,
};
pub use framing::{FrameWriter, FramedDemuxer};
pub use monitor::BufferingRateMonitor;
pub use processing::{
    AppendContext, AppendWindow, CodedFrameProcessor, DropReason, FrameOutcome, ProcessingConfig,
    ProcessingStats,
};
pub use removal::{remove_coded_frames, RemovalConfig, RemovalOutcome, SparseSyncPolicy};
pub use render::{QueueSink, SampleSink};
pub use source_buffer::{SourceBuffer, SourceBufferConfig, SourceBufferState, UpdateKind};
pub use track_buffer::{TrackBuffer, TrackBufferMap};
pub use tracks::{InitializationSegment, TrackDescription};

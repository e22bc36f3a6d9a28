//! # sourcebuf - Media Source buffer management
//!
//! sourcebuf accepts appended, possibly out-of-order media samples, keeps
//! them indexed by decode and presentation time per track, and answers which
//! presentation ranges are playable. It enforces per-track memory quotas by
//! evicting whole groups of pictures and supports explicit removal and
//! cancellation of in-progress appends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sourcebuf::{FrameWriter, InitializationSegment, MediaKind, MediaTime, Sample, SourceBufferEngine, TrackDescription};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SourceBufferEngine::init()?;
//!     let mut events = engine.events().expect("event stream");
//!     let buffer = engine.add_framed_source_buffer()?;
//!
//!     let mut writer = FrameWriter::new();
//!     writer.write_init_segment(&InitializationSegment::new(
//!         Some(MediaTime::from_seconds(10)),
//!         vec![TrackDescription::new("video", MediaKind::Video, "avc1.64001f")],
//!     ))?;
//!     writer.write_sample(&Sample::new(
//!         "video",
//!         MediaTime::ZERO,
//!         MediaTime::ZERO,
//!         MediaTime::new(1, 30),
//!         true,
//!         vec![0u8; 1024].into(),
//!     ))?;
//!
//!     buffer.append_buffer(writer.finish())?.await?;
//!     let cycle = events.next_cycle(buffer.id()).await;
//!     println!("{:?} buffered {}", cycle, buffer.buffered()?);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use sourcebuf_core::{
    CoreError, CoreResult, MediaKind, MediaTime, Sample, SampleMap, TimeRange, TimeRanges, TrackId,
};

pub use sourcebuf_media::{
    AppendWindow, DemuxError, DemuxedItem, Demuxer, EndOfStreamError, EvictionOrder, FrameWriter,
    FramedDemuxer, InitializationSegment, MediaDuration, MediaSourceClient, PlaybackState,
    ProcessingConfig, QueueSink, QuotaConfig, ReadyState, RemovalConfig, SampleSink, SourceBuffer,
    SourceBufferConfig, SourceBufferError, SourceBufferEvent, SourceBufferResult,
    SourceBufferState, SparseSyncPolicy, TrackDescription, UpdateKind,
};

#[cfg(feature = "diagnostics")]
pub use sourcebuf_diagnostics::{BufferAnalyzer, BufferReport, DebugLogger};

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod handle;

// Re-export main API types
pub use config::SessionConfig;
pub use error::{EngineError, EngineResult};
pub use event::{BufferEvent, EventStream};
pub use handle::SourceBufferHandle;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Parent of a set of source buffers sharing one playback clock
#[derive(Clone)]
pub struct SourceBufferEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SessionConfig,
    client: Arc<dyn MediaSourceClient>,
    buffers: DashMap<Uuid, SourceBufferHandle>,
    events_tx: mpsc::UnboundedSender<BufferEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<BufferEvent>>>,
}

impl std::fmt::Debug for SourceBufferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceBufferEngine")
            .field("config", &self.inner.config)
            .field("buffers", &self.inner.buffers.len())
            .finish_non_exhaustive()
    }
}

impl SourceBufferEngine {
    /// Initialize an engine with default settings and an in-memory
    /// playback clock
    ///
    /// # Example
    /// ```rust,no_run
    /// use sourcebuf::SourceBufferEngine;
    ///
    /// let engine = SourceBufferEngine::init()?;
    /// # Ok::<(), sourcebuf::EngineError>(())
    /// ```
    pub fn init() -> EngineResult<Self> {
        Self::init_with(SessionConfig::default(), Arc::new(PlaybackState::new()))
    }

    /// Initialize with custom configuration and playback client
    pub fn init_with(config: SessionConfig, client: Arc<dyn MediaSourceClient>) -> EngineResult<Self> {
        if config.debug_logging {
            enable_debug_logging();
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tracing::info!(
            "Source buffer engine ready, up to {} buffers",
            config.max_source_buffers
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                client,
                buffers: DashMap::new(),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Playback clock and parent state shared by every buffer
    pub fn client(&self) -> Arc<dyn MediaSourceClient> {
        self.inner.client.clone()
    }

    /// Take the event stream. Only the first call returns a stream.
    pub fn events(&self) -> Option<EventStream> {
        self.inner.events_rx.lock().take().map(EventStream::new)
    }

    /// Attach a new source buffer parsing its input with `demuxer`
    pub fn add_source_buffer(&self, demuxer: Box<dyn Demuxer>) -> EngineResult<SourceBufferHandle> {
        let limit = self.inner.config.max_source_buffers;
        if self.inner.buffers.len() >= limit {
            return Err(EngineError::TooManySourceBuffers { limit });
        }

        let buffer = SourceBuffer::with_config(
            self.inner.config.buffer.clone(),
            self.inner.client.clone(),
            demuxer,
        );
        let handle = SourceBufferHandle::new(buffer, self.inner.events_tx.clone());
        self.inner.buffers.insert(handle.id(), handle.clone());
        tracing::debug!("Attached source buffer {}", handle.id());
        Ok(handle)
    }

    /// Attach a new source buffer reading the framed record format
    pub fn add_framed_source_buffer(&self) -> EngineResult<SourceBufferHandle> {
        self.add_source_buffer(Box::new(FramedDemuxer::new()))
    }

    /// Detach a source buffer. Outstanding handles fail every later
    /// operation with `InvalidState`.
    pub fn remove_source_buffer(&self, id: Uuid) -> EngineResult<()> {
        let (_, handle) = self
            .inner
            .buffers
            .remove(&id)
            .ok_or(EngineError::UnknownSourceBuffer { id })?;
        handle.removed_from_parent();
        tracing::debug!("Detached source buffer {}", id);
        Ok(())
    }

    /// Handle of an attached source buffer
    pub fn source_buffer(&self, id: Uuid) -> Option<SourceBufferHandle> {
        self.inner.buffers.get(&id).map(|entry| entry.value().clone())
    }

    /// Ids of the attached source buffers
    pub fn source_buffer_ids(&self) -> Vec<Uuid> {
        self.inner.buffers.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of attached source buffers
    pub fn len(&self) -> usize {
        self.inner.buffers.len()
    }

    /// Whether no source buffer is attached
    pub fn is_empty(&self) -> bool {
        self.inner.buffers.is_empty()
    }

    /// Ranges buffered by every attached source buffer
    pub fn buffered(&self) -> TimeRanges {
        let mut combined: Option<TimeRanges> = None;
        for entry in self.inner.buffers.iter() {
            let Ok(ranges) = entry.value().buffered() else {
                continue;
            };
            match combined.as_mut() {
                Some(existing) => existing.intersect_with(&ranges),
                None => combined = Some(ranges),
            }
        }
        combined.unwrap_or_default()
    }
}

#[cfg(feature = "diagnostics")]
fn enable_debug_logging() {
    if let Err(e) = DebugLogger::init_logging("debug") {
        tracing::debug!("Debug logging not enabled: {}", e);
    }
}

#[cfg(not(feature = "diagnostics"))]
fn enable_debug_logging() {
    tracing::debug!("Debug logging requires the diagnostics feature");
}

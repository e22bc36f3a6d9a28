//! Shared, async-driven access to one source buffer
//!
//! Starting an operation and completing it are separate steps on
//! [`SourceBuffer`]. The handle starts operations on the caller's task and
//! completes them on a spawned tokio task, both under the same lock, so
//! queries in between see a consistent snapshot and an `abort` can still
//! cancel the pending work. Each task only completes the operation it was
//! spawned for.

use crate::error::{EngineError, EngineResult};
use crate::event::BufferEvent;
use bytes::Bytes;
use parking_lot::Mutex;
use sourcebuf_core::{MediaTime, TimeRanges};
use sourcebuf_media::{SourceBuffer, SourceBufferError, SourceBufferResult, SourceBufferState};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Cloneable handle to a source buffer attached to an engine
#[derive(Debug, Clone)]
pub struct SourceBufferHandle {
    id: Uuid,
    buffer: Arc<Mutex<SourceBuffer>>,
    events_tx: mpsc::UnboundedSender<BufferEvent>,
}

impl SourceBufferHandle {
    pub(crate) fn new(buffer: SourceBuffer, events_tx: mpsc::UnboundedSender<BufferEvent>) -> Self {
        Self {
            id: buffer.id(),
            buffer: Arc::new(Mutex::new(buffer)),
            events_tx,
        }
    }

    /// Source buffer id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Start an append and complete it in the background. The returned
    /// task finishes once the update cycle has ended.
    pub fn append_buffer(&self, data: impl Into<Bytes>) -> EngineResult<JoinHandle<()>> {
        let runtime = current_runtime()?;
        let operation = self.with_buffer(|buffer| {
            buffer.append_buffer(data)?;
            Ok::<_, SourceBufferError>(buffer.current_operation())
        })?;
        Ok(self.spawn_completion(&runtime, operation))
    }

    /// Start a removal and complete it in the background
    pub fn remove(&self, start: MediaTime, end: MediaTime) -> EngineResult<JoinHandle<()>> {
        let runtime = current_runtime()?;
        let operation = self.with_buffer(|buffer| {
            buffer.remove(start, end)?;
            Ok::<_, SourceBufferError>(buffer.current_operation())
        })?;
        Ok(self.spawn_completion(&runtime, operation))
    }

    /// Cancel the operation in progress
    pub fn abort(&self) -> SourceBufferResult<()> {
        self.with_buffer(SourceBuffer::abort)
    }

    /// Change the timestamp offset
    pub fn set_timestamp_offset(&self, offset: MediaTime) -> SourceBufferResult<()> {
        self.with_buffer(|buffer| buffer.set_timestamp_offset(offset))
    }

    /// Change the append window
    pub fn set_append_window(&self, start: MediaTime, end: MediaTime) -> SourceBufferResult<()> {
        self.with_buffer(|buffer| buffer.set_append_window(start, end))
    }

    /// Snapshot of the buffered presentation ranges
    pub fn buffered(&self) -> SourceBufferResult<TimeRanges> {
        self.buffer.lock().buffered()
    }

    /// Current state
    pub fn state(&self) -> SourceBufferState {
        self.buffer.lock().state()
    }

    /// Whether an append or remove is in progress
    pub fn is_updating(&self) -> bool {
        self.buffer.lock().is_updating()
    }

    /// Run `f` with exclusive access to the buffer, then publish the events
    /// it produced
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut SourceBuffer) -> R) -> R {
        let mut buffer = self.buffer.lock();
        let result = f(&mut *buffer);
        self.publish(&mut *buffer);
        result
    }

    pub(crate) fn removed_from_parent(&self) {
        self.with_buffer(SourceBuffer::removed_from_parent);
    }

    // Private helper methods

    fn spawn_completion(&self, runtime: &Handle, operation: Option<u64>) -> JoinHandle<()> {
        let handle = self.clone();
        runtime.spawn(async move {
            let Some(operation) = operation else {
                return;
            };
            if !handle.with_buffer(|buffer| buffer.complete_operation(operation)) {
                tracing::debug!("Buffer {} operation {} was cancelled", handle.id, operation);
            }
        })
    }

    fn publish(&self, buffer: &mut SourceBuffer) {
        for event in buffer.drain_events() {
            tracing::debug!("Buffer {} event {}", self.id, event.event_type());
            let tagged = BufferEvent {
                buffer_id: self.id,
                event,
            };
            // Events are dropped once the stream is closed
            let _ = self.events_tx.send(tagged);
        }
    }
}

fn current_runtime() -> EngineResult<Handle> {
    Handle::try_current().map_err(|e| EngineError::NoRuntime {
        reason: e.to_string(),
    })
}

//! Event delivery for source buffer lifecycle notifications

use futures::Stream;
use sourcebuf_media::SourceBufferEvent;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Lifecycle event tagged with the buffer that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct BufferEvent {
    /// Source buffer id
    pub buffer_id: Uuid,
    /// The event
    pub event: SourceBufferEvent,
}

impl BufferEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

/// Stream of buffer events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<BufferEvent>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<BufferEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<BufferEvent> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<BufferEvent>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Wait for events until the next `UpdateEnd` of `buffer_id`, returning
    /// the whole cycle. Events of other buffers are discarded.
    pub async fn next_cycle(&mut self, buffer_id: Uuid) -> Option<Vec<SourceBufferEvent>> {
        let mut cycle = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            if event.buffer_id != buffer_id {
                continue;
            }
            let done = event.event.is_cycle_end();
            cycle.push(event.event);
            if done {
                return Some(cycle);
            }
        }
        None
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Check if the event stream is closed
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

impl Stream for EventStream {
    type Item = BufferEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn tagged(buffer_id: Uuid, event: SourceBufferEvent) -> BufferEvent {
        BufferEvent { buffer_id, event }
    }

    #[tokio::test]
    async fn test_event_stream_basic() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = EventStream::new(rx);
        let id = Uuid::new_v4();

        tx.send(tagged(id, SourceBufferEvent::UpdateStart)).unwrap();
        let received = stream.next().await.unwrap();
        assert_eq!(received.event_type(), "updatestart");
        assert!(stream.try_next().unwrap().is_none());

        drop(tx);
        assert!(stream.try_next().is_err());
    }

    #[tokio::test]
    async fn test_next_cycle_filters_by_buffer() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = EventStream::new(rx);
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();

        for (id, event) in [
            (other, SourceBufferEvent::UpdateStart),
            (mine, SourceBufferEvent::UpdateStart),
            (other, SourceBufferEvent::UpdateEnd),
            (mine, SourceBufferEvent::Update),
            (mine, SourceBufferEvent::UpdateEnd),
        ] {
            tx.send(tagged(id, event)).unwrap();
        }

        let cycle = stream.next_cycle(mine).await.unwrap();
        assert_eq!(
            cycle,
            vec![
                SourceBufferEvent::UpdateStart,
                SourceBufferEvent::Update,
                SourceBufferEvent::UpdateEnd
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_impl() {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = EventStream::new(rx);
        let id = Uuid::new_v4();
        tx.send(tagged(id, SourceBufferEvent::Abort)).unwrap();
        tx.send(tagged(id, SourceBufferEvent::UpdateEnd)).unwrap();
        drop(tx);

        let types: Vec<_> = stream.map(|e| e.event_type()).collect().await;
        assert_eq!(types, vec!["abort", "updateend"]);
    }
}

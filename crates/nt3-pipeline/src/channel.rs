//! Single-producer/single-consumer event queues.
//!
//! Two unbounded queues connect the pipeline to application code:
//! - events (outbound): decode loop → application
//! - requests (inbound): application → encode loop
//!
//! Neither [`EventSender`] nor [`EventReceiver`] is `Clone`, and both `send`
//! and `recv` take `&mut self`, so each queue has exactly one producer and one
//! consumer for its whole lifetime, even when a half is shared behind an `Arc`.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use nt3_frame::{ReadEvent, WriteEvent};
use tokio::sync::mpsc;
use tracing::trace;

pub use tokio::sync::mpsc::error::TryRecvError;

/// The item could not be enqueued because the queue is closed.
#[derive(thiserror::Error)]
pub enum ChannelError<T> {
    #[error("queue closed")]
    Closed(T),
}

impl<T> ChannelError<T> {
    /// Recover the item that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            ChannelError::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for ChannelError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Closed(..)")
    }
}

/// Producing half of a queue. Sending never waits on capacity.
///
/// Sending needs exclusive access, so a shared sender cannot produce:
///
/// ```compile_fail
/// use std::sync::Arc;
///
/// use nt3_frame::WriteEvent;
/// use nt3_pipeline::event_channel;
///
/// let (app, _pipeline) = event_channel();
/// let shared = Arc::new(app.requests);
/// let _ = shared.send(WriteEvent::ClientHelloComplete);
/// ```
pub struct EventSender<T> {
    inner: Option<mpsc::UnboundedSender<T>>,
}

impl<T> EventSender<T> {
    /// Enqueue an item.
    pub fn send(&mut self, item: T) -> Result<(), ChannelError<T>> {
        match &self.inner {
            Some(tx) => tx.send(item).map_err(|err| ChannelError::Closed(err.0)),
            None => Err(ChannelError::Closed(item)),
        }
    }

    /// Complete the queue. The consumer drains what is buffered, then sees the end.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            trace!("queue completed by producer");
        }
    }

    /// True once this side closed or the consumer went away.
    pub fn is_closed(&self) -> bool {
        self.inner.as_ref().is_none_or(|tx| tx.is_closed())
    }
}

impl<T> fmt::Debug for EventSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consuming half of a queue.
pub struct EventReceiver<T> {
    inner: mpsc::UnboundedReceiver<T>,
}

impl<T> EventReceiver<T> {
    /// Next item, or `None` once the queue is completed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.recv().await
    }

    /// Next item if one is buffered.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.inner.try_recv()
    }

    /// Refuse further items. Buffered items can still be drained.
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> Stream for EventReceiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().inner.poll_recv(cx)
    }
}

impl<T> fmt::Debug for EventReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReceiver")
            .field("buffered", &self.inner.len())
            .finish()
    }
}

fn queue<T>() -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { inner: Some(tx) }, EventReceiver { inner: rx })
}

/// The application's view of the queues.
#[derive(Debug)]
pub struct ApplicationEnd {
    /// Decoded server events.
    pub events: EventReceiver<ReadEvent>,
    /// Requests for the encode loop.
    pub requests: EventSender<WriteEvent>,
}

/// The pipeline's view of the queues.
#[derive(Debug)]
pub struct PipelineEnd {
    /// Written by the decode loop.
    pub events: EventSender<ReadEvent>,
    /// Read by the encode loop.
    pub requests: EventReceiver<WriteEvent>,
}

/// Create the pair of queues connecting application code and the pipeline.
pub fn event_channel() -> (ApplicationEnd, PipelineEnd) {
    let (event_tx, event_rx) = queue();
    let (request_tx, request_rx) = queue();
    (
        ApplicationEnd {
            events: event_rx,
            requests: request_tx,
        },
        PipelineEnd {
            events: event_tx,
            requests: request_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn items_arrive_in_order() {
        let (mut app, mut pipeline) = event_channel();
        pipeline.events.send(ReadEvent::KeepAlive).unwrap();
        pipeline.events.send(ReadEvent::ServerHelloComplete).unwrap();

        assert_eq!(app.events.len(), 2);
        assert_eq!(app.events.recv().await, Some(ReadEvent::KeepAlive));
        assert_eq!(app.events.recv().await, Some(ReadEvent::ServerHelloComplete));
    }

    #[tokio::test]
    async fn send_after_close_fails_and_returns_item() {
        let (mut app, mut pipeline) = event_channel();
        app.requests
            .send(WriteEvent::client_hello("").unwrap())
            .unwrap();
        app.requests.close();
        assert!(app.requests.is_closed());

        let err = app
            .requests
            .send(WriteEvent::ClientHelloComplete)
            .unwrap_err();
        assert_eq!(err.into_inner(), WriteEvent::ClientHelloComplete);

        assert!(matches!(
            pipeline.requests.recv().await,
            Some(WriteEvent::ClientHello { .. })
        ));
        assert_eq!(pipeline.requests.recv().await, None);
    }

    #[tokio::test]
    async fn closed_queue_drains_then_completes() {
        let (mut app, mut pipeline) = event_channel();
        pipeline.events.send(ReadEvent::KeepAlive).unwrap();
        pipeline.events.close();

        assert_eq!(app.events.recv().await, Some(ReadEvent::KeepAlive));
        assert_eq!(app.events.recv().await, None);
        assert_eq!(app.events.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_consumer_closes_queue() {
        let (app, mut pipeline) = event_channel();
        drop(app);
        assert!(pipeline.events.is_closed());
        assert!(pipeline.events.send(ReadEvent::KeepAlive).is_err());
    }

    #[tokio::test]
    async fn consumer_close_rejects_new_items() {
        let (mut app, mut pipeline) = event_channel();
        pipeline.events.send(ReadEvent::KeepAlive).unwrap();
        app.events.close();

        assert!(pipeline.events.send(ReadEvent::ClearAllEntries).is_err());
        assert_eq!(app.events.recv().await, Some(ReadEvent::KeepAlive));
        assert_eq!(app.events.recv().await, None);
    }

    #[tokio::test]
    async fn receiver_is_a_stream() {
        let (app, mut pipeline) = event_channel();
        pipeline.events.send(ReadEvent::KeepAlive).unwrap();
        pipeline.events.send(ReadEvent::ClearAllEntries).unwrap();
        pipeline.events.close();

        let collected: Vec<ReadEvent> = app.events.collect().await;
        assert_eq!(collected, vec![ReadEvent::KeepAlive, ReadEvent::ClearAllEntries]);
    }

    #[tokio::test]
    async fn producer_moves_into_its_task() {
        let (mut app, pipeline) = event_channel();
        let PipelineEnd {
            events: mut producer,
            requests: _requests,
        } = pipeline;

        let task = tokio::spawn(async move {
            for _ in 0..3 {
                producer.send(ReadEvent::KeepAlive).unwrap();
            }
            producer.close();
        });
        task.await.unwrap();

        let collected: Vec<ReadEvent> = (&mut app.events).collect().await;
        assert_eq!(collected.len(), 3);
    }

    #[test]
    fn try_recv_reports_empty_and_disconnected() {
        let (mut app, mut pipeline) = event_channel();
        assert!(matches!(app.events.try_recv(), Err(TryRecvError::Empty)));
        pipeline.events.close();
        assert!(matches!(
            app.events.try_recv(),
            Err(TryRecvError::Disconnected)
        ));
    }
}

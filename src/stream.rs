//! Bridge between a background pipeline task and an open SSE response.
//!
//! The producer writes [`StreamEvent`]s through an [`EventSink`]; the HTTP
//! side drains the paired receiver with [`relay`]. Both ends share one
//! cancellation token per request: the relay cancels it when the client goes
//! away, and every send races against it, so an abandoned producer never
//! blocks on a full channel.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::data_models::StreamEvent;
use crate::error::StreamClosed;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Write half handed to the pipeline.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Allocates the per-request channel.
    pub fn channel(
        capacity: usize,
        cancel: CancellationToken,
    ) -> (EventSink, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (EventSink { tx, cancel }, rx)
    }

    /// Enqueues `event`, giving up as soon as the request is cancelled or the
    /// receiver is gone.
    pub async fn send(&self, event: StreamEvent) -> Result<(), StreamClosed> {
        if self.cancel.is_cancelled() {
            return Err(StreamClosed);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StreamClosed),
            sent = self.tx.send(event) => sent.map_err(|_| StreamClosed),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

fn encode<T: Serialize>(event: &T) -> Result<Event, axum::Error> {
    Event::default().json_data(event)
}

/// Drains `rx` into SSE frames until the channel closes or `cancel` fires.
///
/// Dropping the returned stream (hyper does this when the client
/// disconnects) cancels `cancel`.
pub fn relay<T>(
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static
where
    T: Serialize + Send + 'static,
{
    let guard = cancel.clone().drop_guard();
    futures::stream::unfold((rx, cancel, guard), |(mut rx, cancel, guard)| async move {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = rx.recv() => event,
            };
            let event = next?;
            match encode(&event) {
                Ok(frame) => return Some((Ok(frame), (rx, cancel, guard))),
                Err(e) => tracing::warn!(error = %e, "dropping event that failed to serialize"),
            }
        }
    })
}

/// Wraps [`relay`] as an axum SSE response with periodic keep-alives.
pub fn sse_response(
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    Sse::new(relay(rx, cancel)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

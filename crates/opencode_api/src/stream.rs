//! Long-lived event-stream subscription.
//!
//! A subscription owns one reader task holding the streaming connection. Items are
//! delivered over a channel; the subscription never touches application state.
//! Reconnecting after a failure is left to whoever owns the subscription.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

use crate::client::CancellationSignal;
use crate::error::ApiError;
use crate::events::{ServerEvent, StreamMessage, SubscriptionState};
use crate::sse::SseStreamParser;
use crate::transport::Transport;

pub const EVENT_STREAM_PATH: &str = "/global/event";

/// Cloneable control side of a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: CancellationSignal,
    abort: AbortHandle,
    state: Arc<watch::Sender<SubscriptionState>>,
}

impl SubscriptionHandle {
    /// Drop the live connection immediately. Idempotent.
    pub fn cancel(&self) {
        if self.cancel.swap(true, Ordering::AcqRel) {
            return;
        }
        self.abort.abort();
        self.state.send_replace(SubscriptionState::Disconnected);
        tracing::info!("event stream disconnected");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }
}

/// Receiving side of one event-stream connection. Dropping it cancels the stream.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<StreamMessage>,
    handle: SubscriptionHandle,
}

impl EventSubscription {
    /// Spawn the reader task on the current tokio runtime.
    pub(crate) fn spawn(transport: Transport) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SubscriptionState::Connecting);
        let state = Arc::new(state);
        let cancel = CancellationSignal::default();

        let task = tokio::spawn(read_stream(
            transport,
            sender,
            Arc::clone(&state),
            Arc::clone(&cancel),
        ));

        Self {
            receiver,
            handle: SubscriptionHandle {
                cancel,
                abort: task.abort_handle(),
                state,
            },
        }
    }

    /// Next item, or `None` once the stream has ended or been cancelled.
    ///
    /// Items still buffered when the subscription is cancelled are discarded.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        if self.handle.is_cancelled() {
            return None;
        }
        let message = self.receiver.recv().await?;
        if self.handle.is_cancelled() {
            return None;
        }
        Some(message)
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SubscriptionState {
        self.handle.state()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Drive the subscription to completion, forwarding events and the terminal
    /// failure to the supplied callbacks. Returns when the stream ends or is
    /// cancelled; a cancelled stream never reports an error.
    pub async fn run_with_handlers<E, F>(mut self, mut on_event: E, on_error: F)
    where
        E: FnMut(ServerEvent),
        F: FnOnce(ApiError),
    {
        while let Some(message) = self.next().await {
            match message {
                StreamMessage::Event(event) => on_event(event),
                StreamMessage::Failed(error) => {
                    if !self.handle.is_cancelled() {
                        on_error(error);
                    }
                    return;
                }
            }
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

async fn read_stream(
    transport: Transport,
    sender: mpsc::UnboundedSender<StreamMessage>,
    state: Arc<watch::Sender<SubscriptionState>>,
    cancel: CancellationSignal,
) {
    let fail = |error: ApiError| {
        if cancel.load(Ordering::Acquire) {
            return;
        }
        if !advance_state(&state, SubscriptionState::Failed) {
            return;
        }
        tracing::error!(%error, "event stream failed");
        let _ = sender.send(StreamMessage::Failed(error));
    };

    let response = match transport.open_stream(EVENT_STREAM_PATH).await {
        Ok(response) => response,
        Err(error) => {
            fail(error);
            return;
        }
    };
    if cancel.load(Ordering::Acquire) || !advance_state(&state, SubscriptionState::Open) {
        return;
    }
    tracing::info!(base_url = transport.base_url(), "event stream open");
    if sender
        .send(StreamMessage::Event(ServerEvent::connected()))
        .is_err()
    {
        return;
    }

    let mut bytes = response.bytes_stream();
    let mut parser = SseStreamParser::default();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                fail(ApiError::from(error));
                return;
            }
        };

        for event in parser.feed(&chunk) {
            tracing::debug!(event_type = %event.event_type, "event stream frame");
            if sender.send(StreamMessage::Event(event)).is_err() {
                return;
            }
        }
    }

    if !parser.is_empty_buffer() {
        tracing::warn!("event stream closed inside a frame; partial frame dropped");
    }
    fail(ApiError::StreamClosed);
}

/// Move to `next` unless the subscription was already cancelled. A cancel racing
/// with the reader always leaves the state at `Disconnected`.
fn advance_state(state: &watch::Sender<SubscriptionState>, next: SubscriptionState) -> bool {
    state.send_if_modified(|current| {
        if *current == SubscriptionState::Disconnected {
            return false;
        }
        *current = next;
        true
    })
}

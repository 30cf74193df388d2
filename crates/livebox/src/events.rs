//! Event listener: a background poll loop feeding an [`EventStream`].
//!
//! The router pushes events through long polls on a *channel*. Polling
//! with channel id 0 opens a new channel; every answer carries the id to
//! use next. Each listener runs this loop in its own Tokio task:
//!
//! ```text
//! ┌─▶ poll(channel_id) ──ok──▶ adopt id, emit each event ──┐
//! │        │                                               │
//! │        ├─ channel stale ──▶ id = 0 (silent) ───────────┤
//! │        │                                               │
//! │        └─ other error ──▶ emit error, id = 0, sleep ───┤
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop never gives up on its own. It ends when the caller's
//! cancellation token fires or the [`EventStream`] is dropped.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use livebox_protocol::{ContentType, Event, EventPoll, EventsResponse};
use livebox_session::Authenticator;
use livebox_transport::HttpTransport;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::keepalive::KeepAlive;
use crate::{Dispatcher, LiveboxError};

/// An item produced by an event listener.
pub type EventItem = Result<Event, LiveboxError>;

// ---------------------------------------------------------------------------
// EventStream
// ---------------------------------------------------------------------------

/// Events (and visible poll errors) from one listener, in order.
///
/// Ends (yields `None`) once the listener has stopped. Dropping the stream
/// stops the listener.
pub struct EventStream {
    receiver: mpsc::Receiver<EventItem>,
    _stop_on_drop: DropGuard,
}

impl EventStream {
    /// Waits for the next item. `None` once the listener has stopped.
    pub async fn recv(&mut self) -> Option<EventItem> {
        self.receiver.recv().await
    }
}

impl Stream for EventStream {
    type Item = EventItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventListener
// ---------------------------------------------------------------------------

/// Settings for one listener.
#[derive(Debug, Clone)]
pub(crate) struct ListenerOptions {
    pub(crate) retry_delay: Duration,
    pub(crate) buffer: usize,
}

/// Starts a listener for `names` and returns its stream.
///
/// Registers with the keepalive before the task is spawned, so the
/// keepalive is running by the time this returns.
pub(crate) async fn spawn_listener<T, A>(
    dispatcher: Arc<Dispatcher<T, A>>,
    keepalive: Arc<KeepAlive>,
    cancel: CancellationToken,
    names: Vec<String>,
    options: ListenerOptions,
) -> EventStream
where
    T: HttpTransport,
    A: Authenticator,
{
    // A child token: cancelling it (stream dropped) leaves the caller's
    // token alone.
    let cancel = cancel.child_token();
    let (sender, receiver) = mpsc::channel(options.buffer);

    keepalive.acquire(&dispatcher).await;

    let listener = EventListener {
        dispatcher,
        names,
        sender,
        cancel: cancel.clone(),
        retry_delay: options.retry_delay,
    };
    tokio::spawn(async move {
        listener.run().await;
        keepalive.release().await;
        // The sender goes last: a closed stream means the keepalive has
        // been released.
        drop(listener);
    });

    EventStream {
        receiver,
        _stop_on_drop: cancel.drop_guard(),
    }
}

struct EventListener<T, A> {
    dispatcher: Arc<Dispatcher<T, A>>,
    names: Vec<String>,
    sender: mpsc::Sender<EventItem>,
    cancel: CancellationToken,
    retry_delay: Duration,
}

impl<T: HttpTransport, A: Authenticator> EventListener<T, A> {
    async fn run(&self) {
        tracing::debug!(events = ?self.names, "event listener started");
        let mut channel_id = 0;

        'poll: loop {
            let poll = EventPoll {
                channel_id,
                events: self.names.clone(),
            };

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break 'poll,
                result = self
                    .dispatcher
                    .call::<_, EventsResponse>(ContentType::Event, &poll) => result,
            };

            match result {
                Ok(response) => {
                    tracing::trace!(
                        channel_id = response.channel_id,
                        events = response.len(),
                        "event poll answered"
                    );
                    channel_id = response.channel_id;
                    for event in response.into_events() {
                        if !self.emit(Ok(event)).await {
                            break 'poll;
                        }
                    }
                }
                Err(err) if err.is_channel_stale() => {
                    tracing::debug!(channel_id, "event channel went stale, resubscribing");
                    channel_id = 0;
                }
                Err(err) => {
                    tracing::warn!(channel_id, error = %err, "event poll failed");
                    if !self.emit(Err(err)).await {
                        break 'poll;
                    }
                    channel_id = 0;

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break 'poll,
                        () = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        tracing::debug!(events = ?self.names, "event listener stopped");
    }

    /// Hands one item to the consumer. `false` once the listener must stop.
    async fn emit(&self, item: EventItem) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.sender.send(item) => sent.is_ok(),
        }
    }
}

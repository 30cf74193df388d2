//! Session keepalive while events are being watched.
//!
//! An event poll can sit idle for a long time, and the router drops
//! sessions that see no regular calls. While at least one event listener
//! is running, a background task sends a harmless call every
//! `keepalive_interval`. If the session expired in the meantime, the
//! dispatcher renews it as part of that call.
//!
//! # Reference counting
//!
//! ```text
//! listeners: 0 ──acquire──▶ 1 ──acquire──▶ 2 ──release──▶ 1 ──release──▶ 0
//!                  │                                               │
//!             spawn task                                 stop + wait for task
//! ```
//!
//! The count and the task handle live behind one mutex, so starting and
//! stopping never interleave. [`KeepAlive::release`] returns only after the
//! task has exited.

use std::sync::Arc;
use std::time::Duration;

use livebox_protocol::{ContentType, Request};
use livebox_session::Authenticator;
use livebox_transport::HttpTransport;
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::Dispatcher;

/// Service and method of the call used to exercise the session.
const KEEPALIVE_SERVICE: &str = "IoTService";
const KEEPALIVE_METHOD: &str = "getStatus";

/// A running keepalive task and the means to stop it.
struct KeepAliveTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct KeepAliveState {
    listeners: usize,
    task: Option<KeepAliveTask>,
}

/// Reference-counted keepalive shared by all listeners of one client.
pub(crate) struct KeepAlive {
    interval: Duration,
    state: Mutex<KeepAliveState>,
}

impl KeepAlive {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(KeepAliveState::default()),
        }
    }

    /// Registers a listener. The first one starts the task.
    pub(crate) async fn acquire<T, A>(&self, dispatcher: &Arc<Dispatcher<T, A>>)
    where
        T: HttpTransport,
        A: Authenticator,
    {
        let mut state = self.state.lock().await;
        state.listeners += 1;

        if state.listeners == 1 {
            let (stop_tx, stop_rx) = oneshot::channel();
            let handle = tokio::spawn(run(Arc::clone(dispatcher), self.interval, stop_rx));
            state.task = Some(KeepAliveTask {
                stop: stop_tx,
                handle,
            });
            tracing::debug!(interval = ?self.interval, "keepalive started");
        }
    }

    /// Unregisters a listener. The last one stops the task and waits for
    /// it to finish.
    pub(crate) async fn release(&self) {
        let mut state = self.state.lock().await;
        state.listeners = state.listeners.saturating_sub(1);

        if state.listeners > 0 {
            return;
        }
        if let Some(task) = state.task.take() {
            let _ = task.stop.send(());
            if let Err(err) = task.handle.await {
                tracing::warn!(error = %err, "keepalive task did not exit cleanly");
            }
        }
    }

    /// Number of listeners currently registered.
    #[cfg(test)]
    pub(crate) async fn listeners(&self) -> usize {
        self.state.lock().await.listeners
    }

    /// Whether the keepalive task is running.
    #[cfg(test)]
    pub(crate) async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }
}

/// Pings right away, then once per `interval`, until told to stop.
async fn run<T, A>(
    dispatcher: Arc<Dispatcher<T, A>>,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
) where
    T: HttpTransport,
    A: Authenticator,
{
    let ping = Request::new(KEEPALIVE_SERVICE, KEEPALIVE_METHOD);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            result = dispatcher.call::<_, Value>(ContentType::Call, &ping) => {
                if let Err(err) = result {
                    tracing::debug!(error = %err, "keepalive call failed");
                }
            }
        }

        tokio::select! {
            biased;
            _ = &mut stop => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!("keepalive stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use livebox_transport::HttpResponse;

    use super::*;
    use crate::testing::{CountingAuthenticator, ScriptedTransport, body_json};

    const INTERVAL: Duration = Duration::from_secs(30);

    /// A dispatcher whose transport counts keepalive calls.
    fn counting_dispatcher() -> (
        Arc<Dispatcher<ScriptedTransport, CountingAuthenticator>>,
        Arc<AtomicUsize>,
    ) {
        let pings = Arc::new(AtomicUsize::new(0));
        let transport = {
            let pings = Arc::clone(&pings);
            ScriptedTransport::new(move |req| {
                let body = body_json(req);
                if body["service"] == KEEPALIVE_SERVICE && body["method"] == KEEPALIVE_METHOD {
                    pings.fetch_add(1, Ordering::SeqCst);
                }
                Some(Ok(HttpResponse::ok(br#"{"status":true}"#.to_vec())))
            })
        };
        let dispatcher = Dispatcher::new(transport, CountingAuthenticator::new(), "http://router/ws");
        (Arc::new(dispatcher), pings)
    }

    /// Lets spawned tasks run until they block.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_first_listener_starts_pinging() {
        let (dispatcher, pings) = counting_dispatcher();
        let keepalive = KeepAlive::new(INTERVAL);

        keepalive.acquire(&dispatcher).await;
        settle().await;
        assert_eq!(pings.load(Ordering::SeqCst), 1, "pings right away");

        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(pings.load(Ordering::SeqCst), 2);

        keepalive.release().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_three_release_two_keeps_one_task() {
        let (dispatcher, pings) = counting_dispatcher();
        let keepalive = KeepAlive::new(INTERVAL);

        for _ in 0..3 {
            keepalive.acquire(&dispatcher).await;
        }
        settle().await;
        // Only the first acquire spawned a task.
        assert_eq!(pings.load(Ordering::SeqCst), 1);

        keepalive.release().await;
        keepalive.release().await;

        assert_eq!(keepalive.listeners().await, 1);
        assert!(keepalive.is_running().await);

        keepalive.release().await;

        // The stop handshake completed before release returned.
        assert_eq!(keepalive.listeners().await, 0);
        assert!(!keepalive.is_running().await);
        let after_stop = pings.load(Ordering::SeqCst);
        tokio::time::sleep(INTERVAL * 3).await;
        settle().await;
        assert_eq!(pings.load(Ordering::SeqCst), after_stop, "no pings after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_after_full_release_restarts_task() {
        let (dispatcher, pings) = counting_dispatcher();
        let keepalive = KeepAlive::new(INTERVAL);

        keepalive.acquire(&dispatcher).await;
        settle().await;
        keepalive.release().await;
        keepalive.acquire(&dispatcher).await;
        settle().await;

        assert!(keepalive.is_running().await);
        assert_eq!(pings.load(Ordering::SeqCst), 2);

        keepalive.release().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_errors_do_not_stop_the_task() {
        let transport = ScriptedTransport::new(|_| Some(Ok(HttpResponse::with_status(503))));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&transport),
            CountingAuthenticator::new(),
            "http://router/ws",
        ));
        let keepalive = KeepAlive::new(INTERVAL);

        keepalive.acquire(&dispatcher).await;
        settle().await;
        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
        settle().await;

        assert!(keepalive.is_running().await);
        assert_eq!(transport.sent().len(), 2);

        keepalive.release().await;
    }

    #[tokio::test]
    async fn test_release_without_acquire_is_harmless() {
        let keepalive = KeepAlive::new(INTERVAL);

        keepalive.release().await;

        assert_eq!(keepalive.listeners().await, 0);
        assert!(!keepalive.is_running().await);
    }
}

//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use livebox_session::{
    Authenticator, SessidCookie, SessionCredentials, SessionError,
};
use livebox_transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use serde_json::Value;

type Handler =
    dyn Fn(&HttpRequest) -> Option<Result<HttpResponse, TransportError>> + Send + Sync;

/// A transport whose answers come from a closure.
///
/// Every request is recorded before the closure runs. When the closure
/// returns `None` the request never completes, like a router holding a
/// long poll open.
pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Option<Result<HttpResponse, TransportError>>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Every request sent so far, in order.
    pub(crate) fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let answer = (self.handler)(&request);
        self.sent.lock().unwrap().push(request);
        match answer {
            Some(answer) => answer,
            None => std::future::pending().await,
        }
    }
}

/// Decodes a recorded request body as JSON.
pub(crate) fn body_json(request: &HttpRequest) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}

/// An authenticator that hands out `tok-1`, `tok-2`, ... and counts logins.
#[derive(Clone)]
pub(crate) struct CountingAuthenticator {
    logins: Arc<AtomicUsize>,
    delay: Duration,
    fail: bool,
}

impl CountingAuthenticator {
    pub(crate) fn new() -> Self {
        Self {
            logins: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    /// Each login takes `delay`, so concurrent callers pile up behind it.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    /// Every login is rejected.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

impl Authenticator for CountingAuthenticator {
    async fn login(&self) -> Result<SessionCredentials, SessionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SessionError::InvalidCredentials);
        }

        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionCredentials {
            context_id: format!("tok-{n}"),
            cookie: SessidCookie {
                name: "ab/sessid".into(),
                value: format!("cookie-{n}"),
            },
        })
    }
}

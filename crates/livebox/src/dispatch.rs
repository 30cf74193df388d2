//! Request dispatcher: authenticated calls with transparent re-login.
//!
//! Every API call goes through [`Dispatcher::call`]. The dispatcher reads a
//! credentials snapshot from the session store, sends the request, and if
//! the router says the session expired (error code 13) it renews the
//! session once and resends the very same bytes.
//!
//! # Retry state machine
//!
//! ```text
//!            ┌──────────────┐  code 13   ┌──────────────┐
//!  send ───▶ │    First     │ ─────────▶ │    Retry     │ ───▶ any result
//!            └──────────────┘   renew    └──────────────┘      returned as-is
//!                  │
//!                  └── anything else ──▶ returned as-is
//! ```
//!
//! Transport failures and non-200 statuses are never retried.

use std::sync::Arc;

use livebox_protocol::{Codec, ContentType, JsonCodec, ProtocolError};
use livebox_session::{Authenticator, Credentials, SessionError, SessionStore};
use livebox_transport::{HttpRequest, HttpResponse, HttpTransport};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::LiveboxError;

/// Header some firmwares read the context token from, instead of
/// `Authorization`.
const CONTEXT_HEADER: &str = "X-Context";

/// Where a call stands in its bounded retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// The original send.
    First,
    /// The single resend after a renewal.
    Retry,
}

/// Sends authenticated calls, renewing the session when it expires.
///
/// Generic over the transport and the authenticator so tests can script
/// both.
pub struct Dispatcher<T, A> {
    transport: Arc<T>,
    authenticator: A,
    store: SessionStore,
    endpoint: String,
    codec: JsonCodec,
}

impl<T: HttpTransport, A: Authenticator> Dispatcher<T, A> {
    /// Creates a dispatcher with an empty (never authenticated) session.
    pub fn new(transport: Arc<T>, authenticator: A, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            authenticator,
            store: SessionStore::new(),
            endpoint: endpoint.into(),
            codec: JsonCodec,
        }
    }

    /// The session this dispatcher authenticates with.
    pub fn session(&self) -> &SessionStore {
        &self.store
    }

    /// Sends `request` and decodes the answer into `Res`.
    ///
    /// Logs in first if the session was never initialized. An expired
    /// session is renewed and the call resent exactly once; a second
    /// expiry is returned to the caller unchanged.
    ///
    /// # Errors
    /// - [`LiveboxError::Session`] if a login fails
    /// - [`LiveboxError::Transport`] on network failures and non-200 statuses
    /// - [`LiveboxError::Protocol`] for error envelopes and undecodable bodies
    pub async fn call<Req, Res>(
        &self,
        content_type: ContentType,
        request: &Req,
    ) -> Result<Res, LiveboxError>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        self.ensure_session().await?;

        let body = self.codec.encode(request)?;
        let mut attempt = Attempt::First;

        loop {
            let credentials = self.store.credentials().await;
            if !credentials.is_initialized() {
                return Err(SessionError::NotInitialized.into());
            }

            let response = self.send(content_type, &body, &credentials).await?;

            match self.codec.decode_response::<Res>(&response.body) {
                Err(ProtocolError::Api(errors))
                    if errors.is_permission_denied() && attempt == Attempt::First =>
                {
                    tracing::debug!(
                        version = credentials.version,
                        "permission denied, renewing session"
                    );
                    self.store
                        .renew(
                            || self.authenticator.login(),
                            |current| current == credentials.version,
                        )
                        .await?;
                    attempt = Attempt::Retry;
                }
                result => return result.map_err(LiveboxError::from),
            }
        }
    }

    /// Logs in if no login ever succeeded.
    async fn ensure_session(&self) -> Result<(), SessionError> {
        if self.store.version().await == 0 {
            self.store
                .renew(|| self.authenticator.login(), |version| version == 0)
                .await?;
        }
        Ok(())
    }

    async fn send(
        &self,
        content_type: ContentType,
        body: &[u8],
        credentials: &Credentials,
    ) -> Result<HttpResponse, LiveboxError> {
        let request = HttpRequest::post(&self.endpoint, body)
            .header("Content-Type", content_type.as_str())
            .header("Authorization", &credentials.authorization)
            .header("Cookie", &credentials.cookie)
            .header(CONTEXT_HEADER, &credentials.context_id);

        tracing::trace!(
            %content_type,
            version = credentials.version,
            "dispatching call"
        );

        Ok(self.transport.send(request).await?.ensure_ok()?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use livebox_protocol::Request;
    use livebox_transport::{HttpResponse, TransportError};
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::{CountingAuthenticator, ScriptedTransport, body_json};

    fn dispatcher(
        transport: Arc<ScriptedTransport>,
        auth: CountingAuthenticator,
    ) -> Dispatcher<ScriptedTransport, CountingAuthenticator> {
        Dispatcher::new(transport, auth, "http://router/ws")
    }

    fn permission_denied() -> HttpResponse {
        HttpResponse::ok(
            br#"{"errors":[{"error":13,"description":"Permission denied","info":"NMC"}]}"#
                .to_vec(),
        )
    }

    #[tokio::test]
    async fn test_call_first_use_logs_in_then_sends_headers() {
        let transport = ScriptedTransport::new(|_| Some(Ok(HttpResponse::ok(br#"{"status":"up"}"#.to_vec()))));
        let auth = CountingAuthenticator::new();
        let dispatcher = dispatcher(Arc::clone(&transport), auth.clone());

        let value: Value = dispatcher
            .call(ContentType::Call, &Request::new("NMC", "getWANStatus"))
            .await
            .unwrap();

        assert_eq!(value, json!({"status": "up"}));
        assert_eq!(auth.logins(), 1);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "http://router/ws");
        assert_eq!(sent[0].header_value("Authorization"), Some("X-Sah tok-1"));
        assert_eq!(sent[0].header_value("Cookie"), Some("ab/sessid=cookie-1"));
        assert_eq!(sent[0].header_value("X-Context"), Some("tok-1"));
        assert_eq!(
            sent[0].header_value("Content-Type"),
            Some("application/x-sah-ws-4-call+json")
        );
        assert_eq!(
            body_json(&sent[0]),
            json!({"service": "NMC", "method": "getWANStatus", "parameters": {}})
        );
    }

    #[tokio::test]
    async fn test_call_initialized_session_skips_login() {
        let transport = ScriptedTransport::new(|_| Some(Ok(HttpResponse::ok(b"{}".to_vec()))));
        let auth = CountingAuthenticator::new();
        let dispatcher = dispatcher(transport, auth.clone());

        for _ in 0..3 {
            let _: Value = dispatcher
                .call(ContentType::Call, &Request::new("NMC", "get"))
                .await
                .unwrap();
        }

        assert_eq!(auth.logins(), 1);
        assert_eq!(dispatcher.session().version().await, 1);
    }

    #[tokio::test]
    async fn test_call_permission_denied_renews_and_resends_same_body() {
        // The first session is rejected, the renewed one is accepted.
        let transport = ScriptedTransport::new(|req| {
            Some(Ok(match req.header_value("Authorization") {
                Some("X-Sah tok-1") => permission_denied(),
                _ => HttpResponse::ok(br#"{"ok":true}"#.to_vec()),
            }))
        });
        let auth = CountingAuthenticator::new();
        let dispatcher = dispatcher(Arc::clone(&transport), auth.clone());
        let request = Request::new("NMC", "getWANStatus").with_parameter("x", 1);

        let value: Value = dispatcher.call(ContentType::Call, &request).await.unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert_eq!(auth.logins(), 2);
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, sent[1].body);
        assert_eq!(sent[1].header_value("Authorization"), Some("X-Sah tok-2"));
    }

    #[tokio::test]
    async fn test_call_permission_denied_twice_returns_error_verbatim() {
        let transport = ScriptedTransport::new(|_| Some(Ok(permission_denied())));
        let auth = CountingAuthenticator::new();
        let dispatcher = dispatcher(Arc::clone(&transport), auth.clone());

        let err = dispatcher
            .call::<_, Value>(ContentType::Call, &Request::new("NMC", "get"))
            .await
            .unwrap_err();

        // One initial login, exactly one renewal, exactly one resend.
        assert_eq!(auth.logins(), 2);
        assert_eq!(transport.sent().len(), 2);
        let errors = err.api_errors().expect("api errors");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().unwrap().code, 13);
        assert_eq!(errors.first().unwrap().info, "NMC");
    }

    #[tokio::test]
    async fn test_call_other_api_error_is_not_retried() {
        let transport = ScriptedTransport::new(|_| {
            Some(Ok(HttpResponse::ok(
                br#"{"errors":[{"error":196618,"description":"Object or parameter not found","info":"NMC.Foo"}]}"#
                    .to_vec(),
            )))
        });
        let auth = CountingAuthenticator::new();
        let dispatcher = dispatcher(Arc::clone(&transport), auth.clone());

        let err = dispatcher
            .call::<_, Value>(ContentType::Call, &Request::new("NMC.Foo", "get"))
            .await
            .unwrap_err();

        assert!(!err.is_permission_denied());
        assert_eq!(err.api_errors().unwrap().first().unwrap().code, 196618);
        assert_eq!(auth.logins(), 1);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_call_non_200_status_is_not_retried() {
        let transport = ScriptedTransport::new(|_| Some(Ok(HttpResponse::with_status(500))));
        let auth = CountingAuthenticator::new();
        let dispatcher = dispatcher(Arc::clone(&transport), auth.clone());

        let err = dispatcher
            .call::<_, Value>(ContentType::Call, &Request::new("NMC", "get"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_call_transport_failure_is_not_retried() {
        let transport = ScriptedTransport::new(|_| {
            Some(Err(TransportError::ConnectionClosed("reset".into())))
        });
        let dispatcher = dispatcher(Arc::clone(&transport), CountingAuthenticator::new());

        let err = dispatcher
            .call::<_, Value>(ContentType::Call, &Request::new("NMC", "get"))
            .await
            .unwrap_err();

        assert!(matches!(err, LiveboxError::Transport(TransportError::ConnectionClosed(_))));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_call_login_failure_propagates_without_sending() {
        let transport = ScriptedTransport::new(|_| Some(Ok(HttpResponse::ok(b"{}".to_vec()))));
        let dispatcher = dispatcher(Arc::clone(&transport), CountingAuthenticator::failing());

        let err = dispatcher
            .call::<_, Value>(ContentType::Call, &Request::new("NMC", "get"))
            .await
            .unwrap_err();

        assert!(matches!(err, LiveboxError::Session(SessionError::InvalidCredentials)));
        assert!(transport.sent().is_empty());
        assert_eq!(dispatcher.session().version().await, 0);
    }

    #[tokio::test]
    async fn test_call_strips_trailing_null() {
        let transport = ScriptedTransport::new(|_| {
            Some(Ok(HttpResponse::ok(br#"{"channelid":3,"events":[]}null"#.to_vec())))
        });
        let dispatcher = dispatcher(transport, CountingAuthenticator::new());

        let value: Value = dispatcher
            .call(ContentType::Event, &json!({"channelid": 0, "events": []}))
            .await
            .unwrap();

        assert_eq!(value["channelid"], 3);
    }

    #[tokio::test]
    async fn test_call_concurrent_first_calls_log_in_once() {
        let transport = ScriptedTransport::new(|_| Some(Ok(HttpResponse::ok(b"{}".to_vec()))));
        let auth = CountingAuthenticator::with_delay(Duration::from_millis(10));
        let dispatcher = Arc::new(dispatcher(transport, auth.clone()));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .call::<_, Value>(ContentType::Call, &Request::new("NMC", "get"))
                    .await
                    .unwrap();
                dispatcher.session().version().await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap() >= 1);
        }

        assert_eq!(auth.logins(), 1);
        assert_eq!(dispatcher.session().version().await, 1);
    }

    #[tokio::test]
    async fn test_call_concurrent_expiry_renews_once() {
        // Every call sees the first session expire at the same time. Only
        // one of them may log in again; the others reuse its session.
        let denied = Arc::new(AtomicUsize::new(0));
        let transport = {
            let denied = Arc::clone(&denied);
            ScriptedTransport::new(move |req| {
                Some(Ok(match req.header_value("Authorization") {
                    Some("X-Sah tok-1") => {
                        denied.fetch_add(1, Ordering::SeqCst);
                        permission_denied()
                    }
                    _ => HttpResponse::ok(b"{}".to_vec()),
                }))
            })
        };
        let auth = CountingAuthenticator::with_delay(Duration::from_millis(10));
        let dispatcher = Arc::new(dispatcher(transport, auth.clone()));
        dispatcher
            .session()
            .renew(|| auth.login(), |v| v == 0)
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .call::<_, Value>(ContentType::Call, &Request::new("NMC", "get"))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(denied.load(Ordering::SeqCst) >= 1);
        assert_eq!(auth.logins(), 2);
        assert_eq!(dispatcher.session().version().await, 2);
    }
}

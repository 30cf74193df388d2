//! Authentication: turning a username and password into a session.
//!
//! The [`Authenticator`] trait is the seam between the session store and
//! the network. The store only needs "something that can log in"; the
//! production implementation is [`PasswordAuthenticator`], and tests plug
//! in counters and fakes.
//!
//! # The login exchange
//!
//! ```text
//! POST /ws
//! Content-Type:  application/x-sah-ws-4-call+json
//! Authorization: X-Sah-Login
//!
//! {"service":"sah.Device.Information","method":"createContext",
//!  "parameters":{"applicationName":"webui","username":"admin","password":"…"}}
//!
//! ← 200, Set-Cookie: <hash>/sessid=<value>; Path=/
//!   {"status":0,"data":{"contextID":"…","username":"admin","groups":"…"}}
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use livebox_protocol::{
    Codec, ContentType, DEFAULT_APPLICATION_NAME, JsonCodec, LOGIN_AUTHORIZATION,
    LoginResponse, Request,
};
use livebox_transport::{HttpRequest, HttpTransport, STATUS_UNAUTHORIZED};

use crate::{SessionCredentials, SessionError, find_sessid_cookie};

/// Obtains fresh session credentials.
///
/// # Trait bounds
///
/// - `Send + Sync` → shared between the dispatcher, listeners and the
///   keepalive task, which may run on different threads.
/// - `'static` → lives as long as the client.
pub trait Authenticator: Send + Sync + 'static {
    /// Performs one login round trip.
    ///
    /// Called by the session store *while it holds its exclusive lock*, so
    /// implementations must not touch the store themselves.
    fn login(
        &self,
    ) -> impl Future<Output = Result<SessionCredentials, SessionError>> + Send;
}

/// Logs in with a username and password over an [`HttpTransport`].
pub struct PasswordAuthenticator<T> {
    transport: Arc<T>,
    endpoint: String,
    application_name: String,
    username: String,
    password: String,
    codec: JsonCodec,
}

impl<T: HttpTransport> PasswordAuthenticator<T> {
    /// Creates an authenticator posting to `endpoint` (the full `/ws` URL).
    pub fn new(
        transport: Arc<T>,
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            username: username.into(),
            password: password.into(),
            codec: JsonCodec,
        }
    }

    /// Overrides the `applicationName` sent at login.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl<T: HttpTransport> Authenticator for PasswordAuthenticator<T> {
    async fn login(&self) -> Result<SessionCredentials, SessionError> {
        let request = Request::login(
            &self.application_name,
            &self.username,
            &self.password,
        );
        let body = self.codec.encode(&request)?;

        let http = HttpRequest::post(&self.endpoint, body)
            .header("Content-Type", ContentType::Call.as_str())
            .header("Authorization", LOGIN_AUTHORIZATION);

        let response = self.transport.send(http).await?;

        if response.status == STATUS_UNAUTHORIZED {
            tracing::warn!(username = %self.username, "login rejected");
            return Err(SessionError::InvalidCredentials);
        }
        let response = response.ensure_ok()?;

        let login: LoginResponse = self.codec.decode_response(&response.body)?;
        if login.data.context_id.is_empty() {
            return Err(SessionError::EmptyContextId);
        }

        let cookie = find_sessid_cookie(&response.set_cookies)
            .ok_or(SessionError::EmptySessidCookie)?;

        tracing::debug!(
            username = %self.username,
            groups = %login.data.groups,
            "logged in"
        );

        Ok(SessionCredentials {
            context_id: login.data.context_id,
            cookie,
        })
    }
}

// Keep the password out of logs.
impl<T> fmt::Debug for PasswordAuthenticator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuthenticator")
            .field("endpoint", &self.endpoint)
            .field("application_name", &self.application_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

//! Transport abstraction layer for the Livebox client.
//!
//! Provides the [`HttpTransport`] trait: "send this POST, give me back the
//! status, the `Set-Cookie` headers and the body". Everything above it
//! (login, dispatch, events) is written against the trait, so tests can
//! swap the network for a scripted transport.
//!
//! # Feature Flags
//!
//! - `reqwest` (default) — [`ReqwestTransport`], backed by `reqwest`

mod error;
#[cfg(feature = "reqwest")]
mod http;

pub use error::{BoxError, TransportError};
#[cfg(feature = "reqwest")]
pub use http::ReqwestTransport;

use std::future::Future;

/// Status code of every successful answer. The router reports even
/// session expiry as a 200 with an error body.
pub const STATUS_OK: u16 = 200;

/// Status code returned when the login credentials are wrong.
pub const STATUS_UNAUTHORIZED: u16 = 401;

// ---------------------------------------------------------------------------
// HttpRequest
// ---------------------------------------------------------------------------

/// A `POST` request, ready to be sent.
///
/// Headers are kept as plain strings because the router requires a
/// `Cookie` header whose cookie name is not RFC 6265 compliant (it contains
/// a `/`). Cookie jars would drop it, so it is assembled by hand upstream
/// and passed through untouched here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL of the endpoint.
    pub url: String,
    /// Headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Creates a `POST` to `url` with the given body and no headers.
    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Appends a header.
    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up the first header with this name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// HttpResponse
// ---------------------------------------------------------------------------

/// The parts of an HTTP response the client cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Set-Cookie` header values, in order.
    pub set_cookies: Vec<String>,
    /// Full body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: STATUS_OK,
            set_cookies: Vec::new(),
            body: body.into(),
        }
    }

    /// A body-less response with the given status.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Adds a `Set-Cookie` value.
    pub fn set_cookie(mut self, value: impl Into<String>) -> Self {
        self.set_cookies.push(value.into());
        self
    }

    /// Passes the response through if the status is 200.
    ///
    /// # Errors
    /// Returns [`TransportError::Status`] for any other status.
    pub fn ensure_ok(self) -> Result<Self, TransportError> {
        if self.status == STATUS_OK {
            Ok(self)
        } else {
            Err(TransportError::Status(self.status))
        }
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Sends requests to the router.
///
/// Implementations only move bytes: status handling, error envelopes and
/// session renewal all live in the layers above.
///
/// The returned future must be `Send` because requests are issued from
/// spawned Tokio tasks (event listeners, keepalive).
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends one request and reads the whole response.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

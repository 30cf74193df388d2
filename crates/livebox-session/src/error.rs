//! Error types for the session layer.

use livebox_protocol::ProtocolError;
use livebox_transport::TransportError;

/// Errors that can occur while logging in or using the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The router rejected the username or password (HTTP 401).
    #[error("invalid login or password")]
    InvalidCredentials,

    /// Login succeeded, but the router sent no `contextID`.
    /// In practice you should not expect to see this.
    #[error("received empty contextID")]
    EmptyContextId,

    /// Login succeeded, but no `…/sessid` cookie came back.
    /// In practice you should not expect to see this either.
    #[error("did not receive sessid cookie")]
    EmptySessidCookie,

    /// Credentials were requested from a session that never logged in.
    #[error("the session has never been renewed")]
    NotInitialized,

    /// The login round trip failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The login body could not be built or understood, or the router
    /// answered with an error envelope.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

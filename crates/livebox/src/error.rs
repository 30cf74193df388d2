//! Unified error type for the Livebox client.

use livebox_protocol::{ApiErrors, ProtocolError};
use livebox_session::SessionError;
use livebox_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `livebox` crate you deal with this single error type
/// instead of importing errors from each layer. The `#[from]` attribute on
/// each variant generates the `From` impls, so `?` converts layer errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum LiveboxError {
    /// The router could not be reached, or answered with a non-200 status.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A body could not be encoded or decoded, or the router answered with
    /// an error envelope.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Logging in failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LiveboxError {
    /// The router's error envelope, if this error carries one.
    ///
    /// Looks through session errors too, so an envelope returned by the
    /// login call is found as well.
    pub fn api_errors(&self) -> Option<&ApiErrors> {
        match self {
            Self::Protocol(err) | Self::Session(SessionError::Protocol(err)) => {
                err.api_errors()
            }
            _ => None,
        }
    }

    /// `true` when the first reported error is code 13.
    pub fn is_permission_denied(&self) -> bool {
        self.api_errors()
            .is_some_and(ApiErrors::is_permission_denied)
    }

    /// `true` when an event channel no longer exists on the router.
    pub fn is_channel_stale(&self) -> bool {
        self.api_errors().is_some_and(ApiErrors::is_channel_stale)
    }

    /// The unexpected HTTP status, if that is what went wrong.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) | Self::Session(SessionError::Transport(err)) => {
                err.status()
            }
            _ => None,
        }
    }
}

//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the body of a request or response,
//! not in networking or session bookkeeping.

use crate::ApiErrors;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into a request body).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a response body into a Rust value).
    ///
    /// Common causes: malformed JSON, missing required fields or wrong
    /// data types in the router's answer.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The router answered with an error envelope.
    ///
    /// The envelope is kept intact (every entry, in order) so callers can
    /// inspect codes beyond the first one.
    #[error("api error: {0}")]
    Api(ApiErrors),

    /// The body parsed, but violates the protocol in some other way.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Returns the error envelope if the router reported one.
    pub fn api_errors(&self) -> Option<&ApiErrors> {
        match self {
            Self::Api(errors) => Some(errors),
            _ => None,
        }
    }
}

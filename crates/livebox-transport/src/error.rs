/// Boxed error from the underlying HTTP stack.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, TLS, I/O...).
    #[error("request failed: {0}")]
    Request(#[source] BoxError),

    /// The connection was closed before a full response was read.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The router answered with a status other than 200.
    #[error("unexpected status {0}, expected 200")]
    Status(u16),

    /// A header name or value could not be put on the wire.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl TransportError {
    /// The HTTP status carried by a [`TransportError::Status`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

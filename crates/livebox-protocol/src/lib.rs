//! Wire protocol for the Livebox JSON-RPC API.
//!
//! This crate defines the "language" the router speaks:
//!
//! - **Types** ([`Request`], [`LoginResponse`], [`ApiErrors`], [`Event`], etc.) —
//!   the JSON bodies that travel over `POST /ws`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those bodies are
//!   converted to/from bytes, including error-envelope detection.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding, and the application errors reported by the router itself.
//!
//! # Architecture
//!
//! The protocol layer sits between the HTTP transport (raw bytes) and the
//! session/dispatch layers. It knows nothing about sockets, locks or
//! retries, only how to turn values into bodies and bodies into values.
//!
//! ```text
//! Transport (bytes) → Protocol (Request / Response) → Session + Dispatcher
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ApiError, ApiErrors, ContentType, Event, EventObject, EventPoll,
    EventsResponse, LoginData, LoginResponse, Parameters, Request,
    API_PATH, AUTHORIZATION_PREFIX, CHANNEL_DOES_NOT_EXIST_INFO,
    DEFAULT_APPLICATION_NAME, FUNCTION_EXECUTION_FAILED_DESCRIPTION,
    LOGIN_AUTHORIZATION, PERMISSION_DENIED_CODE,
};

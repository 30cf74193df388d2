//! # Livebox
//!
//! Client for the JSON API of Livebox home routers.
//!
//! The router speaks JSON over `POST /ws`. Calls must carry a session:
//! a context token and a session cookie obtained by logging in. Sessions
//! expire silently; the router then answers with error code 13. This crate
//! hides all of that:
//!
//! - the first call logs in
//! - an expired session is renewed and the call resent, once
//! - concurrent calls share one login instead of racing
//! - event sources can be watched as a [`Stream`](futures_util::Stream),
//!   with the session kept alive in the background
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livebox::prelude::*;
//!
//! # async fn run() -> Result<(), LiveboxError> {
//! let client = Client::builder()
//!     .address("192.168.1.1")
//!     .password("secret")
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let mut events = client.events(cancel.clone(), ["Devices.Device"]).await;
//! while let Some(item) = events.recv().await {
//!     match item {
//!         Ok(event) => println!("{} {}", event.handler, event.object.reason),
//!         Err(err) => eprintln!("poll failed: {err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate layout
//!
//! | crate | concern |
//! |---|---|
//! | `livebox-protocol` | bodies, content types, error envelopes |
//! | `livebox-transport` | moving bytes over HTTP |
//! | `livebox-session` | login and the session store |
//! | `livebox` | dispatching, events, keepalive, this facade |

mod client;
mod config;
mod dispatch;
mod error;
mod events;
mod keepalive;
#[cfg(test)]
mod testing;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, DEFAULT_ADDRESS, DEFAULT_USERNAME};
pub use dispatch::Dispatcher;
pub use error::LiveboxError;
pub use events::{EventItem, EventStream};
pub use tokio_util::sync::CancellationToken;

pub use livebox_protocol::{ApiError, ApiErrors, ContentType, Event, EventObject, Request};
pub use livebox_session::{Authenticator, PasswordAuthenticator, SessionError, SessionStore};
pub use livebox_transport::{HttpTransport, ReqwestTransport, TransportError};

/// Everything needed for everyday use.
pub mod prelude {
    pub use crate::{
        CancellationToken, Client, ClientBuilder, ClientConfig, Event, EventStream,
        LiveboxError, Request,
    };
}

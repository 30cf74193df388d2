//! Session management for the Livebox client.
//!
//! This crate owns everything needed to obtain and keep a session:
//!
//! 1. **Authentication** — logging in with a password and extracting the
//!    context token and the `…/sessid` cookie ([`Authenticator`] trait,
//!    [`PasswordAuthenticator`])
//! 2. **Session storage** — a versioned, lock-guarded store that hands out
//!    credential snapshots and serializes renewals ([`SessionStore`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← reads snapshots, asks for renewal on code 13
//!     ↕
//! Session Layer (this crate)  ← one login in flight at a time
//!     ↕
//! Protocol + Transport (below)  ← login body, HTTP round trip
//! ```

mod auth;
mod error;
mod sessid;
mod store;

pub use auth::{Authenticator, PasswordAuthenticator};
pub use error::SessionError;
pub use sessid::{SESSID_COOKIE_SUFFIX, find_sessid_cookie};
pub use store::{Credentials, SessidCookie, SessionCredentials, SessionStore};

//! The session store: a versioned, lock-guarded home for credentials.
//!
//! The store holds the context token and session cookie obtained at
//! login, plus a version counter that goes up by exactly one on every
//! successful renewal. Version 0 means "never logged in".
//!
//! # Concurrency note
//!
//! The store is guarded by a single `tokio::sync::RwLock`:
//!
//! - [`SessionStore::credentials`] takes the shared lock, so any number of
//!   requests can read a snapshot in parallel.
//! - [`SessionStore::renew`] takes the exclusive lock and keeps it for the
//!   whole login round trip. At most one login is in flight at any time,
//!   and readers wait for it to finish instead of using a session that is
//!   being replaced.
//!
//! Renewal is double-checked: the caller passes a condition evaluated
//! under the exclusive lock. When several requests see the same expired
//! version at once, the first one logs in and bumps the version; the
//! others find their condition false and skip the login.

use std::future::Future;

use livebox_protocol::AUTHORIZATION_PREFIX;
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// Cookie and login result
// ---------------------------------------------------------------------------

/// The router's session cookie, with its original (non-compliant) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessidCookie {
    pub name: String,
    pub value: String,
}

impl SessidCookie {
    /// The `Cookie` header value: `<name>=<value>`.
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// What a successful login yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    /// The `contextID` token.
    pub context_id: String,
    /// The `…/sessid` cookie.
    pub cookie: SessidCookie,
}

// ---------------------------------------------------------------------------
// Credentials snapshot
// ---------------------------------------------------------------------------

/// An immutable snapshot of the session, ready to be put on a request.
///
/// Two snapshots with the same `version` always carry the same header
/// values. The snapshot of a store that never logged in has empty strings
/// and version 0, and must not be used to authenticate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// `Authorization` header value: `X-Sah <contextID>`.
    pub authorization: String,
    /// `Cookie` header value: `<name>=<value>`.
    pub cookie: String,
    /// The raw `contextID`, for firmwares that read it from `X-Context`.
    pub context_id: String,
    /// Session version this snapshot was taken from.
    pub version: u64,
}

impl Credentials {
    /// `true` once at least one login succeeded.
    pub fn is_initialized(&self) -> bool {
        self.version > 0
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Session {
    context_id: String,
    cookie: Option<SessidCookie>,
    version: u64,
}

/// Thread-safe, versioned store for session credentials.
///
/// Shared between the dispatcher, event listeners and the keepalive task
/// through an `Arc`. There is no global instance.
#[derive(Debug, Default)]
pub struct SessionStore {
    session: RwLock<Session>,
}

impl SessionStore {
    /// Creates an empty (version 0) store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current credentials.
    ///
    /// Runs in parallel with other readers. Waits while a renewal is in
    /// progress.
    pub async fn credentials(&self) -> Credentials {
        let session = self.session.read().await;

        match (&session.cookie, session.version) {
            (Some(cookie), version) if version > 0 => Credentials {
                authorization: format!(
                    "{AUTHORIZATION_PREFIX} {}",
                    session.context_id
                ),
                cookie: cookie.header_value(),
                context_id: session.context_id.clone(),
                version,
            },
            _ => Credentials::default(),
        }
    }

    /// Current session version. 0 means never authenticated.
    pub async fn version(&self) -> u64 {
        self.session.read().await.version
    }

    /// Renews the session if `should_renew` agrees.
    ///
    /// Takes the exclusive lock, then calls `should_renew` with the
    /// current version:
    ///
    /// - `false` → returns `Ok(false)` immediately. Someone else already
    ///   renewed; no login, no state change.
    /// - `true` → runs `login` *while still holding the lock*. On success
    ///   the new credentials are stored, the version goes up by one, and
    ///   `Ok(true)` is returned. On failure nothing changes and the login
    ///   error is returned.
    ///
    /// The lock is released on every path.
    pub async fn renew<F, Fut, E>(
        &self,
        login: F,
        should_renew: impl FnOnce(u64) -> bool,
    ) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SessionCredentials, E>>,
    {
        let mut session = self.session.write().await;

        if !should_renew(session.version) {
            tracing::trace!(
                version = session.version,
                "session already renewed, skipping login"
            );
            return Ok(false);
        }

        let credentials = login().await?;

        session.context_id = credentials.context_id;
        session.cookie = Some(credentials.cookie);
        session.version += 1;

        tracing::debug!(version = session.version, "session renewed");
        Ok(true)
    }
}

// =========================================================================
// Tests
// =========================================================================

//! Client configuration.

use std::fmt;
use std::time::Duration;

use livebox_protocol::{API_PATH, DEFAULT_APPLICATION_NAME};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::LiveboxError;

/// Address of the router on a stock home network.
pub const DEFAULT_ADDRESS: &str = "http://192.168.1.1";

/// Username of the router's administration account.
pub const DEFAULT_USERNAME: &str = "admin";

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Client`](crate::Client).
///
/// Every field has a default; usually only `address` and `password` need
/// to be set. The password is never serialized nor printed.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base address of the router. Requests go to `<address>/ws`.
    pub address: Url,

    /// Login name.
    pub username: String,

    /// Login password.
    #[serde(skip_serializing)]
    pub password: String,

    /// `applicationName` sent at login.
    pub application_name: String,

    /// Delay between two keepalive calls while events are watched.
    pub keepalive_interval: Duration,

    /// Pause after a failed event poll before polling again.
    pub event_retry_delay: Duration,

    /// Capacity of each event stream's queue.
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            keepalive_interval: Duration::from_secs(30),
            event_retry_delay: Duration::from_secs(1),
            event_buffer: 128,
        }
    }
}

impl ClientConfig {
    /// Checks the values and returns the API endpoint (`<address>/ws`).
    ///
    /// # Errors
    /// [`LiveboxError::Config`] if the address is not an `http`/`https`
    /// URL with a host, if `event_buffer` is 0, or if either delay is zero.
    pub fn endpoint(&self) -> Result<Url, LiveboxError> {
        if !matches!(self.address.scheme(), "http" | "https") {
            return Err(LiveboxError::Config(format!(
                "unsupported scheme {:?} in address {}",
                self.address.scheme(),
                self.address
            )));
        }
        if self.address.host().is_none() {
            return Err(LiveboxError::Config(format!(
                "address {} has no host",
                self.address
            )));
        }
        if self.event_buffer == 0 {
            return Err(LiveboxError::Config(
                "event_buffer must be at least 1".into(),
            ));
        }
        if self.keepalive_interval.is_zero() {
            return Err(LiveboxError::Config(
                "keepalive_interval must not be zero".into(),
            ));
        }
        if self.event_retry_delay.is_zero() {
            return Err(LiveboxError::Config(
                "event_retry_delay must not be zero".into(),
            ));
        }

        let mut endpoint = self.address.clone();
        endpoint.set_path(API_PATH);
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        Ok(endpoint)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("application_name", &self.application_name)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("event_retry_delay", &self.event_retry_delay)
            .field("event_buffer", &self.event_buffer)
            .finish()
    }
}

fn default_address() -> Url {
    Url::parse(DEFAULT_ADDRESS).expect("DEFAULT_ADDRESS is a valid URL")
}

/// Parses a router address, accepting a bare host such as `192.168.1.1`.
pub(crate) fn parse_address(address: &str) -> Result<Url, LiveboxError> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    Url::parse(&candidate)
        .map_err(|e| LiveboxError::Config(format!("invalid address {address:?}: {e}")))
}

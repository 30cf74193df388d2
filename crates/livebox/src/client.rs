//! The client: the public entry point tying all layers together.

use std::sync::Arc;
use std::time::Duration;

use livebox_protocol::{ContentType, Request};
use livebox_session::PasswordAuthenticator;
use livebox_transport::{HttpTransport, ReqwestTransport};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::parse_address;
use crate::events::{ListenerOptions, spawn_listener};
use crate::keepalive::KeepAlive;
use crate::{ClientConfig, Dispatcher, EventStream, LiveboxError};

type PasswordDispatcher<T> = Dispatcher<T, PasswordAuthenticator<T>>;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A client for one router.
///
/// Cheap to clone: clones share the session, the transport and the
/// keepalive. There is no global state; two clients never share a session.
///
/// ```rust,no_run
/// use livebox::prelude::*;
///
/// # async fn run() -> Result<(), LiveboxError> {
/// let client = Client::builder()
///     .address("192.168.1.1")
///     .password("secret")
///     .build()?;
///
/// let status: serde_json::Value = client
///     .call(&Request::new("NMC", "getWANStatus"))
///     .await?;
/// println!("{status}");
/// # Ok(())
/// # }
/// ```
pub struct Client<T: HttpTransport = ReqwestTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T: HttpTransport> {
    config: ClientConfig,
    dispatcher: Arc<PasswordDispatcher<T>>,
    keepalive: Arc<KeepAlive>,
}

impl<T: HttpTransport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Client<ReqwestTransport> {
    /// Creates a builder with default configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client over a default `reqwest` transport.
    pub fn new(config: ClientConfig) -> Result<Self, LiveboxError> {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: HttpTransport> Client<T> {
    /// Creates a client over a custom transport.
    ///
    /// # Errors
    /// [`LiveboxError::Config`] if the configuration is unusable.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, LiveboxError> {
        let endpoint = config.endpoint()?;
        let transport = Arc::new(transport);

        let authenticator = PasswordAuthenticator::new(
            Arc::clone(&transport),
            endpoint.as_str(),
            config.username.clone(),
            config.password.clone(),
        )
        .with_application_name(config.application_name.clone());

        let dispatcher = Dispatcher::new(transport, authenticator, endpoint.as_str());

        tracing::debug!(endpoint = %endpoint, username = %config.username, "client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                keepalive: Arc::new(KeepAlive::new(config.keepalive_interval)),
                dispatcher: Arc::new(dispatcher),
                config,
            }),
        })
    }

    /// Calls a service method and decodes the result.
    ///
    /// Logs in on first use and renews an expired session once, as
    /// described in [`Dispatcher::call`].
    pub async fn call<Res: DeserializeOwned>(&self, request: &Request) -> Result<Res, LiveboxError> {
        self.inner.dispatcher.call(ContentType::Call, request).await
    }

    /// Watches the given event sources until `cancel` fires or the stream
    /// is dropped.
    ///
    /// Poll errors are delivered as `Err` items and the listener keeps
    /// going. While any stream of this client is alive, a keepalive call is
    /// sent every `keepalive_interval`.
    pub async fn events<I, S>(&self, cancel: CancellationToken, names: I) -> EventStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = ListenerOptions {
            retry_delay: self.inner.config.event_retry_delay,
            buffer: self.inner.config.event_buffer,
        };

        spawn_listener(
            Arc::clone(&self.inner.dispatcher),
            Arc::clone(&self.inner.keepalive),
            cancel,
            names.into_iter().map(Into::into).collect(),
            options,
        )
        .await
    }

    /// Current session version; 0 until the first login succeeds.
    pub async fn session_version(&self) -> u64 {
        self.inner.dispatcher.session().version().await
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl<T: HttpTransport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Client`].
///
/// Address errors are kept until [`build`](Self::build), so calls can be
/// chained without intermediate `?`.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    address: Option<String>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Router address, e.g. `192.168.1.1` or `https://livebox.home`.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Router address as an already parsed URL.
    pub fn url(mut self, url: Url) -> Self {
        self.config.address = url;
        self.address = None;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    pub fn event_retry_delay(mut self, delay: Duration) -> Self {
        self.config.event_retry_delay = delay;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    /// Resolves the final configuration.
    pub fn into_config(self) -> Result<ClientConfig, LiveboxError> {
        let mut config = self.config;
        if let Some(address) = self.address {
            config.address = parse_address(&address)?;
        }
        config.endpoint()?;
        Ok(config)
    }

    /// Builds a client over a default `reqwest` transport.
    pub fn build(self) -> Result<Client, LiveboxError> {
        Client::new(self.into_config()?)
    }

    /// Builds a client over a custom transport.
    pub fn build_with_transport<T: HttpTransport>(self, transport: T) -> Result<Client<T>, LiveboxError> {
        Client::with_transport(self.into_config()?, transport)
    }
}

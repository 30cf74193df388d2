//! Core protocol types for the Livebox wire format.
//!
//! Every type in this module is a JSON body that gets sent to, or received
//! from, the router's `/ws` endpoint. Field names follow the router's
//! spelling (`contextID`, `channelid`, ...) through `#[serde(rename)]`,
//! while the Rust side keeps snake_case names.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Path of the single API endpoint. Every call is a `POST` to it.
pub const API_PATH: &str = "/ws";

/// Value of the `Authorization` header for the login call.
///
/// The login call has no session yet, so instead of a token the router
/// expects this fixed sentinel.
pub const LOGIN_AUTHORIZATION: &str = "X-Sah-Login";

/// Prefix of the `Authorization` header for authenticated calls.
/// The full value is `"X-Sah <contextID>"`.
pub const AUTHORIZATION_PREFIX: &str = "X-Sah";

/// Application name sent with the login call, as the router's web UI does.
pub const DEFAULT_APPLICATION_NAME: &str = "webui";

/// Error code returned when the session is invalid or expired.
pub const PERMISSION_DENIED_CODE: i64 = 13;

/// Description of the error returned when polling a channel the router
/// already forgot about.
pub const FUNCTION_EXECUTION_FAILED_DESCRIPTION: &str =
    "Function execution failed";

/// Info of the error returned when polling an unknown channel.
pub const CHANNEL_DOES_NOT_EXIST_INFO: &str = "channel does not exist";

const LOGIN_SERVICE: &str = "sah.Device.Information";
const LOGIN_METHOD: &str = "createContext";

// ---------------------------------------------------------------------------
// ContentType
// ---------------------------------------------------------------------------

/// The `Content-Type` of a call.
///
/// The router uses two vendor types: one for ordinary service calls and
/// one for event polls. Responses come back with the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    /// Ordinary service/method calls.
    #[default]
    Call,
    /// Long-poll event requests.
    Event,
}

impl ContentType {
    /// The header value for this content type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "application/x-sah-ws-4-call+json",
            Self::Event => "application/x-sah-event-4-call+json",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Free-form call parameters.
pub type Parameters = Map<String, Value>;

/// A call to a router service.
///
/// Serialized as `{"service": ..., "method": ..., "parameters": {...}}`.
/// The payload is opaque to the rest of the client: it is encoded once and
/// sent as-is, possibly twice if the session has to be renewed in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Service path, e.g. `"NMC"` or `"sah.Device.Information"`.
    pub service: String,
    /// Method name on that service, e.g. `"getWANStatus"`.
    pub method: String,
    /// Named arguments. Serialized as `{}` when empty.
    #[serde(default)]
    pub parameters: Parameters,
}

impl Request {
    /// Creates a call with no parameters.
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            parameters: Parameters::new(),
        }
    }

    /// Adds one named parameter.
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Replaces all parameters.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Builds the `createContext` call that opens a session.
    pub fn login(application_name: &str, username: &str, password: &str) -> Self {
        Self::new(LOGIN_SERVICE, LOGIN_METHOD)
            .with_parameter("applicationName", application_name)
            .with_parameter("username", username)
            .with_parameter("password", password)
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Body returned by the login call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// 0 when authentication succeeded, 1 when it failed.
    #[serde(default)]
    pub status: i64,
    /// Session information. Empty when the login failed.
    #[serde(default)]
    pub data: LoginData,
}

/// Session information handed out by a successful login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    /// Token that authenticates every subsequent call.
    #[serde(rename = "contextID", default)]
    pub context_id: String,
    /// The user that logged in.
    #[serde(default)]
    pub username: String,
    /// Comma-separated groups of that user.
    #[serde(default)]
    pub groups: String,
}

// ---------------------------------------------------------------------------
// Errors reported by the router
// ---------------------------------------------------------------------------

/// A single error entry reported by the router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Numeric error code. 0 means "no error".
    #[serde(rename = "error", default, deserialize_with = "null_as_default")]
    pub code: i64,
    /// Human readable description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Extra context, often the name of the offending parameter.
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: String,
}

impl ApiError {
    /// `true` when the session used for the call is invalid or expired.
    pub fn is_permission_denied(&self) -> bool {
        self.code == PERMISSION_DENIED_CODE
    }

    /// `true` when an event poll referenced a channel the router no longer
    /// knows about.
    pub fn is_channel_stale(&self) -> bool {
        self.description == FUNCTION_EXECUTION_FAILED_DESCRIPTION
            || self.info == CHANNEL_DOES_NOT_EXIST_INFO
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error {}: {} (info: {})",
            self.code, self.description, self.info
        )
    }
}

/// The full error envelope of a response.
///
/// Never empty when produced by the codec: a body without errors decodes
/// into the caller's type instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiErrors(pub Vec<ApiError>);

impl ApiErrors {
    /// The first reported error, the one that decides retries.
    pub fn first(&self) -> Option<&ApiError> {
        self.0.first()
    }

    /// Iterates over every reported error in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ApiError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` if the first error is a permission denied (code 13).
    pub fn is_permission_denied(&self) -> bool {
        self.first().is_some_and(ApiError::is_permission_denied)
    }

    /// `true` if any entry says the event channel went stale.
    pub fn is_channel_stale(&self) -> bool {
        self.iter().any(ApiError::is_channel_stale)
    }
}

impl From<ApiError> for ApiErrors {
    fn from(error: ApiError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("no error"),
            [only] => write!(f, "{only}"),
            [first, rest @ ..] => {
                write!(f, "{first} (and {} more)", rest.len())
            }
        }
    }
}

impl std::error::Error for ApiErrors {}

/// Both error shapes the router uses, decoded in one pass.
///
/// Either the body is a single error object (`{"error": 13, ...}`) or it
/// carries a list (`{"errors": [...]}`). Unknown fields (`status`, `data`,
/// ...) are ignored, and `null` counts as absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    error: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    info: String,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<ApiError>,
}

impl ErrorEnvelope {
    /// Collapses the envelope into `ApiErrors`, or `None` if the body
    /// reported no error.
    pub(crate) fn into_errors(self) -> Option<ApiErrors> {
        if self.error != 0 {
            return Some(ApiErrors::from(ApiError {
                code: self.error,
                description: self.description,
                info: self.info,
            }));
        }
        if self.errors.is_empty() {
            None
        } else {
            Some(ApiErrors(self.errors))
        }
    }
}

/// Reads an explicit `null` as the type's default, the way a missing
/// field is read.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Body of an event poll.
///
/// `channel_id` 0 asks the router to open a new channel; the answer carries
/// the id to use on the next poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPoll {
    #[serde(rename = "channelid")]
    pub channel_id: u64,
    /// Names of the event sources to watch.
    pub events: Vec<String>,
}

/// Body returned by an event poll.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventsResponse {
    /// The channel to poll next.
    #[serde(rename = "channelid", default, deserialize_with = "null_as_default")]
    pub channel_id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    events: Vec<EventEntry>,
}

impl EventsResponse {
    /// Consumes the response, yielding events in the order received.
    pub fn into_events(self) -> impl Iterator<Item = Event> {
        self.events.into_iter().map(|entry| entry.data)
    }

    /// Number of events in this response.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Each event is wrapped in a `{"data": ...}` object on the wire.
///
/// A malformed entry still yields an (empty) event so the rest of the
/// batch survives.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct EventEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    data: Event,
}

/// A single event pushed by the router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The object path that raised the event.
    #[serde(default, deserialize_with = "null_as_default")]
    pub handler: String,
    /// Empty when the router sent none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: EventObject,
}

/// What happened, plus whatever attributes the router attached.
///
/// `#[serde(flatten)]` collects every key other than `reason` into
/// `attributes`, so nothing the router sends is lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventObject {
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

//! Codec trait and implementations for request and response bodies.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! On top of plain encode/decode, [`Codec::decode_response`] knows the
//! router's conventions for answers: an error envelope may replace the
//! expected payload, and some event answers carry a stray trailing `null`.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;
use crate::types::ErrorEnvelope;

/// The literal some event responses append after the JSON document.
const TRAILING_NULL: &[u8] = b"null";

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` lets the dispatcher hold one inside long-lived
/// async tasks shared across threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a request body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes a response body from the router.
    ///
    /// 1. A trailing literal `null` is stripped.
    /// 2. If the body carries an error envelope with at least one error,
    ///    `ProtocolError::Api` is returned with every entry, untouched.
    /// 3. Otherwise the body is decoded into `T`.
    fn decode_response<T: DeserializeOwned>(
        &self,
        body: &[u8],
    ) -> Result<T, ProtocolError> {
        let body = trim_trailing_null(body);

        // Most successful answers never mention "error"; skip the extra
        // parse for them.
        if contains(body, br#""error"#) {
            let envelope: ErrorEnvelope = self.decode(body)?;
            if let Some(errors) = envelope.into_errors() {
                return Err(ProtocolError::Api(errors));
            }
        }

        self.decode(body)
    }
}

/// Strips the trailing `null` some event responses carry.
///
/// A body that is *only* `null` is left alone: that is a valid JSON
/// document, not an artifact.
pub(crate) fn trim_trailing_null(body: &[u8]) -> &[u8] {
    let trimmed = body.trim_ascii_end();
    match trimmed.strip_suffix(TRAILING_NULL) {
        Some(rest) if !rest.trim_ascii().is_empty() => rest,
        _ => body,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`), the router's only format.
///
/// ## Example
///
/// ```rust
/// use livebox_protocol::{Codec, JsonCodec, Request};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Request::new("NMC", "getWANStatus")).unwrap();
/// let decoded: Request = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded.method, "getWANStatus");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{ApiErrors, EventsResponse, LoginResponse};

    fn api_errors(result: Result<Value, ProtocolError>) -> ApiErrors {
        match result {
            Err(ProtocolError::Api(errors)) => errors,
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_response_plain_body_returns_value() {
        let body = br#"{"status": true}"#;

        let value: Value = JsonCodec.decode_response(body).unwrap();

        assert_eq!(value, json!({"status": true}));
    }

    #[test]
    fn test_decode_response_error_list_returns_all_entries() {
        let body = br#"{"errors":[
            {"error":13,"description":"Permission denied","info":"NMC"},
            {"error":196618,"description":"Not found","info":"x"}]}"#;

        let errors = api_errors(JsonCodec.decode_response(body));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.first().unwrap().code, 13);
        assert_eq!(errors.0[1].info, "x");
    }

    #[test]
    fn test_decode_response_single_error_object() {
        let body = br#"{"error":13,"description":"Permission denied","info":""}"#;

        let errors = api_errors(JsonCodec.decode_response(body));

        assert!(errors.is_permission_denied());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_decode_response_zero_error_code_is_not_an_error() {
        let body = br#"{"status":0,"error":0,"data":{"contextID":"tok"}}"#;

        let login: LoginResponse = JsonCodec.decode_response(body).unwrap();

        assert_eq!(login.data.context_id, "tok");
    }

    #[test]
    fn test_decode_response_empty_error_list_is_not_an_error() {
        let body = br#"{"errors":[],"status":true}"#;

        let value: Value = JsonCodec.decode_response(body).unwrap();

        assert_eq!(value["status"], json!(true));
    }

    #[test]
    fn test_decode_response_null_errors_is_not_an_error() {
        let value: Value = JsonCodec
            .decode_response(br#"{"status":true,"errors":null}"#)
            .unwrap();
        assert_eq!(value["status"], json!(true));

        let value: Value = JsonCodec
            .decode_response(br#"{"status":true,"error":null,"description":null}"#)
            .unwrap();
        assert_eq!(value["status"], json!(true));
    }

    #[test]
    fn test_decode_response_keeps_batch_when_one_event_lacks_object() {
        let body = br#"{"channelid":5,"events":[{"data":{"handler":"a","object":{"reason":"ok"}}},{"data":{"handler":"b"}}]}"#;

        let response: EventsResponse = JsonCodec.decode_response(body).unwrap();

        assert_eq!(response.channel_id, 5);
        let handlers: Vec<String> = response.into_events().map(|e| e.handler).collect();
        assert_eq!(handlers, ["a", "b"]);
    }

    #[test]
    fn test_decode_response_strips_trailing_null() {
        let body = br#"{"channelid":5,"events":[]}null"#;

        let events: EventsResponse = JsonCodec.decode_response(body).unwrap();

        assert_eq!(events.channel_id, 5);
        assert!(events.is_empty());
    }

    #[test]
    fn test_decode_response_malformed_body_returns_decode_error() {
        let result: Result<Value, _> = JsonCodec.decode_response(b"{not json");

        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_trim_trailing_null_keeps_bare_null() {
        assert_eq!(trim_trailing_null(b"null"), b"null");
        assert_eq!(trim_trailing_null(b"{}null\n"), b"{}");
        assert_eq!(trim_trailing_null(b"{}"), b"{}");
    }
}

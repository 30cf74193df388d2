//! HTTP transport implementation using `reqwest`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};

use crate::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// An [`HttpTransport`] backed by a `reqwest::Client`.
///
/// Cheap to clone: `reqwest::Client` is reference counted internally and
/// pools connections across clones.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing client (custom TLS roots, proxies, timeouts...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let headers = header_map(&request.headers)?;

        tracing::trace!(
            url = %request.url,
            bytes = request.body.len(),
            "sending request"
        );

        let response = self
            .client
            .post(&request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::Request(Box::new(e)))?;

        let status = response.status().as_u16();
        let set_cookies = set_cookie_values(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?
            .to_vec();

        tracing::trace!(status, bytes = body.len(), "received response");

        Ok(HttpResponse {
            status,
            set_cookies,
            body,
        })
    }
}

/// Every `Set-Cookie` value, in order.
///
/// Bytes outside visible ASCII are replaced rather than dropping the
/// whole header, so a session cookie next to them is still found.
fn set_cookie_values(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .collect()
}

/// Converts string headers, rejecting anything that can't go on the wire.
///
/// `append` (not `insert`) keeps repeated headers.
fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

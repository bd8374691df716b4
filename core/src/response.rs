//! Collected responses.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::http::{find_header, fold_headers, Incoming};
use crate::transport::{BodyStream, BoxError};

/// A fully buffered response, JSON-decoded when it is labelled as JSON.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    data: Option<Value>,
    parse_error: Option<Error>,
}

impl Response {
    /// Build a response from already buffered parts, attempting the JSON
    /// decode the collector would.
    pub fn from_parts(status: u16, headers: Vec<(String, String)>, body: String) -> Self {
        let headers = fold_headers(headers);
        let is_json = find_header(&headers, "content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
        let (data, parse_error) = if is_json && !body.is_empty() {
            match serde_json::from_str(&body) {
                Ok(value) => (Some(value), None),
                Err(e) => {
                    tracing::debug!(status, error = %e, "JSON-labelled body did not parse");
                    (None, Some(Error::JsonParse(e.to_string())))
                }
            }
        } else {
            (None, None)
        };
        Self {
            status,
            headers,
            body,
            data,
            parse_error,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// The parsed body, present only for JSON responses that decoded cleanly.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn parse_error(&self) -> Option<&Error> {
        self.parse_error.as_ref()
    }

    /// Decode the body into a concrete type regardless of its content type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body).map_err(|e| Error::JsonParse(e.to_string()))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Drain a response body and decode it.
///
/// Chunks are buffered as bytes and decoded once at the end so a multi-byte
/// character split across chunks survives intact.
pub(crate) async fn collect<B: BodyStream>(incoming: Incoming<B>) -> Result<Response, BoxError> {
    let Incoming {
        status,
        headers,
        mut body,
    } = incoming;
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next_chunk().await? {
        bytes.extend_from_slice(&chunk);
    }
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(Response::from_parts(status, headers, text))
}

//! Per-call request overrides and the request builder.
//!
//! # Design
//! `build_request` is a pure function of `(ClientConfig, method, path,
//! RequestSpec)`. It never touches the network, so every rule about paths,
//! query strings, header merging and body encoding is unit-testable against
//! the resulting `HttpRequest`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{find_header, HttpMethod, HttpRequest};

const CONTENT_TYPE: &str = "content-type";
const CONTENT_LENGTH: &str = "content-length";
const AUTHORIZATION: &str = "authorization";

/// Data attached to a call. A JSON object becomes a query string on
/// body-less verbs and a JSON body otherwise; text and bytes are sent as-is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Json(Value),
    #[serde(skip_deserializing)]
    Bytes(Vec<u8>),
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

/// Overrides for a single call, merged over the client's configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestSpec {
    #[serde(alias = "body")]
    pub data: Option<Payload>,
    /// Appended as a query string on every verb.
    pub query: Option<Map<String, Value>>,
    /// URL-encoded body for verbs that carry one.
    pub form: Option<Map<String, Value>>,
    /// Applied in order over the default headers. `None` removes the header.
    pub headers: Vec<(String, Option<String>)>,
    pub auth: Option<String>,
    pub timeout_millis: Option<u64>,
}

impl RequestSpec {
    pub fn is_empty(&self) -> bool {
        *self == RequestSpec::default()
    }
}

/// Resolve a call into transport-level request parameters.
pub fn build_request(
    config: &ClientConfig,
    method: HttpMethod,
    path: &str,
    spec: &RequestSpec,
) -> Result<HttpRequest, Error> {
    let mut full_path = format!("{}{}", config.base_path, path);
    let query = encode_query(method, spec);
    if !query.is_empty() {
        full_path.push(if full_path.contains('?') { '&' } else { '?' });
        full_path.push_str(&query);
    }

    let mut headers: Vec<(String, String)> = Vec::new();
    for (name, value) in &config.default_headers {
        set_header(&mut headers, name, value.clone())?;
    }
    for (name, value) in &spec.headers {
        match value {
            Some(value) => set_header(&mut headers, name, value.clone())?,
            None => remove_header(&mut headers, name),
        }
    }

    if let Some(credentials) = spec.auth.as_ref().or(config.auth.as_ref()) {
        let value = format!("Basic {}", STANDARD.encode(credentials));
        set_header(&mut headers, AUTHORIZATION, value)?;
    }

    let body = if method.has_body() {
        encode_body(spec, &mut headers)?
    } else {
        let unusable_data = match &spec.data {
            Some(Payload::Text(_) | Payload::Bytes(_)) => true,
            Some(Payload::Json(value)) => !value.is_object(),
            None => false,
        };
        if spec.form.is_some() || unusable_data {
            tracing::debug!(%method, path, "ignoring request body on a body-less verb");
        }
        None
    };

    Ok(HttpRequest {
        method,
        origin: config.base_url(),
        path: full_path,
        headers,
        body,
    })
}

fn encode_query(method: HttpMethod, spec: &RequestSpec) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    if let Some(query) = &spec.query {
        any |= append_pairs(&mut serializer, query);
    }
    if !method.has_body() {
        if let Some(Payload::Json(Value::Object(data))) = &spec.data {
            any |= append_pairs(&mut serializer, data);
        }
    }
    if any {
        serializer.finish()
    } else {
        String::new()
    }
}

fn append_pairs(serializer: &mut form_urlencoded::Serializer<'_, String>, map: &Map<String, Value>) -> bool {
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                for item in items {
                    serializer.append_pair(key, &scalar(item));
                }
            }
            other => {
                serializer.append_pair(key, &scalar(other));
            }
        }
    }
    !map.is_empty()
}

/// Form and query values: strings verbatim, `null` empty, anything else as JSON text.
fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode_body(spec: &RequestSpec, headers: &mut Vec<(String, String)>) -> Result<Option<Vec<u8>>, Error> {
    let explicit_type = find_header(headers, CONTENT_TYPE).is_some();
    let mut body = None;

    match &spec.data {
        Some(Payload::Json(value)) => {
            let bytes = serde_json::to_vec(value).map_err(|e| Error::InvalidArgument(e.to_string()))?;
            if !explicit_type {
                set_header(headers, CONTENT_TYPE, "application/json".to_string())?;
            }
            body = Some(bytes);
        }
        Some(Payload::Text(text)) => body = Some(text.as_bytes().to_vec()),
        Some(Payload::Bytes(bytes)) => body = Some(bytes.clone()),
        None => {}
    }

    if let Some(form) = &spec.form {
        if body.is_some() {
            tracing::warn!("both data and form supplied; sending the form");
        }
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        append_pairs(&mut serializer, form);
        if !explicit_type {
            set_header(headers, CONTENT_TYPE, "application/x-www-form-urlencoded".to_string())?;
        }
        body = Some(serializer.finish().into_bytes());
    }

    if let Some(bytes) = &body {
        set_header(headers, CONTENT_LENGTH, bytes.len().to_string())?;
    }
    Ok(body)
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) -> Result<(), Error> {
    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid_name {
        return Err(Error::InvalidArgument(format!("invalid header name {name:?}")));
    }
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidArgument(format!("invalid value for header {name:?}")));
    }
    let name = name.to_ascii_lowercase();
    match headers.iter_mut().find(|(k, _)| *k == name) {
        Some(slot) => slot.1 = value,
        None => headers.push((name, value)),
    }
    Ok(())
}

fn remove_header(headers: &mut Vec<(String, String)>, name: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
}

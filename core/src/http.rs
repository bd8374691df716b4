//! HTTP transport types for the host-does-IO split.
//!
//! # Design
//! These types describe a request and the head of a response as plain data.
//! The request builder produces an `HttpRequest` without touching the network;
//! a [`Transport`](crate::transport::Transport) turns it into an `Incoming`
//! whose body is pulled chunk by chunk by the response collector.
//!
//! Header names are stored lower-cased. HTTP treats them case-insensitively
//! and a single canonical spelling keeps merging and lookups trivial.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }

    /// Whether the verb conventionally carries a request body. Data supplied
    /// to the other verbs is sent as a query string instead.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// `scheme://host[:port]`, no trailing slash.
    pub origin: String,
    /// Base path, call path and query string.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn url(&self) -> String {
        format!("{}{}", self.origin, self.path)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Status line and headers of a response, with its body still streaming.
#[derive(Debug)]
pub struct Incoming<B> {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: B,
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Join repeated header names into one `", "`-separated value, keeping the
/// position and spelling of the first occurrence.
pub(crate) fn fold_headers(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut folded: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for (name, value) in pairs {
        match folded.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(slot) => {
                slot.1.push_str(", ");
                slot.1.push_str(&value);
            }
            None => folded.push((name, value)),
        }
    }
    folded
}

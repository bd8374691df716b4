//! Pluggable HTTP transport.
//!
//! # Design
//! The executor only needs two capabilities: send an `HttpRequest` and get
//! back a status line with headers, then pull the body until it ends. Both
//! are async so one call never blocks a worker thread, and dropping either
//! future aborts the exchange, which is how deadlines cancel a request.
//!
//! `ReqwestTransport` is the default. Redirects are not followed and idle
//! connections are not kept, so each call is a single independent exchange.

use std::collections::VecDeque;
use std::future::Future;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{HttpMethod, HttpRequest, Incoming};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sends one request and yields its response head.
pub trait Transport: Send + Sync {
    type Body: BodyStream;

    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<Incoming<Self::Body>, BoxError>> + Send;
}

/// A response body delivered as a sequence of byte chunks.
pub trait BodyStream: Send {
    /// The next chunk, or `None` once the body has ended.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, BoxError>> + Send;
}

/// In-memory body, handy for canned responses.
impl BodyStream for VecDeque<Vec<u8>> {
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, BoxError>> + Send {
        let chunk = self.pop_front();
        async move { Ok::<_, BoxError>(chunk) }
    }
}

/// HTTP/HTTPS transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0);
        if config.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    type Body = reqwest::Response;

    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<Incoming<Self::Body>, BoxError>> + Send {
        let client = self.client.clone();
        async move {
            let mut headers = HeaderMap::new();
            for (name, value) in &request.headers {
                headers.append(HeaderName::from_bytes(name.as_bytes())?, HeaderValue::from_str(value)?);
            }
            let mut builder = client.request(to_reqwest(request.method), request.url()).headers(headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
            let response = builder.send().await?;
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                    (name.as_str().to_string(), value)
                })
                .collect();
            Ok::<_, BoxError>(Incoming {
                status: response.status().as_u16(),
                headers,
                body: response,
            })
        }
    }
}

impl BodyStream for reqwest::Response {
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, BoxError>> + Send {
        async move {
            let chunk = self.chunk().await?;
            Ok::<_, BoxError>(chunk.map(|bytes| bytes.to_vec()))
        }
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Trace => reqwest::Method::TRACE,
        HttpMethod::Connect => reqwest::Method::CONNECT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_body_drains_then_ends() {
        let mut body: VecDeque<Vec<u8>> = vec![b"ab".to_vec(), b"c".to_vec()].into();
        assert_eq!(body.next_chunk().await.unwrap(), Some(b"ab".to_vec()));
        assert_eq!(body.next_chunk().await.unwrap(), Some(b"c".to_vec()));
        assert_eq!(body.next_chunk().await.unwrap(), None);
    }

    #[test]
    fn builds_with_either_tls_policy() {
        let insecure = ClientConfig::default();
        assert!(ReqwestTransport::new(&insecure).is_ok());
        let strict = ClientConfig {
            insecure_tls: false,
            ..ClientConfig::default()
        };
        assert!(ReqwestTransport::new(&strict).is_ok());
    }
}

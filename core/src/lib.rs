//! HTTP request helper with inline response assertions, for integration
//! tests against HTTP APIs.
//!
//! # Overview
//! One call sends one request, buffers the response, decodes JSON bodies and,
//! when given an [`AssertionHandle`], checks the result against expected
//! status, headers, body and data before concluding with exactly one terminal
//! action.
//!
//! ```no_run
//! # async fn demo() -> Result<(), reqcheck::Error> {
//! use reqcheck::{ApiClient, ClientConfig, RecordingHandle};
//! use serde_json::json;
//!
//! let api = ApiClient::new(ClientConfig {
//!     port: Some(3000),
//!     base_path: "/api".to_string(),
//!     ..ClientConfig::default()
//! })?;
//! let mut handle = RecordingHandle::new();
//! api.post("/items")
//!     .data(json!({"name": "a"}))
//!     .expect_status(201)
//!     .handle(&mut handle)
//!     .send()
//!     .await?;
//! assert!(handle.passed());
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - Request building and response checking are pure; only the
//!   [`Transport`] does I/O, so both halves are tested without a network.
//! - The sink for the terminal action (callback, handle `done`, or `Err`)
//!   is chosen before the request is sent.
//! - TLS certificates are not verified unless `insecure_tls` is turned off.

pub mod args;
pub mod assertions;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod transport;

pub use args::{normalize, Arg, Normalized};
pub use assertions::{AssertionHandle, ExpectationSpec, RecordingHandle};
pub use client::{ApiClient, Call, Callback};
pub use config::ClientConfig;
pub use error::{AssertionError, Error, ErrorKind};
pub use http::{HttpMethod, HttpRequest, Incoming};
pub use request::{build_request, Payload, RequestSpec};
pub use response::Response;
pub use transport::{BodyStream, BoxError, ReqwestTransport, Transport};

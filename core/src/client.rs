//! Request executor.
//!
//! # Design
//! `ApiClient` holds the read-only `ClientConfig` and a transport. Each verb
//! method returns a `Call` builder; `Call::send` runs one exchange end to end:
//!
//! 1. validate the path and build the `HttpRequest` (errors return directly,
//!    before any I/O);
//! 2. send it and collect the body under the resolved deadline;
//! 3. run the assertion engine if a handle was supplied;
//! 4. deliver exactly one terminal action to the sink chosen up front:
//!    callback, else the handle's `done`, else `Err` from `send`.
//!
//! Calls share nothing mutable, so any number can be in flight at once.

use std::fmt;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::args::{check_path, normalize, Arg};
use crate::assertions::{check, AssertionHandle, ExpectationSpec};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{HttpMethod, HttpRequest};
use crate::request::{build_request, Payload, RequestSpec};
use crate::response::{collect, Response};
use crate::transport::{ReqwestTransport, Transport};

/// Completion callback: `(Some(response), None)` on success,
/// `(Some(response), Some(assertion))` on a failed expectation and
/// `(None, Some(error))` on a transport failure or timeout.
pub type Callback<'a> = Box<dyn FnOnce(Option<Response>, Option<Error>) + Send + 'a>;

/// HTTP client bound to one `ClientConfig`.
#[derive(Debug, Clone)]
pub struct ApiClient<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
}

impl ApiClient<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self { config, transport })
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn request(&self, method: HttpMethod, path: impl Into<String>) -> Call<'_, T> {
        Call {
            client: self,
            method,
            path: path.into(),
            request: RequestSpec::default(),
            expect: ExpectationSpec::default(),
            handle: None,
            callback: None,
        }
    }

    /// Positional form: `(handle, path, trailing...)`, see [`normalize`].
    pub fn call<'a>(
        &'a self,
        method: HttpMethod,
        handle: Option<&'a mut dyn AssertionHandle>,
        path: &str,
        args: Vec<Arg<'a>>,
    ) -> Result<Call<'a, T>, Error> {
        let normalized = normalize(path, args)?;
        Ok(Call {
            client: self,
            method,
            path: path.to_string(),
            request: normalized.request,
            expect: normalized.expect,
            handle,
            callback: normalized.callback,
        })
    }

    pub fn get(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Get, path)
    }

    pub fn post(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Post, path)
    }

    pub fn put(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Put, path)
    }

    pub fn patch(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Patch, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Delete, path)
    }

    pub fn head(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Head, path)
    }

    pub fn options(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Options, path)
    }

    pub fn trace(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Trace, path)
    }

    pub fn connect(&self, path: impl Into<String>) -> Call<'_, T> {
        self.request(HttpMethod::Connect, path)
    }
}

/// One pending call. Nothing is sent until [`Call::send`].
pub struct Call<'a, T> {
    client: &'a ApiClient<T>,
    method: HttpMethod,
    path: String,
    request: RequestSpec,
    expect: ExpectationSpec,
    handle: Option<&'a mut dyn AssertionHandle>,
    callback: Option<Callback<'a>>,
}

impl<T> fmt::Debug for Call<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("request", &self.request)
            .field("expect", &self.expect)
            .field("handle", &self.handle.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl<'a, T: Transport> Call<'a, T> {
    pub fn request(mut self, request: RequestSpec) -> Self {
        self.request = request;
        self
    }

    /// Query string on body-less verbs, JSON body otherwise.
    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.request.data = Some(data.into());
        self
    }

    pub fn query(mut self, query: Map<String, Value>) -> Self {
        self.request.query = Some(query);
        self
    }

    pub fn form(mut self, form: Map<String, Value>) -> Self {
        self.request.form = Some(form);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), Some(value.into())));
        self
    }

    /// Drop a default header from this call.
    pub fn remove_header(mut self, name: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), None));
        self
    }

    /// `user:password` for HTTP Basic authentication.
    pub fn auth(mut self, credentials: impl Into<String>) -> Self {
        self.request.auth = Some(credentials.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout_millis = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn expect(mut self, expect: ExpectationSpec) -> Self {
        self.expect = expect;
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expect.status = Some(status);
        self
    }

    pub fn expect_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.expect.headers.insert(name.into(), value.into());
        self
    }

    pub fn expect_body(mut self, body: impl Into<String>) -> Self {
        self.expect.body = Some(body.into());
        self
    }

    pub fn expect_data(mut self, data: Value) -> Self {
        self.expect.data = Some(data);
        self
    }

    pub fn expect_ok(mut self, ok: bool) -> Self {
        self.expect.ok = Some(ok);
        self
    }

    /// Run expectations through `handle`; its `done` concludes the call
    /// unless a callback is also set.
    pub fn handle(mut self, handle: &'a mut dyn AssertionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn callback(mut self, callback: impl FnOnce(Option<Response>, Option<Error>) + Send + 'a) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Resolve the request this call would send, without sending it.
    pub fn build(&self) -> Result<HttpRequest, Error> {
        check_path(&self.path)?;
        build_request(&self.client.config, self.method, &self.path, &self.request)
    }

    /// Send the request and deliver the single terminal action.
    ///
    /// Returns `Err` only when no callback or handle was supplied to take
    /// the failure, or when the call itself is malformed.
    pub async fn send(self) -> Result<(), Error> {
        let request = self.build()?;
        let Call {
            client,
            request: spec,
            expect,
            mut handle,
            callback,
            ..
        } = self;
        let config = &client.config;
        let sink = Sink::select(callback, handle.is_some());
        let deadline = spec
            .timeout_millis
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .or_else(|| config.timeout());

        let response = match exchange(&client.transport, config, request, deadline).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "request failed");
                return sink.finish(handle, None, Some(error));
            }
        };

        let verdict = match handle.as_deref_mut() {
            Some(h) => check(h, config, &response, &expect),
            None => Ok(()),
        };
        match verdict {
            Ok(()) => sink.finish(handle, Some(response), None),
            Err(failure) => {
                tracing::debug!(%failure, "expectation failed");
                sink.finish(handle, Some(response), Some(failure.into()))
            }
        }
    }
}

async fn exchange<T: Transport>(
    transport: &T,
    config: &ClientConfig,
    request: HttpRequest,
    deadline: Option<Duration>,
) -> Result<Response, Error> {
    let method = request.method.as_str().to_string();
    let url = request.url();
    let headers = request.headers.clone();
    tracing::debug!(%method, %url, "sending request");
    if config.debug {
        let body = request.body.as_deref().map(String::from_utf8_lossy);
        tracing::debug!(?headers, ?body, "request detail");
    }

    let started = Instant::now();
    let round_trip = async {
        let incoming = transport.send(request).await?;
        collect(incoming).await
    };
    let outcome = match deadline {
        Some(after) => match tokio::time::timeout(after, round_trip).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(Error::Timeout { method, url, after });
            }
        },
        None => round_trip.await,
    };

    match outcome {
        Ok(response) => {
            tracing::debug!(
                %method,
                %url,
                status = response.status(),
                elapsed_ms = millis(started.elapsed()),
                "response collected"
            );
            if config.debug {
                tracing::debug!(headers = ?response.headers(), body = response.text(), "response detail");
            }
            Ok(response)
        }
        Err(e) => Err(Error::Transport {
            method,
            url,
            headers,
            message: e.to_string(),
        }),
    }
}

/// Where the terminal action of a call goes, fixed before the request is sent.
enum Sink<'a> {
    Callback(Callback<'a>),
    Done,
    Raise,
}

impl<'a> Sink<'a> {
    fn select(callback: Option<Callback<'a>>, has_handle: bool) -> Self {
        match callback {
            Some(cb) => Sink::Callback(cb),
            None if has_handle => Sink::Done,
            None => Sink::Raise,
        }
    }

    fn finish(
        self,
        handle: Option<&mut dyn AssertionHandle>,
        response: Option<Response>,
        error: Option<Error>,
    ) -> Result<(), Error> {
        match self {
            Sink::Callback(cb) => cb(response, error),
            Sink::Done => {
                if let Some(handle) = handle {
                    handle.done(error);
                }
            }
            Sink::Raise => {
                if let Some(error) = error {
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

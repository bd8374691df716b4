//! Error types for the request helper.
//!
//! # Design
//! A single `Error` enum covers every way a call can conclude unsuccessfully.
//! `Timeout` is split out from `Transport` because test suites routinely
//! assert on "the server was too slow" separately from "the server was not
//! there". Transport-level variants carry the method, URL and request headers
//! so a failing test prints enough context to reproduce the request.
//!
//! Every payload is owned and `Clone`, so an error can be recorded on a
//! `Response` and handed to a callback or assertion handle without lifetime
//! concerns.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Config,
    Transport,
    Timeout,
    Assertion,
    JsonParse,
}

/// Errors produced while normalizing, sending or checking a request.
#[derive(Debug, Clone)]
pub enum Error {
    /// The call shape was invalid (empty path, unexpected argument). Raised
    /// before any network activity.
    InvalidArgument(String),

    /// The client could not be configured (bad environment value, TLS setup).
    Config(String),

    /// DNS failure, refused connection, reset or any other transport fault.
    Transport {
        method: String,
        url: String,
        headers: Vec<(String, String)>,
        message: String,
    },

    /// The per-request deadline elapsed and the exchange was aborted.
    Timeout {
        method: String,
        url: String,
        after: Duration,
    },

    /// An expectation did not hold.
    Assertion(AssertionError),

    /// A JSON-labelled body could not be parsed. Only ever recorded on a
    /// `Response`, never returned from a call.
    JsonParse(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Config(_) => ErrorKind::Config,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Assertion(_) => ErrorKind::Assertion,
            Error::JsonParse(_) => ErrorKind::JsonParse,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// The assertion failure, if this error is one.
    pub fn as_assertion(&self) -> Option<&AssertionError> {
        match self {
            Error::Assertion(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Error::Transport {
                method,
                url,
                message,
                ..
            } => write!(f, "{method} {url} failed: {message}"),
            Error::Timeout { method, url, after } => {
                write!(f, "{method} {url} timed out after {}ms", after.as_millis())
            }
            Error::Assertion(e) => write!(f, "{e}"),
            Error::JsonParse(msg) => write!(f, "response body is not valid JSON: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<AssertionError> for Error {
    fn from(e: AssertionError) -> Self {
        Error::Assertion(e)
    }
}

/// A failed comparison reported by an assertion handle.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionError {
    pub message: String,
    pub actual: Value,
    pub expected: Value,
}

impl AssertionError {
    pub fn new(message: impl Into<String>, actual: Value, expected: Value) -> Self {
        Self {
            message: message.into(),
            actual,
            expected,
        }
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.message, self.expected, self.actual
        )
    }
}

impl std::error::Error for AssertionError {}

//! Response expectations and the assertion engine.
//!
//! # Design
//! The engine owns no knowledge of any test framework. It talks to an
//! [`AssertionHandle`] through three primitives (`equal`, `deep_equal`,
//! `done`), so adapting a new framework means implementing one small trait.
//! Checks run in a fixed order and stop at the first failure.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{AssertionError, Error};
use crate::response::Response;

/// Expected outcome of a call. Absent fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExpectationSpec {
    pub status: Option<u16>,
    /// Merged over the client's expected headers; names match case-insensitively.
    pub headers: BTreeMap<String, String>,
    /// Exact body text.
    pub body: Option<String>,
    /// Structural equality against the parsed JSON body.
    pub data: Option<Value>,
    /// Whether the status must be in the 2xx range.
    pub ok: Option<bool>,
}

impl ExpectationSpec {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Capability interface over a test framework's assertions.
pub trait AssertionHandle: Send {
    /// Scalar equality.
    fn equal(&mut self, actual: &Value, expected: &Value, message: &str) -> Result<(), AssertionError>;

    /// Structural equality of nested values.
    fn deep_equal(&mut self, actual: &Value, expected: &Value, message: &str) -> Result<(), AssertionError>;

    /// Completion signal, with the failure if there was one.
    fn done(&mut self, error: Option<Error>);
}

/// An `AssertionHandle` that records every check and completion.
///
/// `equal` is loose the way test frameworks' non-strict equality is: a number
/// and a string holding the same number compare equal. `deep_equal` is exact.
#[derive(Debug, Default)]
pub struct RecordingHandle {
    pub checks: Vec<String>,
    pub completions: Vec<Option<Error>>,
}

impl RecordingHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `done` fired exactly once, without an error.
    pub fn passed(&self) -> bool {
        matches!(self.completions.as_slice(), [None])
    }

    /// The error delivered to `done`, if it fired exactly once with one.
    pub fn failure(&self) -> Option<&Error> {
        match self.completions.as_slice() {
            [Some(error)] => Some(error),
            _ => None,
        }
    }
}

impl AssertionHandle for RecordingHandle {
    fn equal(&mut self, actual: &Value, expected: &Value, message: &str) -> Result<(), AssertionError> {
        self.checks.push(message.to_string());
        if loosely_equal(actual, expected) {
            Ok(())
        } else {
            Err(AssertionError::new(message, actual.clone(), expected.clone()))
        }
    }

    fn deep_equal(&mut self, actual: &Value, expected: &Value, message: &str) -> Result<(), AssertionError> {
        self.checks.push(message.to_string());
        if actual == expected {
            Ok(())
        } else {
            Err(AssertionError::new(message, actual.clone(), expected.clone()))
        }
    }

    fn done(&mut self, error: Option<Error>) {
        self.completions.push(error);
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}

/// Compare a response against expectations merged with the client defaults.
///
/// Order: status, headers, body, data, ok. The first failing check is
/// returned and the rest are skipped.
pub fn check(
    handle: &mut dyn AssertionHandle,
    config: &ClientConfig,
    response: &Response,
    expect: &ExpectationSpec,
) -> Result<(), AssertionError> {
    if let Some(status) = expect.status.or(config.default_status) {
        handle.equal(&Value::from(response.status()), &Value::from(status), "status code")?;
    }

    let mut headers: BTreeMap<String, &str> = BTreeMap::new();
    for (name, value) in config.expected_headers.iter().chain(&expect.headers) {
        headers.insert(name.to_ascii_lowercase(), value);
    }
    for (name, expected) in headers {
        let actual = response.header(&name).map_or(Value::Null, Value::from);
        handle.equal(&actual, &Value::from(expected), &format!("header {name}"))?;
    }

    if let Some(body) = &expect.body {
        handle.equal(&Value::from(response.text()), &Value::from(body.as_str()), "body")?;
    }

    if let Some(data) = &expect.data {
        let actual = response.data().cloned().unwrap_or(Value::Null);
        handle.deep_equal(&actual, data, "data")?;
    }

    if let Some(ok) = expect.ok {
        handle.equal(&Value::from(response.is_success()), &Value::from(ok), "ok")?;
    }

    Ok(())
}

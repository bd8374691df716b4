//! Positional call shapes.
//!
//! Older suites call verbs as `verb(handle, path, ...)` with up to three
//! trailing arguments whose meaning depends on how many there are and which
//! one is a callback. `normalize` resolves those shapes into the same
//! `(RequestSpec, ExpectationSpec, callback)` triple the typed builder
//! produces.

use std::fmt;

use crate::assertions::ExpectationSpec;
use crate::client::Callback;
use crate::error::Error;
use crate::request::RequestSpec;

/// One trailing positional argument.
pub enum Arg<'a> {
    Request(RequestSpec),
    Expect(ExpectationSpec),
    Callback(Callback<'a>),
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Request(req) => f.debug_tuple("Request").field(req).finish(),
            Arg::Expect(res) => f.debug_tuple("Expect").field(res).finish(),
            Arg::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Trailing arguments resolved to their roles.
#[derive(Default)]
pub struct Normalized<'a> {
    pub request: RequestSpec,
    pub expect: ExpectationSpec,
    pub callback: Option<Callback<'a>>,
}

impl fmt::Debug for Normalized<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalized")
            .field("request", &self.request)
            .field("expect", &self.expect)
            .field("callback", &self.callback.as_ref().map(|_| "Callback(..)"))
            .finish()
    }
}

/// Resolve `path` plus trailing arguments.
///
/// | trailing | meaning |
/// |---|---|
/// | none | no overrides |
/// | `cb` / `res` | callback, or expectations |
/// | `req, cb` / `req, res` | overrides with callback, or with expectations |
/// | `req, res, cb` | full form |
pub fn normalize<'a>(path: &str, args: Vec<Arg<'a>>) -> Result<Normalized<'a>, Error> {
    check_path(path)?;
    let mut args = args.into_iter();
    let normalized = match (args.next(), args.next(), args.next(), args.next()) {
        (None, None, None, None) => Normalized::default(),
        (Some(Arg::Callback(cb)), None, None, None) => Normalized {
            callback: Some(cb),
            ..Normalized::default()
        },
        (Some(Arg::Expect(expect)), None, None, None) => Normalized {
            expect,
            ..Normalized::default()
        },
        (Some(Arg::Request(request)), Some(Arg::Callback(cb)), None, None) => Normalized {
            request,
            callback: Some(cb),
            ..Normalized::default()
        },
        (Some(Arg::Request(request)), Some(Arg::Expect(expect)), None, None) => Normalized {
            request,
            expect,
            callback: None,
        },
        (Some(Arg::Request(request)), Some(Arg::Expect(expect)), Some(Arg::Callback(cb)), None) => {
            Normalized {
                request,
                expect,
                callback: Some(cb),
            }
        }
        (a, b, c, d) => {
            let shape: Vec<String> = [a, b, c, d].iter().flatten().map(|arg| format!("{arg:?}")).collect();
            return Err(Error::InvalidArgument(format!(
                "unsupported argument shape after path: [{}]",
                shape.join(", ")
            )));
        }
    };
    Ok(normalized)
}

pub(crate) fn check_path(path: &str) -> Result<(), Error> {
    if path.is_empty() {
        return Err(Error::InvalidArgument("path must be a non-empty string".to_string()));
    }
    Ok(())
}

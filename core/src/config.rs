//! Client configuration.
//!
//! # Design
//! `ClientConfig` is fixed once an [`ApiClient`](crate::ApiClient) is built and
//! is only ever read afterwards, so concurrent calls share it without locking.
//! It deserializes from the camelCase option names test suites already use,
//! which lets a suite keep its target in a JSON fixture or in the environment.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Default connection settings applied to every call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub use_tls: bool,
    pub host: String,
    /// `None` means the scheme's default port.
    pub port: Option<u16>,
    /// Prefix prepended verbatim to every call path.
    pub base_path: String,
    pub default_headers: BTreeMap<String, String>,
    /// Header expectations merged under every call's own expectations.
    pub expected_headers: BTreeMap<String, String>,
    pub default_status: Option<u16>,
    /// 0 leaves the transport's own behaviour in place.
    pub timeout_millis: u64,
    /// `user:password` for HTTP Basic authentication.
    pub auth: Option<String>,
    /// Log full request and response headers and bodies.
    pub debug: bool,
    /// Accept any server certificate. On by default so suites can target
    /// self-signed endpoints; never point such a client at an untrusted host.
    pub insecure_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            use_tls: false,
            host: "localhost".to_string(),
            port: None,
            base_path: String::new(),
            default_headers: BTreeMap::new(),
            expected_headers: BTreeMap::new(),
            default_status: None,
            timeout_millis: 0,
            auth: None,
            debug: false,
            insecure_tls: true,
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Build a config from `API_*` environment variables, keeping defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(host) = lookup("API_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            config.port = Some(parse_var("API_PORT", &port)?);
        }
        if let Some(base_path) = lookup("API_BASE_PATH") {
            config.base_path = base_path;
        }
        if let Some(tls) = lookup("API_TLS") {
            config.use_tls = parse_var("API_TLS", &tls)?;
        }
        if let Some(timeout) = lookup("API_TIMEOUT_MS") {
            config.timeout_millis = parse_var("API_TIMEOUT_MS", &timeout)?;
        }
        if let Some(auth) = lookup("API_AUTH") {
            config.auth = Some(auth);
        }
        Ok(config)
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }

    /// `scheme://host[:port]`.
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{port}", self.scheme(), self.host),
            None => format!("{}://{}", self.scheme(), self.host),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_millis > 0).then(|| Duration::from_millis(self.timeout_millis))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}={value:?} is not valid")))
}

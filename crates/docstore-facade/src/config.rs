//! Client configuration.
//!
//! Sources, from lowest to highest priority:
//!
//! 1. Default values
//! 2. Configuration file (`docstore.toml`)
//! 3. Environment variables (`FAUNA_*`, e.g. `FAUNA_SECRET`, `FAUNA_ENDPOINT`)

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default query endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://db.fauna.com";

/// Default configuration file name used by [`ClientConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "docstore.toml";

/// Connection settings for [`crate::FaunaClient`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server secret used as the bearer token.
    pub secret: String,
    /// Base URL of the query endpoint.
    pub endpoint: String,
    /// Overall HTTP request timeout, in seconds.
    pub timeout_secs: u64,
    /// TCP connect timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Server-side query timeout sent as `X-Query-Timeout`, in milliseconds.
    pub query_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
            query_timeout_ms: None,
        }
    }
}

// Keep the secret out of logs and panic messages.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a configuration with default settings and the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from `docstore.toml` and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    /// Loads configuration from a specific file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a source cannot be parsed.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("FAUNA_"));

        Ok(figment.extract()?)
    }

    /// Parses configuration from a TOML string, on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        Ok(figment.extract()?)
    }

    /// Sets the query endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the overall HTTP request timeout.
    ///
    /// The timeout is kept in whole seconds; a fractional part rounds up, so
    /// any positive duration stays positive.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self
    }

    /// Sets the server-side query timeout.
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Overall HTTP request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// TCP connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSecret`] for an unusable secret and
    /// [`Error::Config`] for any other invalid value.
    pub fn validate(&self) -> Result<()> {
        validate_secret(&self.secret)?;
        validate_endpoint(&self.endpoint)?;

        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.query_timeout_ms == Some(0) {
            return Err(Error::Config(
                "query_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checks that a secret can be sent as a bearer token.
///
/// # Errors
///
/// Returns [`Error::InvalidSecret`] if the secret is empty or contains
/// whitespace or non-printable characters.
pub fn validate_secret(secret: &str) -> Result<()> {
    if secret.is_empty() {
        return Err(Error::InvalidSecret("secret is empty".to_string()));
    }
    if let Some(pos) = secret.find(|c: char| !c.is_ascii_graphic()) {
        return Err(Error::InvalidSecret(format!(
            "secret contains an invalid character at byte {pos}"
        )));
    }
    Ok(())
}

/// Validates the endpoint URL scheme and shape.
///
/// # Errors
///
/// Returns [`Error::Config`] for anything but an `http` or `https` URL.
pub fn validate_endpoint(url: &str) -> Result<()> {
    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(Error::Config(format!(
            "Invalid endpoint scheme in '{url}'. Allowed: http, https"
        )));
    }

    let host = url.split_once("://").map_or("", |(_, rest)| rest);
    if host.trim_end_matches('/').is_empty() {
        return Err(Error::Config(format!("Invalid endpoint format: {url}")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

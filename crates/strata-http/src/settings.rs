//! Client settings
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `STRATA_HTTP_*` environment variables through [`ClientSettings::from_env`].

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use ::config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::client::BaseClient;
use crate::response::Response;

/// Base URL prepended to request paths
pub const ENV_BASE_URL: &str = "STRATA_HTTP_BASE_URL";
/// Default request timeout in milliseconds
pub const ENV_TIMEOUT_MS: &str = "STRATA_HTTP_TIMEOUT_MS";
/// Default headers as `name=value` pairs separated by commas
pub const ENV_HEADERS: &str = "STRATA_HTTP_HEADERS";
/// Wrap the client with the interceptor decorator
pub const ENV_USE_INTERCEPTOR: &str = "STRATA_HTTP_USE_INTERCEPTOR";
/// Wrap the client with the timeout decorator
pub const ENV_USE_TIMEOUT: &str = "STRATA_HTTP_USE_TIMEOUT";
/// Wrap the client with the error handler decorator
pub const ENV_USE_ERROR_HANDLER: &str = "STRATA_HTTP_USE_ERROR_HANDLER";
/// Timeout decorator guard in milliseconds
pub const ENV_DECORATOR_TIMEOUT_MS: &str = "STRATA_HTTP_DECORATOR_TIMEOUT_MS";

/// Settings a composed client is created from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL prepended to request paths
    pub base_url: String,
    /// Default request timeout in milliseconds, `0` for none
    pub timeout_ms: u64,
    /// Default headers
    pub headers: HashMap<String, String>,
    /// Wrap the client with the interceptor decorator
    pub use_interceptor: bool,
    /// Wrap the interceptor stack with the timeout decorator
    pub use_timeout: bool,
    /// Wrap the client with the error handler decorator
    pub use_error_handler: bool,
    /// Timeout decorator guard in milliseconds, `0` disables it
    pub decorator_timeout_ms: u64,
}

impl ClientSettings {
    /// Load settings from defaults overridden by `config_file`, if given
    pub fn load<P>(config_file: Option<P>) -> Response<Self>
    where
        P: Into<PathBuf>,
    {
        let default = Self::default();
        let mut builder = Config::builder().add_source(Config::try_from(&default)?);

        if let Some(path) = config_file {
            let path = path.into();
            tracing::debug!("Reading client settings from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Override fields from `STRATA_HTTP_*` environment variables
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env(mut self) -> Self {
        if let Ok(base_url) = env::var(ENV_BASE_URL) {
            self.base_url = base_url;
        }

        if let Ok(timeout) = env::var(ENV_TIMEOUT_MS) {
            if let Ok(timeout) = timeout.parse() {
                self.timeout_ms = timeout;
            }
        }

        if let Ok(headers) = env::var(ENV_HEADERS) {
            self.headers.extend(parse_headers(&headers));
        }

        if let Some(flag) = env_flag(ENV_USE_INTERCEPTOR) {
            self.use_interceptor = flag;
        }

        if let Some(flag) = env_flag(ENV_USE_TIMEOUT) {
            self.use_timeout = flag;
        }

        if let Some(flag) = env_flag(ENV_USE_ERROR_HANDLER) {
            self.use_error_handler = flag;
        }

        if let Ok(timeout) = env::var(ENV_DECORATOR_TIMEOUT_MS) {
            if let Ok(timeout) = timeout.parse() {
                self.decorator_timeout_ms = timeout;
            }
        }

        self
    }

    /// Apply the client defaults to `client`
    pub fn apply(&self, client: &BaseClient) -> Response<()> {
        let config = client
            .config()?
            .base_url(self.base_url.clone())
            .timeout(self.timeout_ms);
        let config = self
            .headers
            .iter()
            .fold(config, |config, (k, v)| config.header(k.clone(), v.clone()));
        client.set_config(config)?;
        Ok(())
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .and_then(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn parse_headers(raw: &str) -> impl Iterator<Item = (String, String)> + '_ {
    raw.split(',').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
    })
}

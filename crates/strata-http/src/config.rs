//! Per-request configuration

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::response::Response;
use crate::transport::AbortSignal;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// PATCH
    Patch,
}

impl Method {
    /// Every method
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Head,
        Method::Options,
        Method::Patch,
    ];

    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }

    /// Whether the method carries a JSON body
    ///
    /// GET, HEAD and OPTIONS send their data form encoded instead.
    pub fn has_json_body(&self) -> bool {
        !matches!(self, Method::Get | Method::Head | Method::Options)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// How the response body is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// JSON when the response declares a JSON content type, text otherwise
    #[default]
    Auto,
    /// Always parse as JSON
    Json,
    /// Always keep as text
    Text,
}

/// Query string parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// A query string that is already encoded, without the leading `?`
    Encoded(String),
    /// Key/value pairs, encoded in order
    Pairs(Vec<(String, String)>),
}

impl Params {
    /// Whether encoding would produce an empty query string
    pub fn is_empty(&self) -> bool {
        match self {
            Params::Encoded(query) => query.is_empty(),
            Params::Pairs(pairs) => pairs.is_empty(),
        }
    }

    /// Build pairs from the top-level members of a JSON object
    ///
    /// Strings are used as-is, other scalars through their JSON text. Nested
    /// values are rejected.
    pub fn from_value(value: &serde_json::Value) -> Response<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| HttpError::Serialization("params must be an object".into()))?;

        let mut pairs = Vec::with_capacity(object.len());
        for (key, value) in object {
            pairs.push((key.clone(), scalar_to_string(value)?));
        }
        Ok(Params::Pairs(pairs))
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Params
where
    K: Into<String>,
    V: ToString,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Params::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }
}

pub(crate) fn scalar_to_string(value: &serde_json::Value) -> Response<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => Ok(value.to_string()),
        _ => Err(HttpError::Serialization(
            "nested values cannot be form encoded".into(),
        )),
    }
}

/// Insert a header, dropping entries whose name matches `key` ignoring case
pub(crate) fn insert_header(headers: &mut HashMap<String, String>, key: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
    headers.insert(key, value);
}

/// Configuration for a single request
///
/// Unset fields fall back to the client defaults. Two configs combine with
/// [`RequestConfig::merged`], where fields set on the override win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Request path or absolute URL
    pub url: String,
    /// Request method
    pub method: Option<Method>,
    /// Request headers, overriding the client defaults key by key
    pub headers: HashMap<String, String>,
    /// Timeout in milliseconds, `0` disables it
    pub timeout: Option<u64>,
    /// Request body payload
    pub data: Option<serde_json::Value>,
    /// Query string parameters
    pub params: Option<Params>,
    /// Prefix prepended to `url`
    pub base_url: Option<String>,
    /// Whether cross-origin requests carry credentials
    pub with_credentials: Option<bool>,
    /// Response decoding hint
    pub response_type: Option<ResponseType>,
    /// Maximum accepted response body size in bytes
    pub max_content_length: Option<usize>,
    /// Cancels this request when triggered
    #[serde(skip)]
    pub abort: Option<AbortSignal>,
}

impl RequestConfig {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the url
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Add a header, replacing any earlier value whose name differs only in case
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.headers, key.into(), value.into());
        self
    }

    /// Set the timeout in milliseconds
    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    /// Set the body payload
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the body payload from any serializable value
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Response<Self> {
        Ok(self.data(serde_json::to_value(body)?))
    }

    /// Append one query parameter
    ///
    /// A pre-encoded query string set earlier is kept and extended.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let pair = (key.into(), value.to_string());
        self.params = Some(match self.params.take() {
            None => Params::Pairs(vec![pair]),
            Some(Params::Pairs(mut pairs)) => {
                pairs.push(pair);
                Params::Pairs(pairs)
            }
            Some(Params::Encoded(query)) => {
                let extra = serde_urlencoded::to_string([&pair]).unwrap_or_default();
                if query.is_empty() {
                    Params::Encoded(extra)
                } else {
                    Params::Encoded(format!("{query}&{extra}"))
                }
            }
        });
        self
    }

    /// Replace the query parameters
    pub fn params(mut self, params: impl Into<Params>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set whether credentials are sent
    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = Some(with_credentials);
        self
    }

    /// Set the response decoding hint
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Limit the accepted response body size
    pub fn max_content_length(mut self, limit: usize) -> Self {
        self.max_content_length = Some(limit);
        self
    }

    /// Attach an abort signal
    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    /// Combine with `overrides`, whose set fields win
    ///
    /// Headers are merged by case-insensitive name.
    pub fn merged(&self, overrides: &RequestConfig) -> RequestConfig {
        let mut headers = self.headers.clone();
        for (key, value) in &overrides.headers {
            insert_header(&mut headers, key.clone(), value.clone());
        }

        RequestConfig {
            url: if overrides.url.is_empty() {
                self.url.clone()
            } else {
                overrides.url.clone()
            },
            method: overrides.method.or(self.method),
            headers,
            timeout: overrides.timeout.or(self.timeout),
            data: overrides.data.clone().or_else(|| self.data.clone()),
            params: overrides.params.clone().or_else(|| self.params.clone()),
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
            with_credentials: overrides.with_credentials.or(self.with_credentials),
            response_type: overrides.response_type.or(self.response_type),
            max_content_length: overrides.max_content_length.or(self.max_content_length),
            abort: overrides.abort.clone().or_else(|| self.abort.clone()),
        }
    }
}

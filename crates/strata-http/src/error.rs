//! HTTP error types

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::capability::Capability;
use crate::transport::RequestId;

/// Status code reported for a request that exceeded its timeout
pub const TIMEOUT_STATUS: u16 = 408;

/// Status code reported for a transport-level failure
pub const TRANSPORT_FAILURE_STATUS: u16 = 502;

/// HTTP errors that can occur during requests
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// HTTP error with status code
    #[error("HTTP error ({status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Status text reported by the server
        message: String,
        /// Transport session that received the status
        request: Option<RequestId>,
    },
    /// Connection or network error
    #[error("Transport error: {message}")]
    Transport {
        /// Reason reported by the transport
        message: String,
        /// Transport session that failed
        request: Option<RequestId>,
    },
    /// Request timeout
    #[error("Timeout of {timeout_ms} ms exceeded")]
    Timeout {
        /// URL of the request that timed out
        url: String,
        /// Timeout that was exceeded
        timeout_ms: u64,
        /// Transport session that timed out, when one was opened
        request: Option<RequestId>,
    },
    /// Request cancelled through its abort signal
    #[error("Request aborted")]
    Aborted,
    /// The wrapped client does not support the operation
    #[error("{0} is not supported")]
    Unsupported(Capability),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Response body exceeded the configured limit
    #[error("Response body of {actual} bytes exceeds the limit of {limit} bytes")]
    BodyTooLarge {
        /// Configured maximum in bytes
        limit: usize,
        /// Received body size in bytes
        actual: usize,
        /// Transport session that received the body
        request: Option<RequestId>,
    },
    /// The effective URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Invalid client or decorator configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Proxy error
    #[error("Proxy error: {0}")]
    Proxy(String),
    /// Client build error
    #[error("Client build error: {0}")]
    Build(String),
    /// Other error
    #[error("{0}")]
    Other(String),
}

impl HttpError {
    /// Status code this error reports in its payload
    ///
    /// Timeouts map to 408 and transport failures to 502. Errors that never
    /// reached the network report 0.
    pub fn status_code(&self) -> u16 {
        match self {
            HttpError::Status { status, .. } => *status,
            HttpError::Timeout { .. } => TIMEOUT_STATUS,
            HttpError::Transport { .. } => TRANSPORT_FAILURE_STATUS,
            _ => 0,
        }
    }

    /// Transport session the error was raised for
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            HttpError::Status { request, .. }
            | HttpError::Transport { request, .. }
            | HttpError::Timeout { request, .. }
            | HttpError::BodyTooLarge { request, .. } => *request,
            _ => None,
        }
    }

    /// Record the session on errors raised after it was opened
    ///
    /// An id that is already set is kept.
    pub fn with_request(mut self, id: RequestId) -> Self {
        match &mut self {
            HttpError::Status { request, .. }
            | HttpError::Transport { request, .. }
            | HttpError::Timeout { request, .. }
            | HttpError::BodyTooLarge { request, .. } => {
                request.get_or_insert(id);
            }
            _ => {}
        }
        self
    }

    /// Project the error onto the structured payload shape
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            data: serde_json::Value::Object(Default::default()),
            status_code: self.status_code(),
            status_text: self.to_string(),
            headers: HashMap::new(),
            request: self.request_id(),
        }
    }

    /// Whether this error was produced by a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }

    /// Transport failure not yet tied to a session
    pub fn transport(message: impl Into<String>) -> Self {
        HttpError::Transport {
            message: message.into(),
            request: None,
        }
    }
}

/// Structured error payload surfaced to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Always an empty object
    pub data: serde_json::Value,
    /// Sentinel or HTTP status code
    pub status_code: u16,
    /// Human readable reason
    pub status_text: String,
    /// Always empty
    pub headers: HashMap<String, String>,
    /// Transport session that failed, when one was opened
    pub request: Option<RequestId>,
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            HttpError::Build(err.to_string())
        } else if let Some(status) = err.status() {
            HttpError::Status {
                status: status.as_u16(),
                message: err.to_string(),
                request: None,
            }
        } else {
            HttpError::Transport {
                message: err.to_string(),
                request: None,
            }
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Serialization(err.to_string())
    }
}

impl From<serde_urlencoded::ser::Error> for HttpError {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        HttpError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        HttpError::InvalidUrl(err.to_string())
    }
}

impl From<::config::ConfigError> for HttpError {
    fn from(err: ::config::ConfigError) -> Self {
        HttpError::Config(err.to_string())
    }
}

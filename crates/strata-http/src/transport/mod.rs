//! Transport primitive
//!
//! A [`Transport`] performs one network exchange per [`TransportRequest`]. The
//! request value carries everything the exchange needs (method, URL, headers,
//! body, timeout) and the returned future is the only place its outcome is
//! delivered, so concurrent requests through one transport never share state.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Method;
use crate::error::HttpError;

mod provider;
mod reqwest_transport;

pub use provider::TransportProvider;
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportBuilder};

/// Shared reference to a transport
pub type TransportHandle = Arc<dyn Transport>;

/// Identifier of one transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RequestId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cancels one request
///
/// Clones share the same underlying token.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    /// Create a signal that has not been triggered
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the signal
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Whether the signal was triggered
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal is triggered
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }

    /// A signal that fires when this one does, and can also fire on its own
    pub fn child(&self) -> AbortSignal {
        AbortSignal {
            token: self.token.child_token(),
        }
    }
}

/// Owned state of one transport session
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Session id
    pub id: RequestId,
    /// Request method
    pub method: Method,
    /// Fully resolved URL
    pub url: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Encoded body
    pub body: Option<Vec<u8>>,
    /// Transport level timeout
    pub timeout: Option<Duration>,
    /// Whether credentials are sent cross-origin
    pub with_credentials: bool,
    /// Largest response body the transport should buffer, in bytes
    pub max_content_length: Option<usize>,
}

impl TransportRequest {
    /// Start a session for `method` and `url`
    pub fn open(method: Method, url: impl Into<String>) -> Self {
        Self {
            id: RequestId::next(),
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            with_credentials: false,
            max_content_length: None,
        }
    }

    /// Set a header, replacing an earlier value for the same name
    pub fn set_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        self.headers.push((key, value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the transport level timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set whether credentials are sent
    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    /// Stop reading response bodies larger than `limit` bytes
    pub fn with_max_content_length(mut self, limit: Option<usize>) -> Self {
        self.max_content_length = limit;
        self
    }

    /// Look up a header, ignoring case
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Completed exchange
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    pub status_text: String,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Raw body
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Look up a header, ignoring case
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Why an exchange did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection or network failure
    #[error("{0}")]
    Network(String),
    /// The transport level timeout elapsed
    #[error("timed out")]
    Timeout,
    /// The session was cancelled
    #[error("aborted")]
    Aborted,
    /// The response body exceeded the session's limit
    #[error("response body of {actual} bytes exceeds {limit} bytes")]
    BodyTooLarge {
        /// Limit carried by the request
        limit: usize,
        /// Declared or received size when reading stopped
        actual: usize,
    },
}

impl TransportError {
    /// Convert into the client error for the session at `url`
    pub fn into_http_error(self, url: &str, timeout_ms: u64) -> HttpError {
        match self {
            TransportError::Network(message) => HttpError::Transport {
                message,
                request: None,
            },
            TransportError::Timeout => HttpError::Timeout {
                url: url.to_string(),
                timeout_ms,
                request: None,
            },
            TransportError::Aborted => HttpError::Aborted,
            TransportError::BodyTooLarge { limit, actual } => HttpError::BodyTooLarge {
                limit,
                actual,
                request: None,
            },
        }
    }
}

/// Performs network exchanges
#[async_trait::async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send the request and wait for its completion, error or timeout
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

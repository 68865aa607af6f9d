//! reqwest-based transport

use std::time::Duration;

use tracing::instrument;

use super::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::error::HttpError;
use crate::response::Response;

/// Transport backed by a pooled [`reqwest::Client`]
///
/// The client is only used to open connections; all per-request state is
/// carried by the [`TransportRequest`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Create a transport with default settings
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Create a transport builder
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Create a transport from an existing reqwest::Client
    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip_all, fields(id = %request.id, method = %request.method, url = %request.url))]
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .inner
            .request(request.method.into(), request.url.as_str());

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let mut response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = match request.max_content_length {
            Some(limit) => read_limited(&mut response, limit).await?,
            None => response.bytes().await.map_err(map_error)?.to_vec(),
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Read the body chunk by chunk, giving up as soon as it passes `limit`
async fn read_limited(
    response: &mut reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    if let Some(declared) = response.content_length() {
        let declared = usize::try_from(declared).unwrap_or(usize::MAX);
        if declared > limit {
            return Err(TransportError::BodyTooLarge {
                limit,
                actual: declared,
            });
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_error)? {
        body.extend_from_slice(&chunk);
        if body.len() > limit {
            return Err(TransportError::BodyTooLarge {
                limit,
                actual: body.len(),
            });
        }
    }
    Ok(body)
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        tracing::warn!("Transport error: {}", err);
        TransportError::Network(err.to_string())
    }
}

/// Builder for configuring proxy, TLS and connect timeout settings
#[derive(Debug, Default)]
pub struct ReqwestTransportBuilder {
    accept_invalid_certs: bool,
    proxy: Option<ProxyConfig>,
    connect_timeout: Option<Duration>,
}

#[derive(Debug)]
struct ProxyConfig {
    url: url::Url,
    matcher: Option<regex::Regex>,
}

impl ReqwestTransportBuilder {
    /// Accept invalid TLS certificates
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Route every request through a proxy
    pub fn proxy(mut self, url: url::Url) -> Self {
        self.proxy = Some(ProxyConfig { url, matcher: None });
        self
    }

    /// Route requests whose host matches `pattern` through a proxy
    pub fn proxy_with_matcher(mut self, url: url::Url, pattern: &str) -> Response<Self> {
        let matcher = regex::Regex::new(pattern)
            .map_err(|e| HttpError::Proxy(format!("Invalid proxy pattern: {}", e)))?;
        self.proxy = Some(ProxyConfig {
            url,
            matcher: Some(matcher),
        });
        Ok(self)
    }

    /// Bound the time spent establishing a connection
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the transport
    pub fn build(self) -> Response<ReqwestTransport> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(proxy_config) = self.proxy {
            let proxy_url = proxy_config.url.to_string();
            let proxy = if let Some(matcher) = proxy_config.matcher {
                reqwest::Proxy::custom(move |url| {
                    if matcher.is_match(url.host_str().unwrap_or("")) {
                        Some(proxy_url.clone())
                    } else {
                        None
                    }
                })
            } else {
                reqwest::Proxy::all(&proxy_url).map_err(|e| HttpError::Proxy(e.to_string()))?
            };
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(HttpError::from)?;
        Ok(ReqwestTransport { inner: client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_build() {
        let result = ReqwestTransportBuilder::default().build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_builder_accept_invalid_certs() {
        let result = ReqwestTransport::builder()
            .danger_accept_invalid_certs(true)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_builder_proxy() {
        let proxy_url = url::Url::parse("http://localhost:8080").expect("Valid proxy URL");
        let result = ReqwestTransport::builder().proxy(proxy_url).build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_builder_proxy_with_valid_matcher() {
        let proxy_url = url::Url::parse("http://localhost:8080").expect("Valid proxy URL");
        let builder = ReqwestTransport::builder()
            .proxy_with_matcher(proxy_url, r".*\.example\.com$")
            .expect("Valid matcher should succeed");
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_builder_proxy_with_invalid_matcher() {
        let proxy_url = url::Url::parse("http://localhost:8080").expect("Valid proxy URL");
        let result = ReqwestTransport::builder().proxy_with_matcher(proxy_url, r"[invalid");

        match result {
            Err(HttpError::Proxy(msg)) => assert!(msg.contains("Invalid proxy pattern")),
            other => panic!("Expected HttpError::Proxy, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_connect_timeout() {
        let result = ReqwestTransport::builder()
            .connect_timeout(Duration::from_secs(3))
            .build();
        assert!(result.is_ok());
    }
}

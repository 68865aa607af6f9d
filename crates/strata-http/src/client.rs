//! Base request client
//!
//! [`BaseClient`] turns a [`RequestConfig`] into one [`TransportRequest`] per
//! call. The client defaults (headers, timeout, base URL) are snapshotted when
//! a call starts, so changing them never affects a request already in flight,
//! and every call owns its transport session.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::instrument;

use crate::capability::Capabilities;
use crate::config::{insert_header, Method, RequestConfig, ResponseType};
use crate::error::HttpError;
use crate::query::{effective_url, form_encode, is_empty_object};
use crate::request::Request;
use crate::response::{HttpResponse, Response};
use crate::transport::{
    AbortSignal, TransportError, TransportHandle, TransportProvider, TransportRequest,
    TransportResponse,
};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Decides which status codes count as success for a verb
#[derive(Clone, Default)]
pub enum SuccessPredicate {
    /// Any status in `200..300`
    #[default]
    Range2xx,
    /// Exactly this status
    Exactly(u16),
    /// A custom test
    Custom(Arc<dyn Fn(u16) -> bool + Send + Sync>),
}

impl SuccessPredicate {
    /// Whether `status` is accepted
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            SuccessPredicate::Range2xx => (200..300).contains(&status),
            SuccessPredicate::Exactly(expected) => status == *expected,
            SuccessPredicate::Custom(f) => f(status),
        }
    }
}

impl fmt::Debug for SuccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessPredicate::Range2xx => f.write_str("Range2xx"),
            SuccessPredicate::Exactly(status) => f.debug_tuple("Exactly").field(status).finish(),
            SuccessPredicate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn default_success_predicates() -> HashMap<Method, SuccessPredicate> {
    // HEAD and OPTIONS historically only accept a plain 200
    Method::ALL
        .into_iter()
        .map(|method| {
            let predicate = match method {
                Method::Head | Method::Options => SuccessPredicate::Exactly(200),
                _ => SuccessPredicate::Range2xx,
            };
            (method, predicate)
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
struct Defaults {
    base_url: String,
    headers: HashMap<String, String>,
    timeout_ms: u64,
    response_type: ResponseType,
    with_credentials: bool,
    max_content_length: Option<usize>,
}

/// Client that sends requests directly through a transport
#[derive(Debug, Clone)]
pub struct BaseClient {
    transport: TransportHandle,
    defaults: Arc<RwLock<Defaults>>,
    success: Arc<HashMap<Method, SuccessPredicate>>,
}

impl Default for BaseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseClient {
    /// Create a client on the shared transport
    pub fn new() -> Self {
        Self::with_transport(TransportProvider::instance())
    }

    /// Create a client on a specific transport
    pub fn with_transport(transport: TransportHandle) -> Self {
        BaseClientBuilder::default().transport(transport).build()
    }

    /// Create a client builder
    pub fn builder() -> BaseClientBuilder {
        BaseClientBuilder::default()
    }

    fn snapshot(&self) -> Response<Defaults> {
        self.defaults
            .read()
            .map(|defaults| defaults.clone())
            .map_err(|_| HttpError::Other("client defaults lock poisoned".into()))
    }

    fn update<F>(&self, f: F) -> Response<()>
    where
        F: FnOnce(&mut Defaults),
    {
        let mut defaults = self
            .defaults
            .write()
            .map_err(|_| HttpError::Other("client defaults lock poisoned".into()))?;
        f(&mut defaults);
        Ok(())
    }

    /// Current defaults, expressed as a request config
    pub fn config(&self) -> Response<RequestConfig> {
        let defaults = self.snapshot()?;
        Ok(RequestConfig {
            base_url: Some(defaults.base_url),
            headers: defaults.headers,
            timeout: Some(defaults.timeout_ms),
            response_type: Some(defaults.response_type),
            with_credentials: Some(defaults.with_credentials),
            max_content_length: defaults.max_content_length,
            ..Default::default()
        })
    }

    /// Replace the defaults with the fields set on `config`
    ///
    /// Headers are replaced as a whole. Unset fields keep their value.
    pub fn set_config(&self, config: RequestConfig) -> Response<&Self> {
        self.update(|defaults| {
            if let Some(base_url) = config.base_url {
                defaults.base_url = base_url;
            }
            defaults.headers.clear();
            for (key, value) in config.headers {
                insert_header(&mut defaults.headers, key, value);
            }
            if let Some(timeout) = config.timeout {
                defaults.timeout_ms = timeout;
            }
            if let Some(response_type) = config.response_type {
                defaults.response_type = response_type;
            }
            if let Some(with_credentials) = config.with_credentials {
                defaults.with_credentials = with_credentials;
            }
            if config.max_content_length.is_some() {
                defaults.max_content_length = config.max_content_length;
            }
        })?;
        Ok(self)
    }

    /// Default base URL
    pub fn base_url(&self) -> Response<String> {
        Ok(self.snapshot()?.base_url)
    }

    /// Cancel the request that carries `signal`
    pub fn abort(&self, signal: &AbortSignal) {
        tracing::debug!("Aborting request");
        signal.abort();
    }

    /// Success predicate used for `method`
    pub fn success_predicate(&self, method: Method) -> SuccessPredicate {
        self.success.get(&method).cloned().unwrap_or_default()
    }

    #[instrument(skip_all, fields(method = %method, url = %url))]
    async fn execute(
        &self,
        method: Method,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Response {
        let config = config.unwrap_or_default();
        let defaults = self.snapshot()?;

        let path = if url.is_empty() { config.url.as_str() } else { url };
        if path.is_empty() {
            return Err(HttpError::InvalidUrl("empty url".into()));
        }
        let base_url = config.base_url.as_deref().unwrap_or(&defaults.base_url);
        let target = resolve_url(effective_url(base_url, path, config.params.as_ref())?)?;

        let timeout_ms = config.timeout.unwrap_or(defaults.timeout_ms);
        let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let limit = config.max_content_length.or(defaults.max_content_length);
        let mut request = TransportRequest::open(method, target.clone())
            .with_timeout(timeout)
            .with_credentials(config.with_credentials.unwrap_or(defaults.with_credentials))
            .with_max_content_length(limit);
        // defaults first so per-call headers replace them whatever the case
        for (key, value) in defaults.headers.into_iter().chain(config.headers) {
            request = request.set_header(key, value);
        }
        if let Some(data) = config.data.as_ref().filter(|d| !d.is_null()) {
            request = encode_body(request, method, data)?;
        }

        let id = request.id;
        let signal = config.abort.unwrap_or_default();
        tracing::debug!("Sending request {}", id);

        let outcome = tokio::select! {
            _ = signal.aborted() => Err(TransportError::Aborted),
            outcome = self.send(request, timeout) => outcome,
        };
        let response = outcome.map_err(|err| {
            tracing::warn!("Request {} failed: {}", id, err);
            err.into_http_error(&target, timeout_ms).with_request(id)
        })?;

        if let Some(limit) = limit.filter(|limit| response.body.len() > *limit) {
            return Err(HttpError::BodyTooLarge {
                limit,
                actual: response.body.len(),
                request: Some(id),
            });
        }

        if !self.success_predicate(method).accepts(response.status) {
            tracing::warn!("Request {} rejected with status {}", id, response.status);
            return Err(HttpError::Status {
                status: response.status,
                message: response.status_text,
                request: Some(id),
            });
        }

        let response_type = config.response_type.unwrap_or(defaults.response_type);
        let data = decode_body(&response, response_type)?;
        Ok(HttpResponse {
            data,
            status_code: response.status,
            status_text: response.status_text,
            headers: response.headers,
            request: Some(id),
            error: None,
        })
    }

    async fn send(
        &self,
        request: TransportRequest,
        timeout: Option<Duration>,
    ) -> Result<TransportResponse, TransportError> {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.send(request))
                .await
                .unwrap_or(Err(TransportError::Timeout)),
            None => self.transport.send(request).await,
        }
    }
}

/// Validate the effective URL, giving protocol-relative URLs an https scheme
fn resolve_url(url: String) -> Response<String> {
    let url = if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url
    };
    url::Url::parse(&url)?;
    Ok(url)
}

fn encode_body(
    request: TransportRequest,
    method: Method,
    data: &serde_json::Value,
) -> Response<TransportRequest> {
    let has_content_type = request.header("Content-Type").is_some();
    if method.has_json_body() {
        let body = serde_json::to_vec(data)?;
        let request = if has_content_type {
            request
        } else {
            request.set_header("Content-Type", JSON_CONTENT_TYPE)
        };
        Ok(request.with_body(body))
    } else {
        if is_empty_object(Some(data)) {
            return Ok(request);
        }
        let body = form_encode(data)?;
        if body.is_empty() {
            return Ok(request);
        }
        let request = if has_content_type {
            request
        } else {
            request.set_header("Content-Type", FORM_CONTENT_TYPE)
        };
        Ok(request.with_body(body))
    }
}

fn decode_body(
    response: &TransportResponse,
    response_type: ResponseType,
) -> Response<serde_json::Value> {
    if response.body.is_empty() {
        return Ok(serde_json::Value::Null);
    }

    let is_json = match response_type {
        ResponseType::Json => true,
        ResponseType::Text => false,
        ResponseType::Auto => response
            .header("content-type")
            .map(|ct| ct.contains("json"))
            .unwrap_or(false),
    };

    if is_json {
        serde_json::from_slice(&response.body).map_err(|err| {
            tracing::warn!("Http Response error: {}", err);
            HttpError::from(err)
        })
    } else {
        Ok(serde_json::Value::String(
            String::from_utf8_lossy(&response.body).into_owned(),
        ))
    }
}

#[async_trait::async_trait]
impl Request for BaseClient {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    async fn get(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.execute(Method::Get, url, config).await
    }

    async fn post(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.execute(Method::Post, url, config).await
    }

    async fn put(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.execute(Method::Put, url, config).await
    }

    async fn delete(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.execute(Method::Delete, url, config).await
    }

    async fn head(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.execute(Method::Head, url, config).await
    }

    async fn options(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.execute(Method::Options, url, config).await
    }

    async fn patch(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.execute(Method::Patch, url, config).await
    }

    async fn request(&self, config: RequestConfig) -> Response {
        let method = config.method.unwrap_or_default();
        self.execute(method, "", Some(config)).await
    }

    fn set_header(&self, key: &str, value: &str) -> Response<&dyn Request> {
        self.update(|defaults| {
            insert_header(&mut defaults.headers, key.to_string(), value.to_string());
        })?;
        Ok(self)
    }

    fn set_headers(&self, headers: &HashMap<String, String>) -> Response<&dyn Request> {
        self.update(|defaults| {
            for (key, value) in headers {
                insert_header(&mut defaults.headers, key.clone(), value.clone());
            }
        })?;
        Ok(self)
    }

    fn set_timeout(&self, ms: u64) -> Response<&dyn Request> {
        self.update(|defaults| defaults.timeout_ms = ms)?;
        Ok(self)
    }

    fn transport_handle(&self) -> Option<TransportHandle> {
        Some(self.transport.clone())
    }
}

/// Builder for [`BaseClient`]
#[derive(Debug)]
pub struct BaseClientBuilder {
    transport: Option<TransportHandle>,
    defaults: Defaults,
    success: HashMap<Method, SuccessPredicate>,
}

impl Default for BaseClientBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            defaults: Defaults::default(),
            success: default_success_predicates(),
        }
    }
}

impl BaseClientBuilder {
    /// Use a specific transport instead of the shared one
    pub fn transport(mut self, transport: TransportHandle) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Default base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.defaults.base_url = base_url.into();
        self
    }

    /// Default timeout in milliseconds, `0` disables it
    pub fn timeout(mut self, ms: u64) -> Self {
        self.defaults.timeout_ms = ms;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.defaults.headers, key.into(), value.into());
        self
    }

    /// Add several default headers
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        for (key, value) in headers {
            insert_header(&mut self.defaults.headers, key, value);
        }
        self
    }

    /// Default response decoding
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.defaults.response_type = response_type;
        self
    }

    /// Default credentials flag
    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.defaults.with_credentials = with_credentials;
        self
    }

    /// Default response body limit in bytes
    pub fn max_content_length(mut self, limit: usize) -> Self {
        self.defaults.max_content_length = Some(limit);
        self
    }

    /// Override the success test for one verb
    pub fn success_predicate(mut self, method: Method, predicate: SuccessPredicate) -> Self {
        self.success.insert(method, predicate);
        self
    }

    /// Build the client
    pub fn build(self) -> BaseClient {
        BaseClient {
            transport: self.transport.unwrap_or_else(TransportProvider::instance),
            defaults: Arc::new(RwLock::new(self.defaults)),
            success: Arc::new(self.success),
        }
    }
}

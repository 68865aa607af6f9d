//! Error observation

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::{read_shared, write_shared};
use crate::capability::{Capabilities, Capability};
use crate::client::BaseClient;
use crate::config::{Method, RequestConfig};
use crate::error::HttpError;
use crate::request::{require, Request};
use crate::response::{HttpResponse, Response};
use crate::transport::TransportHandle;

/// Called once with every error a wrapped call fails with
pub type ErrorHandler = Arc<dyn Fn(&HttpError) + Send + Sync>;

/// What a failed call returns after the handler has run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Resolve with an [`HttpResponse`] carrying the error
    #[default]
    ErrorsAsValues,
    /// Return the error unchanged
    Propagate,
}

/// Decorator that reports failures to a handler
pub struct ErrorHandlerDecorator<R = BaseClient> {
    inner: R,
    handler: RwLock<ErrorHandler>,
    mode: ErrorMode,
}

impl<R: fmt::Debug> fmt::Debug for ErrorHandlerDecorator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerDecorator")
            .field("inner", &self.inner)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<R: Request> ErrorHandlerDecorator<R> {
    /// Wrap `inner` with a no-op handler in errors-as-values mode
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            handler: RwLock::new(Arc::new(|_| {})),
            mode: ErrorMode::default(),
        }
    }

    /// Use `mode` for failed calls
    pub fn with_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    /// The wrapped client
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Current mode
    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Replace the handler
    pub fn set_error_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&HttpError) + Send + Sync + 'static,
    {
        write_shared(&self.handler, "error handler", |current| {
            *current = Arc::new(handler)
        });
        self
    }

    fn settle(&self, result: Response) -> Response {
        let error = match result {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        tracing::debug!("Wrapped call failed: {}", error);
        let handler = match read_shared(&self.handler, "error handler") {
            Ok(handler) => handler,
            Err(lock_error) => {
                tracing::warn!("Unreported failure: {}", error);
                return Err(lock_error);
            }
        };
        handler(&error);

        match self.mode {
            ErrorMode::ErrorsAsValues => Ok(HttpResponse::from_error(error)),
            ErrorMode::Propagate => Err(error),
        }
    }

    async fn observed(&self, method: Method, url: &str, config: Option<RequestConfig>) -> Response {
        require(&self.inner, method.into())?;
        let result = self.inner.dispatch(method, url, config).await;
        self.settle(result)
    }
}

#[async_trait::async_trait]
impl<R: Request> Request for ErrorHandlerDecorator<R> {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn get(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.observed(Method::Get, url, config).await
    }

    async fn post(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.observed(Method::Post, url, config).await
    }

    async fn put(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.observed(Method::Put, url, config).await
    }

    async fn delete(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.observed(Method::Delete, url, config).await
    }

    async fn head(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.observed(Method::Head, url, config).await
    }

    async fn options(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.observed(Method::Options, url, config).await
    }

    async fn patch(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.observed(Method::Patch, url, config).await
    }

    async fn request(&self, config: RequestConfig) -> Response {
        require(&self.inner, Capability::Request)?;
        let result = self.inner.request(config).await;
        self.settle(result)
    }

    fn set_header(&self, key: &str, value: &str) -> Response<&dyn Request> {
        self.inner.set_header(key, value)?;
        Ok(self)
    }

    fn set_headers(&self, headers: &HashMap<String, String>) -> Response<&dyn Request> {
        self.inner.set_headers(headers)?;
        Ok(self)
    }

    fn set_timeout(&self, ms: u64) -> Response<&dyn Request> {
        self.inner.set_timeout(ms)?;
        Ok(self)
    }

    fn transport_handle(&self) -> Option<TransportHandle> {
        self.inner.transport_handle()
    }
}

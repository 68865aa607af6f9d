//! Request/response interception

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::{read_shared, write_shared};
use crate::capability::{Capabilities, Capability};
use crate::client::BaseClient;
use crate::config::{Method, RequestConfig};
use crate::error::HttpError;
use crate::request::{require, Request};
use crate::response::{HttpResponse, Response};
use crate::transport::TransportHandle;

/// Transforms the effective config before it is forwarded
pub type RequestInterceptor = Arc<dyn Fn(RequestConfig) -> RequestConfig + Send + Sync>;

/// Transforms a successful response before it is returned
pub type ResponseInterceptor = Arc<dyn Fn(HttpResponse) -> HttpResponse + Send + Sync>;

/// Turns a failure of the wrapped client into the call's outcome
pub type ResponseErrorInterceptor = Arc<dyn Fn(HttpError) -> Response + Send + Sync>;

/// Decorator that runs interceptors around every call
///
/// Each call merges its url and config into the base config, passes the
/// result through the request interceptor, forwards it to the wrapped
/// client's matching verb and passes the response through the response
/// interceptor. Failures of the wrapped client go to the response error
/// interceptor when one is set and are returned untouched otherwise.
pub struct InterceptorDecorator<R = BaseClient> {
    inner: R,
    request_interceptor: RwLock<RequestInterceptor>,
    response_interceptor: RwLock<ResponseInterceptor>,
    error_interceptor: RwLock<Option<ResponseErrorInterceptor>>,
    base: RwLock<RequestConfig>,
}

impl<R: fmt::Debug> fmt::Debug for InterceptorDecorator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorDecorator")
            .field("inner", &self.inner)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl<R: Request> InterceptorDecorator<R> {
    /// Wrap `inner` with identity interceptors and an empty base config
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            request_interceptor: RwLock::new(Arc::new(|config| config)),
            response_interceptor: RwLock::new(Arc::new(|response| response)),
            error_interceptor: RwLock::new(None),
            base: RwLock::new(RequestConfig::default()),
        }
    }

    /// The wrapped client
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Replace the request interceptor
    pub fn set_request_interceptor<F>(&self, interceptor: F) -> &Self
    where
        F: Fn(RequestConfig) -> RequestConfig + Send + Sync + 'static,
    {
        write_shared(&self.request_interceptor, "request interceptor", |current| {
            *current = Arc::new(interceptor)
        });
        self
    }

    /// Replace the response interceptor
    pub fn set_response_interceptor<F>(&self, interceptor: F) -> &Self
    where
        F: Fn(HttpResponse) -> HttpResponse + Send + Sync + 'static,
    {
        write_shared(&self.response_interceptor, "response interceptor", |current| {
            *current = Arc::new(interceptor)
        });
        self
    }

    /// Replace the response error interceptor
    ///
    /// It receives every error the wrapped client fails with and decides
    /// the outcome of the call, recovering with a response or returning an
    /// error. Capability checks done by this decorator never reach it.
    pub fn set_response_error_interceptor<F>(&self, interceptor: F) -> &Self
    where
        F: Fn(HttpError) -> Response + Send + Sync + 'static,
    {
        let interceptor: ResponseErrorInterceptor = Arc::new(interceptor);
        write_shared(&self.error_interceptor, "response error interceptor", |current| {
            *current = Some(interceptor)
        });
        self
    }

    /// Merge `config` into the base config
    pub fn set_config(&self, config: RequestConfig) -> &Self {
        write_shared(&self.base, "interceptor config", |base| {
            *base = base.merged(&config)
        });
        self
    }

    /// The accumulated base config
    pub fn config(&self) -> Response<RequestConfig> {
        read_shared(&self.base, "interceptor config")
    }

    /// Build the config a call forwards
    fn effective_config(&self, url: &str, config: Option<RequestConfig>) -> Response<RequestConfig> {
        let mut overrides = config.unwrap_or_default();
        if !url.is_empty() {
            overrides.url = url.to_string();
        }
        let merged = self.config()?.merged(&overrides);

        let interceptor = read_shared(&self.request_interceptor, "request interceptor")?;
        Ok(interceptor(merged))
    }

    fn finish(&self, result: Response) -> Response {
        match result {
            Ok(response) => {
                let interceptor = read_shared(&self.response_interceptor, "response interceptor")?;
                Ok(interceptor(response))
            }
            Err(error) => {
                let interceptor =
                    read_shared(&self.error_interceptor, "response error interceptor")?;
                match interceptor {
                    Some(interceptor) => {
                        tracing::debug!("Response error intercepted: {}", error);
                        interceptor(error)
                    }
                    None => Err(error),
                }
            }
        }
    }

    async fn intercept(&self, method: Method, url: &str, config: Option<RequestConfig>) -> Response {
        require(&self.inner, method.into())?;
        let config = self.effective_config(url, config)?;
        let url = config.url.clone();
        tracing::debug!("Intercepted {} {}", method, url);
        let result = self.inner.dispatch(method, &url, Some(config)).await;
        self.finish(result)
    }
}

#[async_trait::async_trait]
impl<R: Request> Request for InterceptorDecorator<R> {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn get(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.intercept(Method::Get, url, config).await
    }

    async fn post(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.intercept(Method::Post, url, config).await
    }

    async fn put(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.intercept(Method::Put, url, config).await
    }

    async fn delete(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.intercept(Method::Delete, url, config).await
    }

    async fn head(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.intercept(Method::Head, url, config).await
    }

    async fn options(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.intercept(Method::Options, url, config).await
    }

    async fn patch(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.intercept(Method::Patch, url, config).await
    }

    async fn request(&self, config: RequestConfig) -> Response {
        require(&self.inner, Capability::Request)?;
        let config = self.effective_config("", Some(config))?;
        let result = self.inner.request(config).await;
        self.finish(result)
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

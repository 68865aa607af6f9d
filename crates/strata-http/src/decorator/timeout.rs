//! Per-call timeout guard

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{read_shared, write_shared};
use crate::capability::{Capabilities, Capability};
use crate::client::BaseClient;
use crate::config::{Method, RequestConfig};
use crate::decorator::InterceptorDecorator;
use crate::error::HttpError;
use crate::request::{require, Request};
use crate::response::Response;
use crate::transport::{AbortSignal, TransportHandle};

/// Called with the request URL when a guarded call times out
pub type TimeoutHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Decorator that races every call against a timer
///
/// With a configured timeout `t > 0`, a call that has not settled after
/// `t` ms is cancelled, the handler runs once with the request URL and the
/// call fails with [`HttpError::Timeout`]. A timeout of `0` disables the
/// guard.
pub struct TimeoutDecorator<R = InterceptorDecorator<BaseClient>> {
    inner: R,
    timeout_ms: AtomicU64,
    handler: RwLock<TimeoutHandler>,
}

impl<R: fmt::Debug> fmt::Debug for TimeoutDecorator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutDecorator")
            .field("inner", &self.inner)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl<R: Request> TimeoutDecorator<R> {
    /// Wrap `inner` with the guard disabled
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            timeout_ms: AtomicU64::new(0),
            handler: RwLock::new(Arc::new(|_| {})),
        }
    }

    /// The wrapped client
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Set the guard timeout and the handler run when it fires
    pub fn timeout<F>(&self, ms: u64, handler: F) -> &Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.timeout_ms.store(ms, Ordering::SeqCst);
        write_shared(&self.handler, "timeout handler", |current| {
            *current = Arc::new(handler)
        });
        self
    }

    /// Configured guard timeout in milliseconds, `0` when disabled
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::SeqCst)
    }

    async fn guard<F, Fut>(&self, url: &str, config: Option<RequestConfig>, call: F) -> Response
    where
        F: FnOnce(Option<RequestConfig>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let ms = self.timeout_ms();
        if ms == 0 {
            return call(config).await;
        }

        let handler = read_shared(&self.handler, "timeout handler")?;

        let mut config = config.unwrap_or_default();
        let signal = config
            .abort
            .as_ref()
            .map(AbortSignal::child)
            .unwrap_or_default();
        config.abort = Some(signal.clone());

        tokio::select! {
            result = call(Some(config)) => result,
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                signal.abort();
                tracing::warn!("Request to {} timed out after {} ms", url, ms);
                handler(url);
                Err(HttpError::Timeout {
                    url: url.to_string(),
                    timeout_ms: ms,
                    request: None,
                })
            }
        }
    }

    async fn guarded(&self, method: Method, url: &str, config: Option<RequestConfig>) -> Response {
        require(&self.inner, method.into())?;
        self.guard(url, config, |config| self.inner.dispatch(method, url, config))
            .await
    }
}

#[async_trait::async_trait]
impl<R: Request> Request for TimeoutDecorator<R> {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn get(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.guarded(Method::Get, url, config).await
    }

    async fn post(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.guarded(Method::Post, url, config).await
    }

    async fn put(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.guarded(Method::Put, url, config).await
    }

    async fn delete(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.guarded(Method::Delete, url, config).await
    }

    async fn head(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.guarded(Method::Head, url, config).await
    }

    async fn options(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.guarded(Method::Options, url, config).await
    }

    async fn patch(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.guarded(Method::Patch, url, config).await
    }

    async fn request(&self, config: RequestConfig) -> Response {
        require(&self.inner, Capability::Request)?;
        let url = config.url.clone();
        self.guard(&url, Some(config), |config| {
            self.inner.request(config.unwrap_or_default())
        })
        .await
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

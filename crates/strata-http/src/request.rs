//! The request capability interface

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::capability::{Capabilities, Capability};
use crate::config::{Method, RequestConfig};
use crate::error::HttpError;
use crate::response::Response;
use crate::transport::TransportHandle;

/// Interface shared by the base client and every decorator
///
/// Only `get` and `post` are required. Every other member has a default
/// implementation that fails with [`HttpError::Unsupported`], and
/// [`Request::capabilities`] reports which members are really provided.
/// Setters return the receiver so calls can be chained.
#[async_trait::async_trait]
pub trait Request: Send + Sync + Debug {
    /// Members this implementor supports
    fn capabilities(&self) -> Capabilities;

    /// GET request
    async fn get(&self, url: &str, config: Option<RequestConfig>) -> Response;

    /// POST request
    async fn post(&self, url: &str, config: Option<RequestConfig>) -> Response;

    /// PUT request
    async fn put(&self, _url: &str, _config: Option<RequestConfig>) -> Response {
        Err(HttpError::Unsupported(Capability::Put))
    }

    /// DELETE request
    async fn delete(&self, _url: &str, _config: Option<RequestConfig>) -> Response {
        Err(HttpError::Unsupported(Capability::Delete))
    }

    /// HEAD request
    async fn head(&self, _url: &str, _config: Option<RequestConfig>) -> Response {
        Err(HttpError::Unsupported(Capability::Head))
    }

    /// OPTIONS request
    async fn options(&self, _url: &str, _config: Option<RequestConfig>) -> Response {
        Err(HttpError::Unsupported(Capability::Options))
    }

    /// PATCH request
    async fn patch(&self, _url: &str, _config: Option<RequestConfig>) -> Response {
        Err(HttpError::Unsupported(Capability::Patch))
    }

    /// Request described entirely by `config`, GET when no method is set
    async fn request(&self, _config: RequestConfig) -> Response {
        Err(HttpError::Unsupported(Capability::Request))
    }

    /// Set one default header
    fn set_header(&self, _key: &str, _value: &str) -> Response<&dyn Request> {
        Err(HttpError::Unsupported(Capability::SetHeader))
    }

    /// Set several default headers
    fn set_headers(&self, _headers: &HashMap<String, String>) -> Response<&dyn Request> {
        Err(HttpError::Unsupported(Capability::SetHeaders))
    }

    /// Set the default timeout in milliseconds
    fn set_timeout(&self, _ms: u64) -> Response<&dyn Request> {
        Err(HttpError::Unsupported(Capability::SetTimeout))
    }

    /// The shared transport handle, for layers that need low-level access
    fn transport_handle(&self) -> Option<TransportHandle> {
        None
    }

    /// Call the verb method matching `method`
    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        config: Option<RequestConfig>,
    ) -> Response {
        match method {
            Method::Get => self.get(url, config).await,
            Method::Post => self.post(url, config).await,
            Method::Put => self.put(url, config).await,
            Method::Delete => self.delete(url, config).await,
            Method::Head => self.head(url, config).await,
            Method::Options => self.options(url, config).await,
            Method::Patch => self.patch(url, config).await,
        }
    }
}

macro_rules! forward_request {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl<T: Request + ?Sized> Request for $ty {
            fn capabilities(&self) -> Capabilities {
                (**self).capabilities()
            }

            async fn get(&self, url: &str, config: Option<RequestConfig>) -> Response {
                (**self).get(url, config).await
            }

            async fn post(&self, url: &str, config: Option<RequestConfig>) -> Response {
                (**self).post(url, config).await
            }

            async fn put(&self, url: &str, config: Option<RequestConfig>) -> Response {
                (**self).put(url, config).await
            }

            async fn delete(&self, url: &str, config: Option<RequestConfig>) -> Response {
                (**self).delete(url, config).await
            }

            async fn head(&self, url: &str, config: Option<RequestConfig>) -> Response {
                (**self).head(url, config).await
            }

            async fn options(&self, url: &str, config: Option<RequestConfig>) -> Response {
                (**self).options(url, config).await
            }

            async fn patch(&self, url: &str, config: Option<RequestConfig>) -> Response {
                (**self).patch(url, config).await
            }

            async fn request(&self, config: RequestConfig) -> Response {
                (**self).request(config).await
            }

            fn set_header(&self, key: &str, value: &str) -> Response<&dyn Request> {
                (**self).set_header(key, value)
            }

            fn set_headers(&self, headers: &HashMap<String, String>) -> Response<&dyn Request> {
                (**self).set_headers(headers)
            }

            fn set_timeout(&self, ms: u64) -> Response<&dyn Request> {
                (**self).set_timeout(ms)
            }

            fn transport_handle(&self) -> Option<TransportHandle> {
                (**self).transport_handle()
            }
        }
    };
}

forward_request!(Box<T>);
forward_request!(Arc<T>);

/// Fail with [`HttpError::Unsupported`] unless `inner` provides `capability`
pub(crate) fn require<R: Request + ?Sized>(inner: &R, capability: Capability) -> Response<()> {
    if inner.capabilities().supports(capability) {
        Ok(())
    } else {
        tracing::debug!("Wrapped client does not support {}", capability);
        Err(HttpError::Unsupported(capability))
    }
}

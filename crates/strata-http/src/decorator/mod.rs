//! Request decorators
//!
//! Every decorator wraps another [`Request`] implementor, implements the
//! same interface and adds one behavior. Decorators check the wrapped
//! client's capabilities before forwarding and fail with
//! [`HttpError::Unsupported`](crate::HttpError::Unsupported) for members it
//! lacks.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::capability::Capabilities;
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;

mod error_handler;
mod interceptor;
mod timeout;

pub use error_handler::{ErrorHandler, ErrorHandlerDecorator, ErrorMode};
pub use interceptor::{
    InterceptorDecorator, RequestInterceptor, ResponseErrorInterceptor, ResponseInterceptor,
};
pub use timeout::{TimeoutDecorator, TimeoutHandler};

/// Clone the value behind `lock`
fn read_shared<T: Clone>(lock: &RwLock<T>, what: &str) -> Response<T> {
    lock.read()
        .map(|value| value.clone())
        .map_err(|_| HttpError::Other(format!("{what} lock poisoned")))
}

/// Mutate the value behind `lock`
///
/// A lock poisoned by a panicking writer is recovered and cleared, since
/// every write leaves a complete value behind.
fn write_shared<T>(lock: &RwLock<T>, what: &str, f: impl FnOnce(&mut T)) {
    let mut value = lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovering poisoned {} lock", what);
        poisoned.into_inner()
    });
    f(&mut *value);
    drop(value);
    lock.clear_poison();
}

/// A wrapping step usable in a custom composition
pub trait Decorator: Send + Sync + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Capabilities the wrapped client must provide
    fn requires(&self) -> Capabilities {
        Capabilities::REQUIRED
    }

    /// Wrap `inner`
    fn decorate(&self, inner: Box<dyn Request>) -> Box<dyn Request>;
}

type WrapFn = Arc<dyn Fn(Box<dyn Request>) -> Box<dyn Request> + Send + Sync>;

/// [`Decorator`] backed by a closure
#[derive(Clone)]
pub struct FnDecorator {
    name: String,
    requires: Capabilities,
    wrap: WrapFn,
}

impl fmt::Debug for FnDecorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDecorator")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

impl FnDecorator {
    /// Decorator named `name` that wraps with `wrap`
    pub fn new<F>(name: impl Into<String>, wrap: F) -> Self
    where
        F: Fn(Box<dyn Request>) -> Box<dyn Request> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            requires: Capabilities::REQUIRED,
            wrap: Arc::new(wrap),
        }
    }

    /// Declare the capabilities the wrapped client must provide
    pub fn with_requirements(mut self, requires: Capabilities) -> Self {
        self.requires = requires;
        self
    }
}

impl Decorator for FnDecorator {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Capabilities {
        self.requires
    }

    fn decorate(&self, inner: Box<dyn Request>) -> Box<dyn Request> {
        (self.wrap)(inner)
    }
}

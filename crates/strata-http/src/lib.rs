//! Composable async HTTP client
//!
//! A [`BaseClient`] performs requests over a shared [`Transport`]. Decorators
//! implement the same [`Request`] interface and add one behavior each:
//! interceptors, a per-call timeout guard, or error observation. The
//! [`create`] factory builds the supported stacks.
//!
//! # Example
//!
//! ```no_run
//! use strata_http::{create, FactoryOptions, Request, RequestConfig, Response};
//!
//! async fn example() -> Response<()> {
//!     let client = create(FactoryOptions::timeout())?;
//!     if let Some(guard) = client.timeout() {
//!         guard.timeout(5_000, |url| eprintln!("{url} timed out"));
//!     }
//!
//!     let response = client
//!         .get(
//!             "https://api.example.com/users",
//!             Some(RequestConfig::new().param("id", 1)),
//!         )
//!         .await?;
//!     println!("{}", response.data);
//!     Ok(())
//! }
//! ```

mod capability;
mod client;
mod config;
mod decorator;
mod error;
mod factory;
mod query;
mod request;
mod response;
mod settings;
mod transport;

pub use capability::{Capabilities, Capability};
pub use client::{BaseClient, BaseClientBuilder, SuccessPredicate};
pub use crate::config::{Method, Params, RequestConfig, ResponseType};
pub use decorator::{
    Decorator, ErrorHandler, ErrorHandlerDecorator, ErrorMode, FnDecorator, InterceptorDecorator,
    RequestInterceptor, ResponseErrorInterceptor, ResponseInterceptor, TimeoutDecorator,
    TimeoutHandler,
};
pub use error::{ErrorPayload, HttpError, TIMEOUT_STATUS, TRANSPORT_FAILURE_STATUS};
pub use factory::{
    create, create_from_settings, create_from_settings_with, create_with, Composed, FactoryOptions,
};
pub use query::{effective_url, encode_params, form_encode, is_empty_object};
pub use request::Request;
pub use response::{HttpResponse, Response};
pub use settings::{
    ClientSettings, ENV_BASE_URL, ENV_DECORATOR_TIMEOUT_MS, ENV_HEADERS, ENV_TIMEOUT_MS,
    ENV_USE_ERROR_HANDLER, ENV_USE_INTERCEPTOR, ENV_USE_TIMEOUT,
};
pub use transport::{
    AbortSignal, ReqwestTransport, ReqwestTransportBuilder, RequestId, Transport, TransportError,
    TransportHandle, TransportProvider, TransportRequest, TransportResponse,
};

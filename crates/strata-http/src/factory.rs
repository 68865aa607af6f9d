//! Client composition

use std::collections::HashMap;
use std::sync::Arc;

use crate::capability::Capabilities;
use crate::client::BaseClient;
use crate::config::RequestConfig;
use crate::decorator::{Decorator, ErrorHandlerDecorator, InterceptorDecorator, TimeoutDecorator};
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::settings::ClientSettings;
use crate::transport::{TransportHandle, TransportProvider};

/// Which decorators [`create`] stacks on the base client
#[derive(Debug, Clone, Default)]
pub struct FactoryOptions {
    /// Wrap with [`InterceptorDecorator`]
    pub use_interceptor: bool,
    /// Wrap the interceptor stack with [`TimeoutDecorator`]
    pub use_timeout: bool,
    /// Wrap with [`ErrorHandlerDecorator`]
    pub use_error_handler: bool,
    /// Extra decorators applied left to right on top of the selected stack
    pub decorators: Vec<Arc<dyn Decorator>>,
}

impl FactoryOptions {
    /// Options for the interceptor stack
    pub fn interceptor() -> Self {
        Self {
            use_interceptor: true,
            ..Default::default()
        }
    }

    /// Options for the timeout-over-interceptor stack
    pub fn timeout() -> Self {
        Self {
            use_interceptor: true,
            use_timeout: true,
            ..Default::default()
        }
    }

    /// Options for the error handler stack
    pub fn error_handler() -> Self {
        Self {
            use_error_handler: true,
            ..Default::default()
        }
    }

    /// Append a custom decorator
    pub fn decorator(mut self, decorator: impl Decorator + 'static) -> Self {
        self.decorators.push(Arc::new(decorator));
        self
    }
}

impl From<&ClientSettings> for FactoryOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            use_interceptor: settings.use_interceptor,
            use_timeout: settings.use_timeout,
            use_error_handler: settings.use_error_handler,
            decorators: Vec::new(),
        }
    }
}

/// A composed client
///
/// The variant records which stack was built, so callers can reach the
/// setters specific to each decorator.
#[derive(Debug)]
pub enum Composed {
    /// Undecorated client
    Base(BaseClient),
    /// `Interceptor(Base)`
    Intercepted(Box<InterceptorDecorator<BaseClient>>),
    /// `Timeout(Interceptor(Base))`
    Timed(Box<TimeoutDecorator<InterceptorDecorator<BaseClient>>>),
    /// `ErrorHandler(Base)`
    ErrorHandled(Box<ErrorHandlerDecorator<BaseClient>>),
    /// Result of custom decorators
    Custom(Box<dyn Request>),
}

impl Composed {
    fn as_request(&self) -> &dyn Request {
        match self {
            Composed::Base(client) => client,
            Composed::Intercepted(client) => client.as_ref(),
            Composed::Timed(client) => client.as_ref(),
            Composed::ErrorHandled(client) => client.as_ref(),
            Composed::Custom(client) => client.as_ref(),
        }
    }

    fn into_request(self) -> Box<dyn Request> {
        match self {
            Composed::Base(client) => Box::new(client),
            Composed::Intercepted(client) => client,
            Composed::Timed(client) => client,
            Composed::ErrorHandled(client) => client,
            Composed::Custom(client) => client,
        }
    }

    /// The base client at the bottom of a built-in stack
    pub fn base(&self) -> Option<&BaseClient> {
        match self {
            Composed::Base(client) => Some(client),
            Composed::Intercepted(client) => Some(client.inner()),
            Composed::Timed(client) => Some(client.inner().inner()),
            Composed::ErrorHandled(client) => Some(client.inner()),
            Composed::Custom(_) => None,
        }
    }

    /// The interceptor decorator, for stacks that contain one
    pub fn interceptor(&self) -> Option<&InterceptorDecorator<BaseClient>> {
        match self {
            Composed::Intercepted(client) => Some(client.as_ref()),
            Composed::Timed(client) => Some(client.inner()),
            _ => None,
        }
    }

    /// The timeout decorator, for the timeout stack
    pub fn timeout(&self) -> Option<&TimeoutDecorator<InterceptorDecorator<BaseClient>>> {
        match self {
            Composed::Timed(client) => Some(client.as_ref()),
            _ => None,
        }
    }

    /// The error handler decorator, for the error handler stack
    pub fn error_handler(&self) -> Option<&ErrorHandlerDecorator<BaseClient>> {
        match self {
            Composed::ErrorHandled(client) => Some(client.as_ref()),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl Request for Composed {
    fn capabilities(&self) -> Capabilities {
        self.as_request().capabilities()
    }

    async fn get(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.as_request().get(url, config).await
    }

    async fn post(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.as_request().post(url, config).await
    }

    async fn put(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.as_request().put(url, config).await
    }

    async fn delete(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.as_request().delete(url, config).await
    }

    async fn head(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.as_request().head(url, config).await
    }

    async fn options(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.as_request().options(url, config).await
    }

    async fn patch(&self, url: &str, config: Option<RequestConfig>) -> Response {
        self.as_request().patch(url, config).await
    }

    async fn request(&self, config: RequestConfig) -> Response {
        self.as_request().request(config).await
    }

    fn set_header(&self, key: &str, value: &str) -> Response<&dyn Request> {
        self.as_request().set_header(key, value)
    }

    fn set_headers(&self, headers: &HashMap<String, String>) -> Response<&dyn Request> {
        self.as_request().set_headers(headers)
    }

    fn set_timeout(&self, ms: u64) -> Response<&dyn Request> {
        self.as_request().set_timeout(ms)
    }

    fn transport_handle(&self) -> Option<TransportHandle> {
        self.as_request().transport_handle()
    }
}

/// Compose a client on the shared transport
pub fn create(options: FactoryOptions) -> Response<Composed> {
    create_with(options, TransportProvider::instance())
}

/// Compose a client on `transport`
///
/// At most one built-in stack is selected:
/// `Interceptor(Base)`, `Timeout(Interceptor(Base))` or `ErrorHandler(Base)`.
/// Other flag combinations fail with [`HttpError::Config`]. Custom decorators
/// then wrap the selected stack in order, and fail with
/// [`HttpError::Unsupported`] when the client they wrap lacks a capability
/// they require.
pub fn create_with(options: FactoryOptions, transport: TransportHandle) -> Response<Composed> {
    compose(BaseClient::with_transport(transport), options)
}

/// Compose a client described by `settings` on the shared transport
pub fn create_from_settings(settings: &ClientSettings) -> Response<Composed> {
    create_from_settings_with(settings, TransportProvider::instance())
}

/// Compose a client described by `settings` on `transport`
pub fn create_from_settings_with(
    settings: &ClientSettings,
    transport: TransportHandle,
) -> Response<Composed> {
    if settings.decorator_timeout_ms > 0 && !settings.use_timeout {
        return Err(HttpError::Config(
            "decorator_timeout_ms requires use_timeout".into(),
        ));
    }

    let base = BaseClient::with_transport(transport);
    settings.apply(&base)?;
    let composed = compose(base, FactoryOptions::from(settings))?;

    if let Some(decorator) = composed.timeout() {
        decorator.timeout(settings.decorator_timeout_ms, |url| {
            tracing::warn!("Guard timeout fired for {}", url);
        });
    }

    Ok(composed)
}

fn compose(base: BaseClient, options: FactoryOptions) -> Response<Composed> {
    let FactoryOptions {
        use_interceptor,
        use_timeout,
        use_error_handler,
        decorators,
    } = options;

    let stack = match (use_interceptor, use_timeout, use_error_handler) {
        (false, false, false) => Composed::Base(base),
        (true, false, false) => Composed::Intercepted(Box::new(InterceptorDecorator::new(base))),
        (true, true, false) => Composed::Timed(Box::new(TimeoutDecorator::new(
            InterceptorDecorator::new(base),
        ))),
        (false, false, true) => Composed::ErrorHandled(Box::new(ErrorHandlerDecorator::new(base))),
        (false, true, false) => {
            return Err(HttpError::Config(
                "use_timeout requires use_interceptor".into(),
            ))
        }
        _ => {
            return Err(HttpError::Config(
                "use_error_handler cannot be combined with other decorators".into(),
            ))
        }
    };
    tracing::debug!(
        "Composed client: interceptor={}, timeout={}, error_handler={}",
        use_interceptor,
        use_timeout,
        use_error_handler
    );

    if decorators.is_empty() {
        return Ok(stack);
    }

    let client = decorators
        .iter()
        .try_fold(stack.into_request(), |inner, decorator| {
            let mut missing = inner.capabilities().missing(decorator.requires());
            if let Some(capability) = missing.next() {
                tracing::warn!(
                    "Decorator {} requires {}, which the wrapped client lacks",
                    decorator.name(),
                    capability
                );
                return Err(HttpError::Unsupported(capability));
            }
            tracing::debug!("Applying decorator {}", decorator.name());
            Ok(decorator.decorate(inner))
        })?;

    Ok(Composed::Custom(client))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::capability::Capability;
    use crate::decorator::tests::GetPostOnly;
    use crate::decorator::FnDecorator;
    use crate::transport::mock::{MockTransport, Reply};

    #[test]
    fn test_flag_combinations() {
        let mock = MockTransport::new();
        let build = |options| create_with(options, mock.clone());

        assert!(matches!(
            build(FactoryOptions::default()),
            Ok(Composed::Base(_))
        ));
        assert!(matches!(
            build(FactoryOptions::interceptor()),
            Ok(Composed::Intercepted(_))
        ));
        assert!(matches!(
            build(FactoryOptions::timeout()),
            Ok(Composed::Timed(_))
        ));
        assert!(matches!(
            build(FactoryOptions::error_handler()),
            Ok(Composed::ErrorHandled(_))
        ));
    }

    #[test]
    fn test_invalid_combinations_fail_fast() {
        let mock = MockTransport::new();
        let invalid = [
            FactoryOptions {
                use_timeout: true,
                ..Default::default()
            },
            FactoryOptions {
                use_error_handler: true,
                use_interceptor: true,
                ..Default::default()
            },
            FactoryOptions {
                use_interceptor: true,
                use_timeout: true,
                use_error_handler: true,
                ..Default::default()
            },
        ];

        for options in invalid {
            assert!(matches!(
                create_with(options, mock.clone()),
                Err(HttpError::Config(_))
            ));
        }
    }

    #[test]
    fn test_typed_access_to_stack() {
        let composed = create_with(FactoryOptions::timeout(), MockTransport::new())
            .expect("valid stack");

        assert!(composed.timeout().is_some());
        assert!(composed.interceptor().is_some());
        assert!(composed.error_handler().is_none());
        assert!(composed.base().is_some());
        assert_eq!(composed.capabilities(), Capabilities::all());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stack_end_to_end() {
        let mock = MockTransport::new();
        mock.push(Reply::json(200, json!({"id": 1})).after(Duration::from_millis(200)));
        let composed = create_with(FactoryOptions::timeout(), mock.clone()).expect("valid stack");

        let fired = Arc::new(Mutex::new(0));
        let counter = fired.clone();
        let stack = composed.timeout().expect("timeout stack");
        stack.timeout(50, move |_| *counter.lock().expect("not poisoned") += 1);
        stack
            .inner()
            .set_config(RequestConfig::new().base_url("https://api.x"));

        let result = composed.get("/users", None).await;
        assert!(result.is_err_and(|e| e.status_code() == 408));
        assert_eq!(*fired.lock().expect("not poisoned"), 1);
    }

    #[tokio::test]
    async fn test_error_handler_stack_resolves_errors() {
        let mock = MockTransport::new();
        mock.push(Reply::text(404, ""));
        let composed =
            create_with(FactoryOptions::error_handler(), mock.clone()).expect("valid stack");

        let response = composed
            .get("http://h/missing", None)
            .await
            .expect("errors resolve as values");
        assert_eq!(response.status_code, 404);
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn test_custom_decorators_wrap_in_order() {
        let mock = MockTransport::new();
        let tag = |name: &'static str| {
            FnDecorator::new(name, move |inner| -> Box<dyn Request> {
                let decorator = InterceptorDecorator::new(inner);
                decorator.set_request_interceptor(move |config| {
                    let order = config
                        .headers
                        .get("X-Order")
                        .map(|o| format!("{o},{name}"))
                        .unwrap_or_else(|| name.to_string());
                    config.header("X-Order", order)
                });
                Box::new(decorator)
            })
        };

        let options = FactoryOptions::default()
            .decorator(tag("first"))
            .decorator(tag("second"));
        let composed = create_with(options, mock.clone()).expect("valid stack");
        assert!(matches!(composed, Composed::Custom(_)));

        composed.get("http://h/", None).await.expect("request succeeds");
        assert_eq!(mock.last().header("X-Order"), Some("second,first"));
    }

    #[test]
    fn test_custom_decorator_requirements_checked() {
        let needs_put = FnDecorator::new("needs-put", |inner| inner)
            .with_requirements(Capabilities::REQUIRED | Capabilities::PUT);
        let hides_put = FnDecorator::new("hides-put", |_| -> Box<dyn Request> {
            Box::new(GetPostOnly)
        });

        let ok = FactoryOptions::default().decorator(needs_put.clone());
        assert!(create_with(ok, MockTransport::new()).is_ok());

        let broken = FactoryOptions::default()
            .decorator(hides_put)
            .decorator(needs_put);
        assert!(matches!(
            create_with(broken, MockTransport::new()),
            Err(HttpError::Unsupported(Capability::Put))
        ));
    }

    #[tokio::test]
    async fn test_create_from_settings() {
        let mock = MockTransport::new();
        mock.push(Reply::json(200, json!({"id": 1})));
        let settings = ClientSettings {
            base_url: "https://api.x".into(),
            headers: HashMap::from([("X-App".into(), "strata".into())]),
            use_interceptor: true,
            use_timeout: true,
            decorator_timeout_ms: 1_000,
            ..Default::default()
        };

        let composed = create_from_settings_with(&settings, mock.clone()).expect("valid settings");
        assert_eq!(composed.timeout().map(|t| t.timeout_ms()), Some(1_000));

        let response = composed.get("/users", None).await.expect("request succeeds");
        assert_eq!(response.data, json!({"id": 1}));
        let sent = mock.last();
        assert_eq!(sent.url, "https://api.x/users");
        assert_eq!(sent.header("X-App"), Some("strata"));
    }

    #[test]
    fn test_guard_without_timeout_stack_is_rejected() {
        let settings = ClientSettings {
            decorator_timeout_ms: 50,
            ..Default::default()
        };
        assert!(matches!(
            create_from_settings_with(&settings, MockTransport::new()),
            Err(HttpError::Config(_))
        ));
    }
}

//! Integration tests for strata-http using mockito

use std::io::Write;
use std::sync::{Arc, Mutex};

use mockito::Matcher;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strata_http::{
    create_from_settings, create_with, BaseClient, ClientSettings, Composed, ErrorMode,
    ErrorHandlerDecorator, FactoryOptions, HttpError, Method, Params, Request, RequestConfig,
    ReqwestTransport, ResponseType, TransportHandle, TransportProvider,
};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct User {
    id: u32,
    name: String,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn transport() -> TransportHandle {
    Arc::new(ReqwestTransport::new())
}

fn client(server: &mockito::ServerGuard) -> BaseClient {
    BaseClient::builder()
        .transport(transport())
        .base_url(server.url())
        .build()
}

// === BaseClient verbs ===

#[tokio::test]
async fn test_get_with_params() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/users")
        .match_query(Matcher::UrlEncoded("id".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 1, "name": "a"}"#)
        .create_async()
        .await;

    let response = client(&server)
        .get("/users", Some(RequestConfig::new().param("id", 1)))
        .await
        .expect("GET should succeed");

    assert_eq!(response.status_code, 200);
    assert_eq!(response.status_text, "OK");
    let user: User = response.json().expect("body is a user");
    assert_eq!(
        user,
        User {
            id: 1,
            name: "a".into()
        }
    );

    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_json_body() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/users")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"name": "a"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 7, "name": "a"}"#)
        .create_async()
        .await;

    let response = client(&server)
        .post("/users", Some(RequestConfig::new().data(json!({"name": "a"}))))
        .await
        .expect("POST should succeed");

    assert_eq!(response.status_code, 201);
    assert_eq!(response.data, json!({"id": 7, "name": "a"}));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_put_patch_delete() {
    let mut server = mockito::Server::new_async().await;
    let client = client(&server);

    let mut mocks = Vec::new();
    for method in ["PUT", "PATCH", "DELETE"] {
        mocks.push(
            server
                .mock(method, "/users/1")
                .match_body(Matcher::Json(json!({"name": "b"})))
                .with_status(200)
                .with_body(r#"{"ok": true}"#)
                .create_async()
                .await,
        );
    }

    let config = RequestConfig::new().data(json!({"name": "b"}));
    for method in [Method::Put, Method::Patch, Method::Delete] {
        let response = client
            .dispatch(method, "/users/1", Some(config.clone()))
            .await
            .expect("request should succeed");
        assert_eq!(response.data, json!({"ok": true}), "{method}");
    }

    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_get_sends_form_body() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/search")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body("lang=rust&q=a+b")
        .with_status(200)
        .with_body("done")
        .create_async()
        .await;

    let response = client(&server)
        .get(
            "/search",
            Some(RequestConfig::new().data(json!({"q": "a b", "lang": "rust"}))),
        )
        .await
        .expect("GET should succeed");
    assert_eq!(response.text(), Some("done"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/h")
        .match_header("x-app", "strata")
        .match_header("x-call", "1")
        .with_status(200)
        .create_async()
        .await;

    let client = client(&server);
    client
        .set_header("X-App", "first")
        .and_then(|c| c.set_header("X-App", "strata"))
        .expect("base client supports setters");

    let response = client
        .get("/h", Some(RequestConfig::new().header("X-Call", "1")))
        .await
        .expect("GET should succeed");
    assert_eq!(response.data, json!(null));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("Not Found")
        .create_async()
        .await;

    let result = client(&server).get("/missing", None).await;

    if let Err(HttpError::Status {
        status,
        message,
        request,
    }) = result
    {
        assert!(request.is_some());
        assert_eq!(status, 404);
        assert_eq!(message, "Not Found");
    } else {
        panic!("Expected HttpError::Status");
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_head_and_options() {
    let mut server = mockito::Server::new_async().await;

    let head = server
        .mock("HEAD", "/resource")
        .with_status(200)
        .create_async()
        .await;
    let options = server
        .mock("OPTIONS", "/resource")
        .with_status(204)
        .create_async()
        .await;

    let client = client(&server);
    assert_eq!(
        client
            .head("/resource", None)
            .await
            .expect("HEAD should succeed")
            .status_code,
        200
    );
    assert!(matches!(
        client.options("/resource", None).await,
        Err(HttpError::Status { status: 204, .. })
    ));

    head.assert_async().await;
    options.assert_async().await;
}

#[tokio::test]
async fn test_generic_request() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("PATCH", "/items")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body(r#"{"raw": true}"#)
        .create_async()
        .await;

    let config = RequestConfig::new()
        .url("/items")
        .method(Method::Patch)
        .params(Params::Encoded("?page=2".into()))
        .response_type(ResponseType::Text);
    let response = client(&server)
        .request(config)
        .await
        .expect("request should succeed");
    assert_eq!(response.text(), Some(r#"{"raw": true}"#));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_failure_maps_to_502() {
    let client = BaseClient::builder()
        .transport(transport())
        .base_url("http://127.0.0.1:1")
        .build();

    let error = client
        .get("/unreachable", None)
        .await
        .expect_err("nothing listens on port 1");
    assert!(matches!(error, HttpError::Transport { request: Some(_), .. }));
    assert_eq!(error.status_code(), 502);
}

#[tokio::test]
async fn test_call_header_replaces_default_with_different_case() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/typed")
        .match_header("content-type", "application/vnd.strata+json")
        .with_status(200)
        .expect(8)
        .create_async()
        .await;

    let client = client(&server);
    client
        .set_header("Content-Type", "text/plain")
        .expect("base client supports setters");

    for _ in 0..8 {
        client
            .post(
                "/typed",
                Some(
                    RequestConfig::new()
                        .header("content-type", "application/vnd.strata+json")
                        .data(json!({"a": 1})),
                ),
            )
            .await
            .expect("POST should succeed");
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_declared_length_over_limit_is_rejected() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/large")
        .with_status(200)
        .with_body("x".repeat(4096))
        .create_async()
        .await;

    let error = client(&server)
        .get("/large", Some(RequestConfig::new().max_content_length(16)))
        .await
        .expect_err("body is over the limit");
    assert!(matches!(
        error,
        HttpError::BodyTooLarge {
            limit: 16,
            actual: 4096,
            request: Some(_),
        }
    ));
}

#[tokio::test]
async fn test_streamed_body_over_limit_is_rejected() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/stream")
        .with_status(200)
        .with_chunked_body(|w| {
            for _ in 0..64 {
                w.write_all(&[b'y'; 256])?;
            }
            Ok(())
        })
        .create_async()
        .await;

    let error = client(&server)
        .get("/stream", Some(RequestConfig::new().max_content_length(1024)))
        .await
        .expect_err("body is over the limit");
    assert!(matches!(
        error,
        HttpError::BodyTooLarge { limit: 1024, .. }
    ));
}

// === Composed stacks ===

#[tokio::test]
async fn test_interceptor_stack_against_server() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/users")
        .match_header("authorization", "Bearer token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 1, "name": "a"}"#)
        .create_async()
        .await;

    let composed = create_with(FactoryOptions::interceptor(), transport())
        .expect("valid stack");
    let interceptor = composed.interceptor().expect("interceptor stack");
    interceptor
        .set_config(RequestConfig::new().base_url(server.url()))
        .set_request_interceptor(|config| config.header("Authorization", "Bearer token"))
        .set_response_interceptor(|mut response| {
            response.data = response.data["name"].clone();
            response
        });

    let response = composed.get("/users", None).await.expect("GET should succeed");
    assert_eq!(response.data, json!("a"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_timeout_stack_against_slow_server() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/slow")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_millis(300));
            w.write_all(b"late")
        })
        .create_async()
        .await;

    let composed = create_with(FactoryOptions::timeout(), transport()).expect("valid stack");
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    let guard = composed.timeout().expect("timeout stack");
    guard.timeout(50, move |url| {
        sink.lock().expect("not poisoned").push(url.to_string())
    });
    guard
        .inner()
        .set_config(RequestConfig::new().base_url(server.url()));

    let started = std::time::Instant::now();
    let result = composed.get("/slow", None).await;
    assert!(started.elapsed() < std::time::Duration::from_millis(250));
    assert_eq!(
        result,
        Err(HttpError::Timeout {
            url: "/slow".into(),
            timeout_ms: 50,
            request: None,
        })
    );
    assert_eq!(*fired.lock().expect("not poisoned"), vec!["/slow".to_string()]);
}

#[tokio::test]
async fn test_error_handler_stack_against_server() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/boom")
        .with_status(500)
        .create_async()
        .await;

    let base = client(&server);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let decorator = ErrorHandlerDecorator::new(base);
    decorator.set_error_handler(move |e| sink.lock().expect("not poisoned").push(e.clone()));

    let response = decorator.get("/boom", None).await.expect("errors are values");
    assert!(response.is_error());
    assert_eq!(response.status_code, 500);
    assert!(response.request.is_some());
    assert_eq!(seen.lock().expect("not poisoned").len(), 1);

    let propagating = ErrorHandlerDecorator::new(client(&server)).with_mode(ErrorMode::Propagate);
    assert!(matches!(
        propagating.get("/boom", None).await,
        Err(HttpError::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_concurrent_requests_get_own_responses() {
    let mut server = mockito::Server::new_async().await;

    let mut mocks = Vec::new();
    for i in 0..8 {
        mocks.push(
            server
                .mock("GET", format!("/item/{i}").as_str())
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json!({ "item": i }).to_string())
                .create_async()
                .await,
        );
    }

    let client = client(&server);
    let paths: Vec<String> = (0..8).map(|i| format!("/item/{i}")).collect();
    let responses = futures::future::join_all(paths.iter().map(|p| client.get(p, None))).await;

    for (i, response) in responses.into_iter().enumerate() {
        let response = response.expect("request should succeed");
        assert_eq!(response.data, json!({ "item": i }));
    }
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_create_from_settings_uses_shared_transport() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/ping")
        .match_header("x-app", "strata")
        .with_status(200)
        .with_body("pong")
        .create_async()
        .await;

    let settings = ClientSettings {
        base_url: server.url(),
        headers: [("X-App".to_string(), "strata".to_string())].into(),
        use_interceptor: true,
        ..Default::default()
    };
    let composed = create_from_settings(&settings).expect("valid settings");
    assert!(matches!(composed, Composed::Intercepted(_)));

    let handle = composed.transport_handle().expect("base client exposes it");
    assert!(Arc::ptr_eq(&handle, &TransportProvider::instance()));

    let response = composed.get("/ping", None).await.expect("GET should succeed");
    assert_eq!(response.text(), Some("pong"));

    mock.assert_async().await;
}

//! Tests for the HTTP front end: bearer auth and CORS preflight bypass,
//! exercised through the built axum app rather than its private helpers.

use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use shellgate::aggregator::config::AggregatorConfig;
use shellgate::http::build_app;
use shellgate::process::DEFAULT_INACTIVITY_BUDGET_SECONDS;
use shellgate::registry::ProcessRegistry;
use shellgate::server::GatewayServer;

fn server() -> GatewayServer {
    GatewayServer::new(
        ProcessRegistry::new(),
        AggregatorConfig::default(),
        None,
        DEFAULT_INACTIVITY_BUDGET_SECONDS,
    )
}

#[tokio::test]
async fn accepts_matching_bearer_token() {
    let app = build_app(server(), "secret".to_string());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer secret"))
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejects_missing_header() {
    let app = build_app(server(), "secret".to_string());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejects_wrong_token() {
    let app = build_app(server(), "secret".to_string());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer wrong"))
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejects_non_bearer_scheme() {
    let app = build_app(server(), "secret".to_string());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(AUTHORIZATION, HeaderValue::from_static("Basic secret"))
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accepts_request_carrying_execution_id_header() {
    let app = build_app(server(), "secret".to_string());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(AUTHORIZATION, HeaderValue::from_static("Bearer secret"))
        .header("Execution-Id", HeaderValue::from_static("abc123"))
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn options_preflight_bypasses_auth() {
    let app = build_app(server(), "secret".to_string());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let app = build_app(server(), "secret".to_string());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

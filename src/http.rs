//! HTTP front end: bearer auth, CORS, per-request workspace scoping, and
//! the streamable-HTTP MCP transport.
//!
//! Session/auth state is deliberately tiny: one shared bearer token and no
//! session store beyond what `rmcp`'s streamable-HTTP session manager
//! already keeps. `Execution-Id` selects the workspace root for the
//! duration of one request via [`crate::workspace::scope`]; `Mcp-Session-Id`
//! is handled entirely inside `rmcp`'s transport layer.

use crate::server::GatewayServer;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Idle connections are kept around generously: a slow child-provider
/// round trip or a long-inactivity-budget `execute_command` call both
/// hold the HTTP connection open for a while.
const IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Clone)]
struct AuthState {
    token: Arc<String>,
}

/// Build the axum application: CORS, bearer auth, and the MCP endpoint at
/// `/mcp`.
pub fn build_app(server: GatewayServer, token: String) -> Router {
    let mcp_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let auth = AuthState {
        token: Arc::new(token),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest_service("/mcp", mcp_service)
        .layer(middleware::from_fn_with_state(auth, require_bearer_token))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn require_bearer_token(
    State(auth): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == axum::http::Method::OPTIONS {
        return next.run(request).await;
    }

    if !has_valid_bearer_token(request.headers(), &auth.token) {
        return unauthorized();
    }

    let execution_id = execution_id_header(request.headers());
    crate::workspace::scope(execution_id, next.run(request)).await
}

fn has_valid_bearer_token(headers: &HeaderMap, expected: &str) -> bool {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = header.to_str() else {
        return false;
    };
    value
        .strip_prefix("Bearer ")
        .is_some_and(|presented| presented == expected)
}

fn execution_id_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Execution-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": "Unauthorized: missing or invalid bearer token" })),
    )
        .into_response()
}

/// Serve `app` on `addr` until `ctrl_c` (or the process is otherwise
/// signaled). Connections are given [`IDLE_TIMEOUT`] to go idle before
/// being reclaimed.
pub async fn serve(app: Router, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

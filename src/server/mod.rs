//! HTTP API surface: an `axum::Router` built from one shared `AppContext`,
//! mirroring the MCP tool surface plus the job/source/document/upload
//! management endpoints the specification lists as "full set mirrors MCP".
//!
//! Grounded on the teacher's `server::{AppState, create_router, serve}`
//! shape (`src/server/mod.rs`): a cloneable state struct, a router builder
//! that nests handler groups, and a `serve(...)` that binds and runs.

mod handlers;
mod ws;

use std::net::SocketAddr;

use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::auth::check_bearer;
use crate::error::CodeDoxError;

pub type AppState = AppContext;

/// Build the full router. Every route but `/health` passes through the
/// bearer-auth middleware, which is a no-op when auth is disabled.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.api_cors_origins);

    let authenticated = Router::new()
        .route("/crawl/init", post(handlers::crawl::init))
        .route("/crawl/status/:job_id", get(handlers::crawl::status))
        .route("/crawl/cancel/:job_id", post(handlers::crawl::cancel))
        .route("/crawl/:job_id/resume", post(handlers::crawl::resume))
        .route("/crawl/list", get(handlers::crawl::list))
        .route("/sources", get(handlers::sources::list))
        .route("/sources/:id", get(handlers::sources::get))
        .route("/sources/:id", patch(handlers::sources::rename))
        .route("/sources/:id", delete(handlers::sources::delete))
        .route("/sources/:id/documents", get(handlers::sources::documents))
        .route("/sources/:id/snippets", get(handlers::sources::snippets))
        .route("/sources/:id/recrawl", post(handlers::sources::recrawl))
        .route("/sources/:id/regenerate", post(handlers::sources::regenerate))
        .route("/upload/file", post(handlers::upload::upload_file))
        .route("/upload/files", post(handlers::upload::upload_files))
        .route("/upload/markdown", post(handlers::upload::upload_markdown))
        .route("/search", get(handlers::search::search))
        .route("/documents/markdown", get(handlers::search::page_markdown_by_query))
        .route("/documents/:id/markdown", get(handlers::search::page_markdown_by_id))
        .route("/ws/:client_id", get(ws::upgrade))
        .merge(crate::mcp::http_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(authenticated)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let parsed: Vec<axum::http::HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(parsed).allow_methods(Any).allow_headers(Any)
    }
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, CodeDoxError> {
    let header_value = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    check_bearer(header_value, &state.config.mcp_auth_tokens, state.config.mcp_auth_enabled)?;
    Ok(next.run(request).await)
}

/// Bind and serve the HTTP API until the process is terminated.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!("starting HTTP API at http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[allow(dead_code)]
fn unauthorized() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn test_config() -> crate::config::Config {
        let mut cfg = crate::config::Config::default();
        cfg.database_url = "postgres://localhost/codedox_test_unreachable".to_string();
        cfg
    }

    fn test_state() -> AppState {
        AppContext::bootstrap(test_config()).expect("bootstrap should not need a live connection")
    }

    #[tokio::test]
    async fn health_is_exempt_from_auth() {
        let mut state = test_state();
        std::sync::Arc::get_mut(&mut state.config).unwrap().mcp_auth_enabled = true;
        let app = create_router(state);

        let response = app
            .oneshot(HttpRequest::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_without_token_is_rejected_when_auth_enabled() {
        let mut state = test_state();
        std::sync::Arc::get_mut(&mut state.config).unwrap().mcp_auth_enabled = true;
        std::sync::Arc::get_mut(&mut state.config).unwrap().mcp_auth_tokens = vec!["secret".to_string()];
        let app = create_router(state);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/sources")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

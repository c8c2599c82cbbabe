//! HTTP status API.
//!
//! Read-only: every handler reads the snapshot the runner publishes after each
//! tick, so the API never touches the cycle itself.
//!
//! - `health` - Liveness and connection summary
//! - `status` - Full agent status snapshot
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod health;
pub mod openapi;
pub mod status;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /status            - Agent status snapshot
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest(
            "/api",
            Router::new()
                .route("/status", get(status::get_status))
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

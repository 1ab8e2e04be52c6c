//! Axum router configuration with middleware.
//!
//! API routes live under `/api/v1/`; `/health` sits at the root.
//! Middleware: CORS (exposing `x-run-id`), HTTP tracing.

use axum::Router;
use axum::http::HeaderName;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Response header carrying the id of the run a request started.
pub const RUN_ID_HEADER: &str = "x-run-id";

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(RUN_ID_HEADER)]);

    let api_routes = Router::new()
        .route("/workflows/run", post(handlers::workflow::run_workflow))
        .route(
            "/workflows/run/stream",
            post(handlers::workflow::stream_workflow),
        )
        .route("/runs/{run_id}/cancel", post(handlers::workflow::cancel_run))
        .route("/step-types", get(handlers::workflow::list_step_types));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

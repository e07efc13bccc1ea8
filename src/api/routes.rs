//! API Routes
//!
//! Configures the Axum router with the admin surface endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    flush_handler, health_handler, invalidate_handler, keys_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /cache/stats` - Aggregate and per-tier statistics
/// - `GET /cache/health` - Per-tier health classification
/// - `GET /cache/keys` - Paginated key browser
/// - `POST /cache/invalidate` - Invalidate by key, pattern or tag
/// - `POST /cache/flush` - Full clear, confirmation token required
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache/stats", get(stats_handler))
        .route("/cache/health", get(health_handler))
        .route("/cache/keys", get(keys_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/flush", post(flush_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

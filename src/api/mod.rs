//! API Module
//!
//! HTTP handlers and routing for the cache admin surface.
//!
//! # Endpoints
//! - `GET /cache/stats` - Aggregate and per-tier statistics
//! - `GET /cache/health` - Per-tier health classification
//! - `GET /cache/keys` - Paginated key browser
//! - `POST /cache/invalidate` - Invalidate by key, pattern or tag
//! - `POST /cache/flush` - Full clear, confirmation token required

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

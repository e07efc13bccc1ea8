//! Error types for the cache core and admin API
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine and its admin surface.
///
/// A plain cache miss is not an error; `CacheEngine::get` returns
/// `Ok(None)` for that case. These variants cover caller-input errors
/// (surfaced synchronously) and tier failures (absorbed by the engine
/// and visible only through health degradation).
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed invalidation pattern; no keys are touched
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Value could not be encoded/decoded for a tier
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Remote tier unreachable after timeout and retries
    #[error("L2 tier unavailable: {0}")]
    TierUnavailable(String),

    /// Flush requested without the exact confirmation token
    #[error("Flush not confirmed: {0}")]
    FlushNotConfirmed(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::InvalidPattern(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CacheError::Serialization(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            CacheError::TierUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            CacheError::FlushNotConfirmed(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CacheError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CacheError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache core.
pub type Result<T> = std::result::Result<T, CacheError>;

//! API Handlers
//!
//! HTTP request handlers for the admin surface. The cache core implements
//! the logic; these are thin glue over [`CacheEngine`].

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::cache::{CacheEngine, L2Store, MemoryBackend, RedisBackend};
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    FlushRequest, FlushResponse, HealthResponse, InvalidateRequest, InvalidateResponse,
    InvalidateTarget, KeysQuery, KeysResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The two-tier cache engine
    pub engine: Arc<CacheEngine>,
}

impl AppState {
    /// Creates a new AppState around an existing engine.
    pub fn new(engine: CacheEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Connects to Redis when a URL is configured; otherwise the L2 tier
    /// runs on the in-process memory backend.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_millis(config.l2_timeout_ms);
        let l2 = match &config.redis_url {
            Some(url) => {
                let backend = RedisBackend::connect(url).await?;
                L2Store::new(Box::new(backend), timeout, config.l2_retries)
            }
            None => L2Store::new(Box::new(MemoryBackend::new()), timeout, config.l2_retries),
        };

        Ok(Self::new(CacheEngine::new(config, Some(l2))))
    }
}

/// Handler for GET /cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let snapshot = state.engine.stats().await;
    Json(snapshot.into())
}

/// Handler for GET /cache/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.engine.health().await;
    Json(snapshot.into())
}

/// Handler for GET /cache/keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<KeysResponse>> {
    let page = state
        .engine
        .browse_keys(
            query.page(),
            query.limit(),
            query.pattern.as_deref(),
            query.kind.as_deref(),
        )
        .await?;

    Ok(Json(page.into()))
}

/// Handler for POST /cache/invalidate
///
/// Accepts exactly one of `key`, `pattern`, or `tag`.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let count = match req.target()? {
        InvalidateTarget::Key(key) => {
            if state.engine.invalidate(&key).await? {
                1
            } else {
                0
            }
        }
        InvalidateTarget::Pattern(pattern) => state.engine.invalidate_by_pattern(&pattern).await?,
        InvalidateTarget::Tag(tag) => state.engine.invalidate_by_tag(&tag).await?,
    };

    Ok(Json(InvalidateResponse::new(count)))
}

/// Handler for POST /cache/flush
///
/// Requires the exact confirmation literal in the body.
pub async fn flush_handler(
    State(state): State<AppState>,
    Json(req): Json<FlushRequest>,
) -> Result<Json<FlushResponse>> {
    state.engine.flush(&req.confirm).await?;
    Ok(Json(FlushResponse::ok()))
}

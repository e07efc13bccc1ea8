//! TierCache - A two-tier response/object cache
//!
//! In-process L1 with TTL and LRU eviction, backed by a shared networked L2,
//! unified behind one engine with hit/miss telemetry and invalidation by
//! exact key, wildcard pattern, or semantic tag.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEngine, CacheValue, SetOptions};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;

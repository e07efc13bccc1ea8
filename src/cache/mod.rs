//! Cache Module
//!
//! Two-tier cache core: bounded in-process L1, networked L2 behind a
//! backend trait, tag index, per-tier statistics, and the engine façade
//! tying them together.

mod engine;
mod entry;
mod l1;
mod l2;
mod lru;
mod stats;
mod tags;


// Re-export public types
pub use engine::{
    CacheEngine, HealthSnapshot, KeyInfo, KeyPage, L1Snapshot, L2Snapshot, SetOptions,
    StatsSnapshot, TierHealth, FLUSH_CONFIRMATION,
};
pub use entry::{current_timestamp_ms, CacheEntry, CacheValue};
pub use l1::{L1Insert, L1Lookup, L1Store};
pub use l2::{L2Backend, L2Store, MemoryBackend, RedisBackend};
pub use lru::LruTracker;
pub use stats::{StatsCollector, TierCounters, TierStats};
pub use tags::TagIndex;

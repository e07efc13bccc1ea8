//! Cache Entry Module
//!
//! Defines cached values and per-entry metadata with TTL support.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Cache Value ==
/// The unit of data stored per entry.
///
/// Callers hand the cache either raw serialized bytes or a structured JSON
/// payload; the cache never inspects the contents beyond sizing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CacheValue {
    /// Opaque serialized bytes
    Bytes(Vec<u8>),
    /// Structured JSON payload
    Json(serde_json::Value),
}

impl CacheValue {
    /// Estimated in-memory size of the value in bytes.
    ///
    /// For JSON payloads this is the length of the serialized form; exact
    /// accounting is not required, only a stable estimate for the L1 byte
    /// budget.
    pub fn size_bytes(&self) -> usize {
        match self {
            CacheValue::Bytes(bytes) => bytes.len(),
            CacheValue::Json(value) => value.to_string().len(),
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: CacheValue,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Estimated value size in bytes, computed at insert time
    pub size_bytes: usize,
    /// Semantic tags attached to this entry
    pub tags: HashSet<String>,
    /// Number of times the entry has been read
    pub access_count: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL and tags.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl_seconds` - Optional TTL in seconds
    /// * `tags` - Semantic tags for bulk invalidation
    pub fn new(value: CacheValue, ttl_seconds: Option<u64>, tags: HashSet<String>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now + (ttl * 1000));
        let size_bytes = value.size_bytes();

        Self {
            value,
            created_at: now,
            expires_at,
            size_bytes,
            tags,
            access_count: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to the expiration time. An expired entry must
    /// never be returned as a hit, even if still physically present pending
    /// sweep.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// Returns `Some(0)` once the entry has expired.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            expires.saturating_sub(now)
        })
    }

    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| ms / 1000)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

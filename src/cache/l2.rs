//! L2 Store Module
//!
//! Client to the shared networked tier. The backend is a trait so the
//! engine can run against Redis in production and an in-process map when no
//! Redis URL is configured (and in tests). Every operation is bounded by a
//! timeout and retried before it counts as a tier failure; a failure is
//! never conflated with "key absent".

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheEntry, CacheValue};
use crate::error::{CacheError, Result};

// == Wire Format ==
/// Serialized form of an entry on the remote tier.
#[derive(Debug, Serialize, Deserialize)]
struct WireEntry {
    value: CacheValue,
    tags: Vec<String>,
    created_at: u64,
    expires_at: Option<u64>,
}

// == Backend Trait ==
/// Raw remote key/value operations, pre-timeout and pre-retry.
///
/// `keys_matching` takes the cache's wildcard pattern string (at most one
/// `*`); only that `*` is a wildcard, every other character matches
/// literally on every backend.
#[async_trait]
pub trait L2Backend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, payload: Vec<u8>, ttl_seconds: Option<u64>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<bool>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>>;
    async fn flush(&self) -> Result<()>;
    async fn key_count(&self) -> Result<u64>;
    async fn ping(&self) -> Result<()>;
}

// == Redis Backend ==
/// Redis-backed remote tier using a shared connection manager.
pub struct RedisBackend {
    manager: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Connects to Redis at the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::TierUnavailable(format!("Invalid Redis URL: {}", e)))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::TierUnavailable(format!("Redis connection error: {}", e)))?;
        Ok(Self { manager })
    }
}

fn redis_err(context: &str, err: redis::RedisError) -> CacheError {
    CacheError::TierUnavailable(format!("Redis {} error: {}", context, err))
}

/// Escapes Redis glob metacharacters so only the cache's single `*`
/// wildcard keeps its meaning on SCAN MATCH; `?`, `[`, `]` and `\` in
/// keys must match literally, as they do in the compiled matcher.
fn redis_glob_escape(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if matches!(ch, '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl L2Backend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let data: Option<Vec<u8>> = conn.get(key).await.map_err(|e| redis_err("get", e))?;
        Ok(data)
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.manager.clone();
        match ttl_seconds {
            Some(ttl) => conn
                .set_ex(key, payload, ttl)
                .await
                .map_err(|e| redis_err("set", e)),
            None => conn.set(key, payload).await.map_err(|e| redis_err("set", e)),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn.del(key).await.map_err(|e| redis_err("del", e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let found: bool = conn.exists(key).await.map_err(|e| redis_err("exists", e))?;
        Ok(found)
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let mut keys = Vec::new();
        let mut iter = conn
            .scan_match::<_, String>(redis_glob_escape(pattern))
            .await
            .map_err(|e| redis_err("scan", e))?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn flush(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("flushdb", e))?;
        Ok(())
    }

    async fn key_count(&self) -> Result<u64> {
        let mut conn = self.manager.clone();
        let count: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("dbsize", e))?;
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_err("ping", e))?;
        Ok(())
    }
}

// == Memory Backend ==
/// In-process backend used when no Redis URL is configured, and by tests.
///
/// Shares the remote-tier contract (per-key expiry, pattern scan) without a
/// network round trip; it does not survive process restarts.
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<HashMap<String, (Vec<u8>, Option<u64>)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl L2Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Expiry is decided and applied under one write lock, so a racing
        // set can never have its fresh value dropped.
        let mut data = self.data.write().await;
        let expired = match data.get(key) {
            None => return Ok(None),
            Some((payload, expires_at)) => match expires_at {
                Some(at) if current_timestamp_ms() >= *at => true,
                _ => return Ok(Some(payload.clone())),
            },
        };
        debug_assert!(expired);
        data.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|ttl| current_timestamp_ms() + ttl * 1000);
        self.data
            .write()
            .await
            .insert(key.to_string(), (payload, expires_at));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let data = self.data.read().await;
        Ok(match data.get(key) {
            Some((_, Some(at))) => current_timestamp_ms() < *at,
            Some((_, None)) => true,
            None => false,
        })
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = crate::key::compile_pattern(pattern)?;
        let data = self.data.read().await;
        Ok(data
            .keys()
            .filter(|key| matcher.matches(key))
            .cloned()
            .collect())
    }

    async fn flush(&self) -> Result<()> {
        self.data.write().await.clear();
        Ok(())
    }

    async fn key_count(&self) -> Result<u64> {
        Ok(self.data.read().await.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// == L2 Store ==
/// The networked tier: a backend wrapped with timeout, retry, and the
/// entry wire format.
pub struct L2Store {
    backend: Box<dyn L2Backend>,
    timeout: Duration,
    retries: u32,
}

impl L2Store {
    /// Creates a new L2Store over the given backend.
    ///
    /// # Arguments
    /// * `backend` - The remote key/value service
    /// * `timeout` - Per-attempt operation timeout
    /// * `retries` - Additional attempts after the first failure
    pub fn new(backend: Box<dyn L2Backend>, timeout: Duration, retries: u32) -> Self {
        Self {
            backend,
            timeout,
            retries,
        }
    }

    /// Runs one backend call with timeout and bounded retry.
    ///
    /// Exhausting every attempt yields `TierUnavailable`; the engine treats
    /// that as tier degradation, not as a cache miss.
    async fn with_retry<'a, T, F>(&'a self, op: &str, mut call: F) -> Result<T>
    where
        F: FnMut(&'a dyn L2Backend) -> BoxedOp<'a, T>,
    {
        let attempts = self.retries + 1;
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(20 * attempt as u64)).await;
            }
            match tokio::time::timeout(self.timeout, call(self.backend.as_ref())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    debug!("L2 {} attempt {} failed: {}", op, attempt + 1, err);
                    last_err = Some(err);
                }
                Err(_) => {
                    debug!("L2 {} attempt {} timed out", op, attempt + 1);
                    last_err = Some(CacheError::TierUnavailable(format!(
                        "{} timed out after {:?}",
                        op, self.timeout
                    )));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            CacheError::TierUnavailable(format!("{} failed with no attempts", op))
        }))
    }

    // == Get ==
    /// Fetches and decodes an entry; `Ok(None)` means the key is absent.
    ///
    /// An entry whose own expiry has passed (backend TTL lagging) is treated
    /// as absent.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let payload = self.with_retry("get", |b| Box::pin(b.get(key))).await?;
        let Some(bytes) = payload else {
            return Ok(None);
        };

        let wire: WireEntry = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Serialization(format!("L2 decode failed: {}", e)))?;

        if let Some(expires) = wire.expires_at {
            if current_timestamp_ms() >= expires {
                return Ok(None);
            }
        }

        Ok(Some(CacheEntry {
            size_bytes: wire.value.size_bytes(),
            value: wire.value,
            created_at: wire.created_at,
            expires_at: wire.expires_at,
            tags: wire.tags.into_iter().collect(),
            access_count: 0,
        }))
    }

    // == Set ==
    /// Encodes and stores an entry with the given TTL.
    pub async fn set(&self, key: &str, entry: &CacheEntry, ttl_seconds: Option<u64>) -> Result<()> {
        let wire = WireEntry {
            value: entry.value.clone(),
            tags: entry.tags.iter().cloned().collect(),
            created_at: entry.created_at,
            expires_at: ttl_seconds.map(|ttl| current_timestamp_ms() + ttl * 1000),
        };
        let payload = serde_json::to_vec(&wire)
            .map_err(|e| CacheError::Serialization(format!("L2 encode failed: {}", e)))?;

        self.with_retry("set", move |b| Box::pin(b.set(key, payload.clone(), ttl_seconds)))
            .await
    }

    // == Remove ==
    /// Removes a key; idempotent. Returns whether something was removed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.with_retry("del", |b| Box::pin(b.remove(key))).await
    }

    // == Exists ==
    /// Cheap presence probe, without fetching the payload.
    ///
    /// The engine uses this to decide whether a key removed from L1 is
    /// truly gone or still reachable through the remote tier.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.with_retry("exists", |b| Box::pin(b.exists(key))).await
    }

    // == Keys Matching ==
    /// Delegates to the backend's native pattern scan.
    ///
    /// Best-effort: the engine falls back to L1-only pattern invalidation
    /// when this fails.
    pub async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        self.with_retry("scan", |b| Box::pin(b.keys_matching(pattern)))
            .await
    }

    /// Clears the whole remote tier.
    pub async fn flush(&self) -> Result<()> {
        self.with_retry("flush", |b| Box::pin(b.flush())).await
    }

    /// Remote tier key count, if obtainable.
    pub async fn key_count(&self) -> Result<u64> {
        self.with_retry("dbsize", |b| Box::pin(b.key_count())).await
    }

    // == Health Probe ==
    /// Binary reachability probe; a single attempt, no retries.
    pub async fn ping(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.backend.ping()).await,
            Ok(Ok(()))
        )
    }
}

/// Boxed backend operation future, as produced by the retry closures.
type BoxedOp<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn store() -> L2Store {
        L2Store::new(
            Box::new(MemoryBackend::new()),
            Duration::from_millis(200),
            1,
        )
    }

    fn entry(payload: &str, tags: &[&str]) -> CacheEntry {
        CacheEntry::new(
            CacheValue::Bytes(payload.as_bytes().to_vec()),
            None,
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let l2 = store();
        l2.set("cache:jobs:1", &entry("v1", &["jobs"]), Some(300))
            .await
            .unwrap();

        let fetched = l2.get("cache:jobs:1").await.unwrap().unwrap();
        assert_eq!(fetched.value, CacheValue::Bytes(b"v1".to_vec()));
        assert!(fetched.tags.contains("jobs"));
        assert!(fetched.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_absent_key_is_none_not_error() {
        let l2 = store();
        assert!(l2.get("cache:missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let l2 = store();
        l2.set("cache:jobs:1", &entry("v1", &[]), None).await.unwrap();

        assert!(l2.remove("cache:jobs:1").await.unwrap());
        assert!(!l2.remove("cache:jobs:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let l2 = store();
        // Zero TTL expires immediately
        l2.set("cache:jobs:1", &entry("v1", &[]), Some(0))
            .await
            .unwrap();

        assert!(l2.get("cache:jobs:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_honors_expiry() {
        let l2 = store();
        l2.set("cache:live", &entry("v1", &[]), Some(300)).await.unwrap();
        l2.set("cache:dead", &entry("v2", &[]), Some(0)).await.unwrap();

        assert!(l2.exists("cache:live").await.unwrap());
        assert!(!l2.exists("cache:dead").await.unwrap());
        assert!(!l2.exists("cache:missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_read_does_not_clobber_concurrent_write() {
        let backend = MemoryBackend::new();
        backend.set("k", b"old".to_vec(), Some(0)).await.unwrap();

        // An expired read racing a fresh write must never drop the new value
        let (read, _) = tokio::join!(backend.get("k"), backend.set("k", b"new".to_vec(), None));
        read.unwrap();

        let survived = backend.get("k").await.unwrap();
        assert_eq!(survived, Some(b"new".to_vec()));
    }

    #[test]
    fn test_redis_glob_escape_preserves_only_star() {
        assert_eq!(redis_glob_escape("cache:jobs:*"), "cache:jobs:*");
        assert_eq!(redis_glob_escape("cache:q?[a]:*"), r"cache:q\?\[a\]:*");
        assert_eq!(redis_glob_escape(r"a\b*"), r"a\\b*");
    }

    #[tokio::test]
    async fn test_keys_matching() {
        let l2 = store();
        l2.set("cache:jobs:1", &entry("v1", &[]), None).await.unwrap();
        l2.set("cache:jobs:2", &entry("v2", &[]), None).await.unwrap();
        l2.set("cache:users:1", &entry("v3", &[]), None).await.unwrap();

        let mut keys = l2.keys_matching("cache:jobs:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cache:jobs:1", "cache:jobs:2"]);
    }

    #[tokio::test]
    async fn test_flush_and_key_count() {
        let l2 = store();
        l2.set("a", &entry("v", &[]), None).await.unwrap();
        l2.set("b", &entry("v", &[]), None).await.unwrap();
        assert_eq!(l2.key_count().await.unwrap(), 2);

        l2.flush().await.unwrap();
        assert_eq!(l2.key_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ping_memory_backend() {
        let l2 = store();
        assert!(l2.ping().await);
    }

    // Backend that fails a fixed number of times before succeeding
    struct FlakyBackend {
        inner: MemoryBackend,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl L2Backend for FlakyBackend {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 0).then(|| n - 1)
            }).is_ok() {
                return Err(CacheError::TierUnavailable("injected".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, payload: Vec<u8>, ttl: Option<u64>) -> Result<()> {
            self.inner.set(key, payload, ttl).await
        }

        async fn remove(&self, key: &str) -> Result<bool> {
            self.inner.remove(key).await
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }

        async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
            self.inner.keys_matching(pattern).await
        }

        async fn flush(&self) -> Result<()> {
            self.inner.flush().await
        }

        async fn key_count(&self) -> Result<u64> {
            self.inner.key_count().await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let backend = FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicU32::new(1),
        };
        backend
            .inner
            .set("k", serde_json::to_vec(&WireEntry {
                value: CacheValue::Bytes(b"v".to_vec()),
                tags: vec![],
                created_at: current_timestamp_ms(),
                expires_at: None,
            }).unwrap(), None)
            .await
            .unwrap();

        let l2 = L2Store::new(Box::new(backend), Duration::from_millis(200), 2);
        let fetched = l2.get("k").await.unwrap();
        assert!(fetched.is_some(), "retry should mask one transient failure");
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_tier_failure_not_miss() {
        let backend = FlakyBackend {
            inner: MemoryBackend::new(),
            failures_left: AtomicU32::new(10),
        };
        let l2 = L2Store::new(Box::new(backend), Duration::from_millis(200), 1);

        let result = l2.get("k").await;
        assert!(matches!(result, Err(CacheError::TierUnavailable(_))));
    }

    #[derive(Default)]
    struct BrokenEncodingBackend;

    #[async_trait]
    impl L2Backend for BrokenEncodingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(Some(b"not json".to_vec()))
        }

        async fn set(&self, _: &str, _: Vec<u8>, _: Option<u64>) -> Result<()> {
            Ok(())
        }

        async fn remove(&self, _: &str) -> Result<bool> {
            Ok(false)
        }

        async fn exists(&self, _: &str) -> Result<bool> {
            Ok(true)
        }

        async fn keys_matching(&self, _: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn flush(&self) -> Result<()> {
            Ok(())
        }

        async fn key_count(&self) -> Result<u64> {
            Ok(0)
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_serialization_error() {
        let l2 = L2Store::new(
            Box::new(BrokenEncodingBackend),
            Duration::from_millis(200),
            0,
        );
        let result = l2.get("k").await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }
}

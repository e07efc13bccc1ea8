//! Cache Engine Module
//!
//! The façade over both tiers: read-through gets with tier promotion,
//! best-effort write-through sets, invalidation fan-out by key, pattern,
//! and tag, and stats/health snapshots for the admin surface.
//!
//! Lock ordering: L1 before TagIndex, and neither lock is held across an
//! L2 network call.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEntry, CacheValue, L1Lookup, L1Store, L2Store, StatsCollector, TagIndex, TierStats,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::key::compile_pattern;

// == Public Constants ==
/// Literal token required to confirm a full flush.
pub const FLUSH_CONFIRMATION: &str = "flush-all-cache";

/// Minimum lookups against a tier before hit rate feeds health classification.
const MIN_LOOKUPS_FOR_HEALTH: u64 = 100;

// == Set Options ==
/// Per-call options for [`CacheEngine::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// L1 TTL in seconds; engine default when None
    pub l1_ttl: Option<u64>,
    /// L2 TTL in seconds; engine default when None
    pub l2_ttl: Option<u64>,
    /// Semantic tags for bulk invalidation
    pub tags: Vec<String>,
}

// == Snapshots ==
/// Per-tier health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierHealth {
    Healthy,
    Degraded,
    Unreachable,
}

/// L1 figures for the stats snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct L1Snapshot {
    #[serde(flatten)]
    pub stats: TierStats,
    /// Current entry count
    pub entries: usize,
    /// Estimated aggregate value bytes
    pub bytes: usize,
    /// Total LRU evictions
    pub evictions: u64,
}

/// L2 figures for the stats snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct L2Snapshot {
    #[serde(flatten)]
    pub stats: TierStats,
    /// Whether the reachability probe succeeded
    pub connected: bool,
    /// Remote key count, when the backend could report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<u64>,
}

/// Aggregate + per-tier statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub timestamp: String,
    pub overall: TierStats,
    pub l1: L1Snapshot,
    pub l2: L2Snapshot,
}

/// Per-tier health for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub l1: L1Health,
    pub l2: L2Health,
}

#[derive(Debug, Clone, Serialize)]
pub struct L1Health {
    pub status: TierHealth,
    pub size: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct L2Health {
    pub status: TierHealth,
    pub connected: bool,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

/// One row of the admin key browser.
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub key: String,
    /// Value kind: "bytes" or "json"
    pub kind: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub size: usize,
    pub access_count: u64,
    pub tags: Vec<String>,
    pub is_expired: bool,
}

/// A page of the admin key browser.
#[derive(Debug, Clone, Serialize)]
pub struct KeyPage {
    pub keys: Vec<KeyInfo>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

// == Single-Flight Guard ==
/// Removes the in-flight entry when the leader finishes, even on panic.
struct InFlightGuard<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Only remove our own entry; a newer leader may already have
        // registered a fresh flight under the same key.
        self.map
            .remove_if(&self.key, |_, current| Arc::ptr_eq(current, &self.lock));
    }
}

// == Cache Engine ==
/// Two-tier cache façade.
///
/// Explicitly constructed and injected into consumers; there is no
/// process-wide singleton. The L2 tier is optional: without it the engine
/// runs L1-only and reports the remote tier as unreachable.
pub struct CacheEngine {
    l1: RwLock<L1Store>,
    tags: RwLock<TagIndex>,
    l2: Option<L2Store>,
    stats: StatsCollector,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    l1_default_ttl: u64,
    l2_default_ttl: u64,
    degraded_hit_rate: f64,
    degraded_error_rate: f64,
}

impl CacheEngine {
    // == Constructor ==
    /// Creates an engine over an already-wired L2 store (or none).
    pub fn new(config: &Config, l2: Option<L2Store>) -> Self {
        Self {
            l1: RwLock::new(L1Store::new(config.l1_max_entries, config.l1_max_bytes)),
            tags: RwLock::new(TagIndex::new()),
            l2,
            stats: StatsCollector::new(),
            in_flight: DashMap::new(),
            l1_default_ttl: config.l1_default_ttl,
            l2_default_ttl: config.l2_default_ttl,
            degraded_hit_rate: config.degraded_hit_rate,
            degraded_error_rate: config.degraded_error_rate,
        }
    }

    // == Get ==
    /// Looks up a key: L1 first, then L2 with promotion back into L1.
    ///
    /// `Ok(None)` is a plain miss. An unreachable L2 degrades to L1-only
    /// behavior and is never an error here; an undecodable L2 payload is
    /// surfaced for this call only.
    pub async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let lookup = { self.l1.write().await.get(key) };
        let locally_expired = match lookup {
            L1Lookup::Hit(entry) => {
                self.stats.record_l1_hit();
                return Ok(Some(entry.value));
            }
            L1Lookup::Expired(_) => {
                self.stats.record_l1_miss();
                true
            }
            L1Lookup::Miss => {
                self.stats.record_l1_miss();
                false
            }
        };

        let Some(l2) = &self.l2 else {
            if locally_expired {
                self.tags.write().await.detach(key);
            }
            return Ok(None);
        };

        match l2.get(key).await {
            Ok(Some(entry)) => {
                self.stats.record_l2_op(false);
                self.stats.record_l2_hit();
                let value = entry.value.clone();
                self.promote(key, entry).await;
                Ok(Some(value))
            }
            Ok(None) => {
                self.stats.record_l2_op(false);
                self.stats.record_l2_miss();
                if locally_expired {
                    // Gone from both stores; membership may be dropped now
                    self.tags.write().await.detach(key);
                }
                Ok(None)
            }
            Err(CacheError::Serialization(msg)) => {
                self.stats.record_l2_op(false);
                Err(CacheError::Serialization(msg))
            }
            Err(err) => {
                self.stats.record_l2_op(true);
                warn!("L2 read for '{}' failed, degrading to L1-only: {}", key, err);
                Ok(None)
            }
        }
    }

    /// Copies an L2 hit back into L1 and re-attaches its tags.
    ///
    /// The promoted entry's L1 TTL never exceeds the remaining L2 lifetime,
    /// so L1 cannot outlive an L2 invalidation by more than one read-through
    /// cycle.
    async fn promote(&self, key: &str, entry: CacheEntry) {
        let l1_ttl = match entry.ttl_remaining() {
            Some(remaining) => self.l1_default_ttl.min(remaining.max(1)),
            None => self.l1_default_ttl,
        };
        let tag_list: Vec<String> = entry.tags.iter().cloned().collect();
        let fresh = CacheEntry::new(entry.value, Some(l1_ttl), entry.tags);

        let insert = { self.l1.write().await.set(key.to_string(), fresh) };
        self.tags.write().await.attach(&tag_list, key);
        for (victim_key, _) in &insert.evicted {
            self.stats.record_eviction();
            self.detach_if_absent(victim_key).await;
        }
        debug!("Promoted '{}' from L2 into L1", key);
    }

    /// Drops a key's tag membership only once no tier can still serve it.
    ///
    /// Keys removed from L1 by eviction or sweep may live on in L2 with a
    /// longer TTL; detaching them early would put them out of reach of tag
    /// invalidation. On a failed presence probe membership is kept, since
    /// invalidating an already-absent key later is a harmless no-op.
    async fn detach_if_absent(&self, key: &str) {
        if let Some(l2) = &self.l2 {
            match l2.exists(key).await {
                Ok(true) => {
                    self.stats.record_l2_op(false);
                    return;
                }
                Ok(false) => {
                    self.stats.record_l2_op(false);
                }
                Err(err) => {
                    self.stats.record_l2_op(true);
                    warn!("L2 presence check for '{}' failed, keeping tag membership: {}", key, err);
                    return;
                }
            }
        }
        self.tags.write().await.detach(key);
    }

    // == Set ==
    /// Writes to both tiers.
    ///
    /// L1 is authoritative for the remainder of its TTL; an L2 failure is
    /// logged and absorbed, so the call still succeeds for the caller.
    pub async fn set(&self, key: &str, value: CacheValue, opts: SetOptions) -> Result<()> {
        let l1_ttl = opts.l1_ttl.unwrap_or(self.l1_default_ttl);
        let l2_ttl = opts.l2_ttl.unwrap_or(self.l2_default_ttl);
        let tag_set: HashSet<String> = opts.tags.iter().cloned().collect();
        let entry = CacheEntry::new(value, Some(l1_ttl), tag_set);

        let insert = { self.l1.write().await.set(key.to_string(), entry.clone()) };
        if insert.stored {
            self.tags.write().await.attach(&opts.tags, key);
        }
        for (victim_key, _) in &insert.evicted {
            self.stats.record_eviction();
            self.detach_if_absent(victim_key).await;
        }

        if let Some(l2) = &self.l2 {
            match l2.set(key, &entry, Some(l2_ttl)).await {
                Ok(()) => {
                    self.stats.record_l2_op(false);
                    if !insert.stored {
                        // Only the remote tier holds this key; the tag index
                        // must still reach it.
                        self.tags.write().await.attach(&opts.tags, key);
                    }
                }
                Err(err @ CacheError::Serialization(_)) => {
                    self.stats.record_l2_op(false);
                    return Err(err);
                }
                Err(err) => {
                    self.stats.record_l2_op(true);
                    warn!("L2 write for '{}' failed, L1 remains authoritative: {}", key, err);
                }
            }
        }

        Ok(())
    }

    // == Get Or Load ==
    /// Read-through with single-flight de-duplication.
    ///
    /// Concurrent callers missing on the same key coalesce: one runs the
    /// loader while the rest wait and then re-read the freshly cached value.
    pub async fn get_or_load<F, Fut>(&self, key: &str, opts: SetOptions, loader: F) -> Result<CacheValue>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let lock = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _held = lock.lock().await;
        let _guard = InFlightGuard {
            map: &self.in_flight,
            key: key.to_string(),
            lock: lock.clone(),
        };

        // The leader may have populated the cache while we waited
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = loader().await?;
        self.set(key, value.clone(), opts).await?;
        Ok(value)
    }

    // == Invalidate ==
    /// Removes a key from both tiers and the tag index; idempotent.
    ///
    /// Returns whether either tier actually held the key.
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        let removed_l1 = { self.l1.write().await.remove(key).is_some() };
        self.tags.write().await.detach(key);

        let mut removed = removed_l1;
        if let Some(l2) = &self.l2 {
            match l2.remove(key).await {
                Ok(removed_l2) => {
                    self.stats.record_l2_op(false);
                    removed |= removed_l2;
                }
                Err(err) => {
                    self.stats.record_l2_op(true);
                    warn!("L2 invalidation for '{}' failed: {}", key, err);
                }
            }
        }

        Ok(removed)
    }

    // == Invalidate By Pattern ==
    /// Invalidates every key matching the wildcard pattern.
    ///
    /// Compilation failure touches zero keys. L1 enumeration is exact; the
    /// L2 scan is best-effort and a scan failure degrades to L1-only reach.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize> {
        let matcher = compile_pattern(pattern)?;

        let mut keys: HashSet<String> = {
            self.l1
                .read()
                .await
                .keys_matching(&matcher)
                .map(str::to_string)
                .collect()
        };

        if let Some(l2) = &self.l2 {
            match l2.keys_matching(pattern).await {
                Ok(remote_keys) => {
                    self.stats.record_l2_op(false);
                    keys.extend(remote_keys);
                }
                Err(err) => {
                    self.stats.record_l2_op(true);
                    warn!(
                        "L2 scan for pattern '{}' failed; invalidating L1 matches only: {}",
                        pattern, err
                    );
                }
            }
        }

        let mut count = 0;
        for key in keys {
            if self.invalidate(&key).await? {
                count += 1;
            }
        }

        info!("Pattern '{}' invalidated {} keys", pattern, count);
        Ok(count)
    }

    // == Invalidate By Tag ==
    /// Invalidates every key carrying the tag, then drops the tag bucket.
    pub async fn invalidate_by_tag(&self, tag: &str) -> Result<usize> {
        let keys = { self.tags.read().await.keys_for_tag(tag) };

        let mut count = 0;
        for key in &keys {
            if self.invalidate(key).await? {
                count += 1;
            }
        }
        self.tags.write().await.clear_tag(tag);

        info!("Tag '{}' invalidated {} keys", tag, count);
        Ok(count)
    }

    // == Flush ==
    /// Clears both tiers and the whole tag index.
    ///
    /// Destructive and irreversible for in-flight traffic, so the exact
    /// literal [`FLUSH_CONFIRMATION`] is required. Historical hit/miss
    /// counters persist; only size gauges reset. An L2 flush failure is
    /// reported (L1 and the tag index are already cleared at that point)
    /// so the operator can retry.
    pub async fn flush(&self, confirm: &str) -> Result<()> {
        if confirm != FLUSH_CONFIRMATION {
            return Err(CacheError::FlushNotConfirmed(format!(
                "flush requires the literal confirmation token '{}'",
                FLUSH_CONFIRMATION
            )));
        }

        self.l1.write().await.clear();
        self.tags.write().await.clear();

        if let Some(l2) = &self.l2 {
            match l2.flush().await {
                Ok(()) => self.stats.record_l2_op(false),
                Err(err) => {
                    self.stats.record_l2_op(true);
                    return Err(err);
                }
            }
        }

        info!("Cache flushed on operator request");
        Ok(())
    }

    // == Stats ==
    /// Aggregate and per-tier statistics snapshot.
    pub async fn stats(&self) -> StatsSnapshot {
        let (entries, bytes) = {
            let l1 = self.l1.read().await;
            (l1.len(), l1.current_bytes())
        };

        let (connected, keys) = match &self.l2 {
            Some(l2) => {
                let connected = l2.ping().await;
                let keys = if connected {
                    l2.key_count().await.ok()
                } else {
                    None
                };
                (connected, keys)
            }
            None => (false, None),
        };

        StatsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            overall: self.stats.overall(),
            l1: L1Snapshot {
                stats: self.stats.l1_stats(),
                entries,
                bytes,
                evictions: self.stats.evictions(),
            },
            l2: L2Snapshot {
                stats: self.stats.l2_stats(),
                connected,
                keys,
            },
        }
    }

    // == Health ==
    /// Per-tier health classification.
    ///
    /// A tier that answers probes may still be `degraded` when its hit rate
    /// falls below the configured floor (after a minimum number of lookups)
    /// or, for L2, when its error rate crosses the configured ceiling.
    pub async fn health(&self) -> HealthSnapshot {
        let l1_stats = self.stats.l1_stats();
        let l1_size = { self.l1.read().await.len() };

        let l2_stats = self.stats.l2_stats();
        let l2_connected = match &self.l2 {
            Some(l2) => l2.ping().await,
            None => false,
        };

        HealthSnapshot {
            l1: L1Health {
                status: self.classify(l1_stats, true, 0.0),
                size: l1_size,
                hit_rate: l1_stats.hit_rate,
                miss_rate: l1_stats.miss_rate,
            },
            l2: L2Health {
                status: self.classify(l2_stats, l2_connected, self.stats.l2_error_rate()),
                connected: l2_connected,
                hit_rate: l2_stats.hit_rate,
                miss_rate: l2_stats.miss_rate,
            },
        }
    }

    fn classify(&self, stats: TierStats, reachable: bool, error_rate: f64) -> TierHealth {
        if !reachable {
            return TierHealth::Unreachable;
        }
        if error_rate > self.degraded_error_rate {
            return TierHealth::Degraded;
        }
        if stats.total() >= MIN_LOOKUPS_FOR_HEALTH && stats.hit_rate < self.degraded_hit_rate {
            return TierHealth::Degraded;
        }
        TierHealth::Healthy
    }

    // == Key Browser ==
    /// Paginated listing of L1 entries, optionally filtered by pattern and
    /// value kind ("bytes" or "json").
    ///
    /// Pages are 1-based and ordered by key for stable pagination.
    pub async fn browse_keys(
        &self,
        page: usize,
        limit: usize,
        pattern: Option<&str>,
        kind: Option<&str>,
    ) -> Result<KeyPage> {
        let matcher = pattern.map(compile_pattern).transpose()?;

        let l1 = self.l1.read().await;
        let mut rows: Vec<KeyInfo> = l1
            .iter()
            .filter(|(key, _)| matcher.as_ref().map_or(true, |m| m.matches(key)))
            .filter(|(_, entry)| kind.map_or(true, |k| value_kind(&entry.value) == k))
            .map(|(key, entry)| {
                let mut tags: Vec<String> = entry.tags.iter().cloned().collect();
                tags.sort();
                KeyInfo {
                    key: key.clone(),
                    kind: value_kind(&entry.value).to_string(),
                    created_at: format_timestamp(entry.created_at),
                    expires_at: entry.expires_at.map(format_timestamp),
                    size: entry.size_bytes,
                    access_count: entry.access_count,
                    tags,
                    is_expired: entry.is_expired(),
                }
            })
            .collect();
        drop(l1);

        rows.sort_by(|a, b| a.key.cmp(&b.key));
        let total = rows.len();
        let limit = limit.max(1);
        let page = page.max(1);
        let total_pages = total.div_ceil(limit).max(1);
        let start = (page - 1).saturating_mul(limit).min(total);
        let end = (start + limit).min(total);

        Ok(KeyPage {
            keys: rows[start..end].to_vec(),
            page,
            limit,
            total,
            total_pages,
        })
    }

    // == Sweep ==
    /// Removes expired L1 entries, detaching from the tag index those keys
    /// that are gone from L2 as well.
    ///
    /// Called by the background sweep task; lazy deletion on access covers
    /// keys the sweep has not reached yet.
    pub async fn sweep_expired(&self) -> usize {
        let swept = { self.l1.write().await.sweep_expired() };
        for (key, _) in &swept {
            self.detach_if_absent(key).await;
        }
        swept.len()
    }

    /// Explicit operator reset of hit/miss counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
        info!("Cache statistics reset on operator request");
    }
}

fn value_kind(value: &CacheValue) -> &'static str {
    match value {
        CacheValue::Bytes(_) => "bytes",
        CacheValue::Json(_) => "json",
    }
}

fn format_timestamp(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

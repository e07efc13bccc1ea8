//! Cache Statistics Module
//!
//! Lock-free per-tier hit/miss counters plus eviction and L2 error tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Tier Counters ==
/// Monotonic hit/miss counters for a single tier.
///
/// Counters only ever increase; they reset on process restart or through an
/// explicit operator reset, never silently.
#[derive(Debug, Default)]
pub struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TierCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TierStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        TierStats::new(hits, misses)
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

// == Tier Stats ==
/// Point-in-time hit/miss figures for one tier.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

impl TierStats {
    pub fn new(hits: u64, misses: u64) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        let miss_rate = if total == 0 { 0.0 } else { 1.0 - hit_rate };
        Self {
            hits,
            misses,
            hit_rate,
            miss_rate,
        }
    }

    /// Total lookups recorded against this tier.
    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }
}

// == Stats Collector ==
/// Aggregates counters across both tiers.
///
/// Increments are lock-free; the collector is shared behind an `Arc` and
/// written from any request path without coordination.
#[derive(Debug, Default)]
pub struct StatsCollector {
    l1: TierCounters,
    l2: TierCounters,
    evictions: AtomicU64,
    l2_ops: AtomicU64,
    l2_errors: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_l1_hit(&self) {
        self.l1.record_hit();
    }

    pub fn record_l1_miss(&self) {
        self.l1.record_miss();
    }

    pub fn record_l2_hit(&self) {
        self.l2.record_hit();
    }

    pub fn record_l2_miss(&self) {
        self.l2.record_miss();
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the outcome of one L2 network operation.
    pub fn record_l2_op(&self, failed: bool) {
        self.l2_ops.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.l2_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn l1_stats(&self) -> TierStats {
        self.l1.snapshot()
    }

    pub fn l2_stats(&self) -> TierStats {
        self.l2.snapshot()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Fraction of L2 operations that failed; 0.0 before any operation.
    pub fn l2_error_rate(&self) -> f64 {
        let ops = self.l2_ops.load(Ordering::Relaxed);
        if ops == 0 {
            0.0
        } else {
            self.l2_errors.load(Ordering::Relaxed) as f64 / ops as f64
        }
    }

    /// Combined hit/miss figures across both tiers.
    ///
    /// A read served by either tier counts as one overall hit; a read that
    /// missed both tiers counts as one overall miss (the L2 miss, since the
    /// L1 miss was only a tier consultation, not a final answer).
    pub fn overall(&self) -> TierStats {
        let l1 = self.l1.snapshot();
        let l2 = self.l2.snapshot();
        // L1 misses that never reached L2 (tier disabled or unreachable)
        // were final answers too.
        let unconsulted = l1.misses.saturating_sub(l2.total());
        TierStats::new(l1.hits + l2.hits, l2.misses + unconsulted)
    }

    /// Explicit operator reset of all counters.
    pub fn reset(&self) {
        self.l1.reset();
        self.l2.reset();
        self.evictions.store(0, Ordering::Relaxed);
        self.l2_ops.store(0, Ordering::Relaxed);
        self.l2_errors.store(0, Ordering::Relaxed);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = StatsCollector::new();
        let l1 = stats.l1_stats();
        assert_eq!(l1.hits, 0);
        assert_eq!(l1.misses, 0);
        assert_eq!(l1.hit_rate, 0.0);
        assert_eq!(stats.evictions(), 0);
    }

    #[test]
    fn test_hit_rate_derivation() {
        let stats = StatsCollector::new();
        for _ in 0..8 {
            stats.record_l1_hit();
        }
        stats.record_l1_miss();
        stats.record_l1_miss();

        let l1 = stats.l1_stats();
        assert_eq!(l1.hits, 8);
        assert_eq!(l1.misses, 2);
        assert!((l1.hit_rate - 0.8).abs() < 1e-9);
        assert!((l1.miss_rate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_l2_error_rate() {
        let stats = StatsCollector::new();
        assert_eq!(stats.l2_error_rate(), 0.0);

        stats.record_l2_op(false);
        stats.record_l2_op(true);
        assert!((stats.l2_error_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_overall_counts_served_reads_once() {
        let stats = StatsCollector::new();

        // One read served from L1
        stats.record_l1_hit();
        // One read promoted from L2
        stats.record_l1_miss();
        stats.record_l2_hit();
        // One total miss
        stats.record_l1_miss();
        stats.record_l2_miss();

        let overall = stats.overall();
        assert_eq!(overall.hits, 2);
        assert_eq!(overall.misses, 1);
        assert!((overall.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_is_explicit_and_total() {
        let stats = StatsCollector::new();
        stats.record_l1_hit();
        stats.record_l2_miss();
        stats.record_eviction();
        stats.record_l2_op(true);

        stats.reset();

        assert_eq!(stats.l1_stats().total(), 0);
        assert_eq!(stats.l2_stats().total(), 0);
        assert_eq!(stats.evictions(), 0);
        assert_eq!(stats.l2_error_rate(), 0.0);
    }
}

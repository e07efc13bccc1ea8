//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies, shaped for the
//! operator dashboard (camelCase field names).

use serde::Serialize;

use crate::cache::{HealthSnapshot, KeyInfo, KeyPage, StatsSnapshot, TierHealth, TierStats};

/// Hit/miss figures for one tier or the aggregate view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRates {
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub total_hits: u64,
    pub total_misses: u64,
}

impl From<TierStats> for TierRates {
    fn from(stats: TierStats) -> Self {
        Self {
            hit_rate: stats.hit_rate,
            miss_rate: stats.miss_rate,
            total_hits: stats.hits,
            total_misses: stats.misses,
        }
    }
}

/// L1 section of the stats response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L1StatsBody {
    #[serde(flatten)]
    pub rates: TierRates,
    pub entries: usize,
    pub bytes: usize,
    pub evictions: u64,
}

/// L2 section of the stats response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L2StatsBody {
    #[serde(flatten)]
    pub rates: TierRates,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<u64>,
}

/// Response body for GET /cache/stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub timestamp: String,
    pub overall: TierRates,
    pub l1: L1StatsBody,
    pub l2: L2StatsBody,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(snapshot: StatsSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            overall: snapshot.overall.into(),
            l1: L1StatsBody {
                rates: snapshot.l1.stats.into(),
                entries: snapshot.l1.entries,
                bytes: snapshot.l1.bytes,
                evictions: snapshot.l1.evictions,
            },
            l2: L2StatsBody {
                rates: snapshot.l2.stats.into(),
                connected: snapshot.l2.connected,
                keys: snapshot.l2.keys,
            },
        }
    }
}

/// L1 section of the health response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L1HealthBody {
    pub status: TierHealth,
    pub size: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

/// L2 section of the health response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L2HealthBody {
    pub status: TierHealth,
    pub connected: bool,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

/// Response body for GET /cache/health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub l1: L1HealthBody,
    pub l2: L2HealthBody,
}

impl From<HealthSnapshot> for HealthResponse {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            l1: L1HealthBody {
                status: snapshot.l1.status,
                size: snapshot.l1.size,
                hit_rate: snapshot.l1.hit_rate,
                miss_rate: snapshot.l1.miss_rate,
            },
            l2: L2HealthBody {
                status: snapshot.l2.status,
                connected: snapshot.l2.connected,
                hit_rate: snapshot.l2.hit_rate,
                miss_rate: snapshot.l2.miss_rate,
            },
        }
    }
}

/// One row of the key browser response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRow {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub size: usize,
    pub access_count: u64,
    pub tags: Vec<String>,
    pub is_expired: bool,
}

impl From<KeyInfo> for KeyRow {
    fn from(info: KeyInfo) -> Self {
        Self {
            key: info.key,
            kind: info.kind,
            created_at: info.created_at,
            expires_at: info.expires_at,
            size: info.size,
            access_count: info.access_count,
            tags: info.tags,
            is_expired: info.is_expired,
        }
    }
}

/// Pagination metadata for the key browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Response body for GET /cache/keys
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysResponse {
    pub keys: Vec<KeyRow>,
    pub pagination: PaginationInfo,
}

impl From<KeyPage> for KeysResponse {
    fn from(page: KeyPage) -> Self {
        Self {
            pagination: PaginationInfo {
                page: page.page,
                limit: page.limit,
                total: page.total,
                total_pages: page.total_pages,
            },
            keys: page.keys.into_iter().map(KeyRow::from).collect(),
        }
    }
}

/// Response body for POST /cache/invalidate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub success: bool,
    pub invalidated_count: usize,
}

impl InvalidateResponse {
    pub fn new(invalidated_count: usize) -> Self {
        Self {
            success: true,
            invalidated_count,
        }
    }
}

/// Response body for POST /cache/flush
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub success: bool,
}

impl FlushResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_rates_from_stats() {
        let rates = TierRates::from(TierStats::new(8, 2));
        assert_eq!(rates.total_hits, 8);
        assert_eq!(rates.total_misses, 2);
        assert!((rates.hit_rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_stats_response_uses_camel_case() {
        let rates = TierRates::from(TierStats::new(1, 1));
        let json = serde_json::to_string(&rates).unwrap();
        assert!(json.contains("hitRate"));
        assert!(json.contains("totalHits"));
    }

    #[test]
    fn test_key_row_serializes_type_field() {
        let row = KeyRow {
            key: "cache:jobs:1".to_string(),
            kind: "json".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            expires_at: None,
            size: 10,
            access_count: 3,
            tags: vec!["jobs".to_string()],
            is_expired: false,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains(r#""type":"json""#));
        assert!(json.contains("accessCount"));
        assert!(json.contains("isExpired"));
        assert!(!json.contains("expiresAt"));
    }

    #[test]
    fn test_invalidate_response_serialize() {
        let json = serde_json::to_string(&InvalidateResponse::new(2)).unwrap();
        assert!(json.contains(r#""invalidatedCount":2"#));
        assert!(json.contains(r#""success":true"#));
    }

    #[test]
    fn test_tier_health_serializes_lowercase() {
        let json = serde_json::to_string(&TierHealth::Unreachable).unwrap();
        assert_eq!(json, r#""unreachable""#);
    }
}

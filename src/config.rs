//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the L1 tier can hold
    pub l1_max_entries: usize,
    /// Maximum aggregate value size of the L1 tier in bytes
    pub l1_max_bytes: usize,
    /// Default L1 TTL in seconds for entries without explicit TTL
    pub l1_default_ttl: u64,
    /// Default L2 TTL in seconds for entries without explicit TTL
    pub l2_default_ttl: u64,
    /// Redis connection URL for the L2 tier (None = in-process L2 backend)
    pub redis_url: Option<String>,
    /// Per-operation timeout for L2 calls in milliseconds
    pub l2_timeout_ms: u64,
    /// Number of retries for a failed L2 operation before it counts as a tier failure
    pub l2_retries: u32,
    /// HTTP server port
    pub server_port: u16,
    /// Background expiry sweep interval in seconds
    pub sweep_interval: u64,
    /// Hit rate below which an answering tier is classified as degraded
    pub degraded_hit_rate: f64,
    /// L2 error rate above which the tier is classified as degraded
    pub degraded_error_rate: f64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `L1_MAX_ENTRIES` - Maximum L1 entries (default: 10000)
    /// - `L1_MAX_BYTES` - Maximum aggregate L1 value bytes (default: 64 MB)
    /// - `L1_DEFAULT_TTL` - Default L1 TTL in seconds (default: 60)
    /// - `L2_DEFAULT_TTL` - Default L2 TTL in seconds (default: 300)
    /// - `REDIS_URL` - L2 Redis URL (default: unset, in-process backend)
    /// - `L2_TIMEOUT_MS` - L2 operation timeout in milliseconds (default: 250)
    /// - `L2_RETRIES` - L2 retry attempts (default: 2)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 30)
    /// - `DEGRADED_HIT_RATE` - Degraded-health hit rate floor (default: 0.1)
    /// - `DEGRADED_ERROR_RATE` - Degraded-health L2 error rate ceiling (default: 0.2)
    pub fn from_env() -> Self {
        Self {
            l1_max_entries: env::var("L1_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            l1_max_bytes: env::var("L1_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64 * 1024 * 1024),
            l1_default_ttl: env::var("L1_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            l2_default_ttl: env::var("L2_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            l2_timeout_ms: env::var("L2_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(250),
            l2_retries: env::var("L2_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            sweep_interval: env::var("SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            degraded_hit_rate: env::var("DEGRADED_HIT_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.1),
            degraded_error_rate: env::var("DEGRADED_ERROR_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.2),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            l1_max_entries: 10_000,
            l1_max_bytes: 64 * 1024 * 1024,
            l1_default_ttl: 60,
            l2_default_ttl: 300,
            redis_url: None,
            l2_timeout_ms: 250,
            l2_retries: 2,
            server_port: 3000,
            sweep_interval: 30,
            degraded_hit_rate: 0.1,
            degraded_error_rate: 0.2,
        }
    }
}

//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Request body for POST /cache/invalidate
///
/// Exactly one of `key`, `pattern`, or `tag` must be provided.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Exact key to invalidate
    #[serde(default)]
    pub key: Option<String>,
    /// Wildcard pattern selecting keys to invalidate
    #[serde(default)]
    pub pattern: Option<String>,
    /// Tag whose keys should all be invalidated
    #[serde(default)]
    pub tag: Option<String>,
}

/// The single target an [`InvalidateRequest`] resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidateTarget {
    Key(String),
    Pattern(String),
    Tag(String),
}

impl InvalidateRequest {
    /// Resolves the request to its single target.
    ///
    /// Rejects bodies with zero or more than one of the three fields.
    pub fn target(&self) -> Result<InvalidateTarget> {
        match (&self.key, &self.pattern, &self.tag) {
            (Some(key), None, None) => Ok(InvalidateTarget::Key(key.clone())),
            (None, Some(pattern), None) => Ok(InvalidateTarget::Pattern(pattern.clone())),
            (None, None, Some(tag)) => Ok(InvalidateTarget::Tag(tag.clone())),
            (None, None, None) => Err(CacheError::InvalidRequest(
                "one of 'key', 'pattern' or 'tag' is required".to_string(),
            )),
            _ => Err(CacheError::InvalidRequest(
                "'key', 'pattern' and 'tag' are mutually exclusive".to_string(),
            )),
        }
    }
}

/// Request body for POST /cache/flush
#[derive(Debug, Clone, Deserialize)]
pub struct FlushRequest {
    /// Must be the exact confirmation literal
    #[serde(default)]
    pub confirm: String,
}

/// Query string for GET /cache/keys
#[derive(Debug, Clone, Deserialize)]
pub struct KeysQuery {
    /// 1-based page number
    #[serde(default)]
    pub page: Option<usize>,
    /// Page size
    #[serde(default)]
    pub limit: Option<usize>,
    /// Optional wildcard filter
    #[serde(default)]
    pub pattern: Option<String>,
    /// Optional value-kind filter: "bytes" or "json"
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl KeysQuery {
    /// Default page size for the key browser.
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 500)
    }
}

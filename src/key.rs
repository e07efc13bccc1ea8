//! Key Codec Module
//!
//! Builds canonical cache keys from heterogeneous request inputs and
//! compiles wildcard invalidation patterns into matchers.

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Namespace prefix prepended to every canonical key
pub const KEY_NAMESPACE: &str = "cache";

/// Delimiter joining key parts
pub const KEY_DELIMITER: char = ':';

/// Maximum allowed canonical key length in bytes
pub const MAX_KEY_LENGTH: usize = 512;

// == Key Construction ==
/// Builds a canonical cache key from ordered parts.
///
/// Parts are joined with `:` under the `cache` namespace prefix. The same
/// ordered inputs always produce the same key; callers must include every
/// input that distinguishes two logical requests (route, method, principal,
/// query digest).
///
/// # Arguments
/// * `parts` - Ordered key components, all non-empty
pub fn build_key(parts: &[&str]) -> Result<String> {
    if parts.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Key must have at least one part".to_string(),
        ));
    }
    for part in parts {
        if part.is_empty() {
            return Err(CacheError::InvalidRequest(
                "Key parts cannot be empty".to_string(),
            ));
        }
    }

    let mut key = String::from(KEY_NAMESPACE);
    for part in parts {
        key.push(KEY_DELIMITER);
        key.push_str(part);
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }

    Ok(key)
}

// == Query Digest ==
/// Produces a short hex digest of query parameters for use as a key part.
///
/// Parameters are sorted by name before hashing so that parameter order in
/// the request never changes the resulting key.
pub fn query_digest(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    for (name, value) in sorted {
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(value.as_bytes());
        hasher.update([0x1e]);
    }

    // 16 hex chars keeps keys short while leaving collisions implausible
    hex::encode(hasher.finalize())[..16].to_string()
}

// == Pattern Matcher ==
/// Compiled invalidation pattern.
///
/// A pattern contains at most one `*` wildcard matching zero or more
/// characters, anchored to the full key. Patterns without a wildcard
/// compile to an exact match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Full-string equality
    Exact(String),
    /// `prefix*suffix`, where either side may be empty
    Wildcard { prefix: String, suffix: String },
}

impl Matcher {
    /// Tests a key against the compiled pattern.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Matcher::Exact(literal) => key == literal,
            Matcher::Wildcard { prefix, suffix } => {
                key.len() >= prefix.len() + suffix.len()
                    && key.starts_with(prefix.as_str())
                    && key.ends_with(suffix.as_str())
            }
        }
    }
}

/// Compiles a wildcard pattern string into a [`Matcher`].
///
/// Enforced restrictions: the pattern must be non-empty and may contain at
/// most one `*`. Anything else fails with `InvalidPattern` and no keys are
/// touched by the caller.
pub fn compile_pattern(pattern: &str) -> Result<Matcher> {
    if pattern.is_empty() {
        return Err(CacheError::InvalidPattern(
            "Pattern cannot be empty".to_string(),
        ));
    }

    let wildcard_count = pattern.matches('*').count();
    match wildcard_count {
        0 => Ok(Matcher::Exact(pattern.to_string())),
        1 => {
            let star = pattern.find('*').unwrap_or(0);
            Ok(Matcher::Wildcard {
                prefix: pattern[..star].to_string(),
                suffix: pattern[star + 1..].to_string(),
            })
        }
        n => Err(CacheError::InvalidPattern(format!(
            "Pattern may contain at most one '*', found {}",
            n
        ))),
    }
}

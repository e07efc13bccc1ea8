//! Tag Index Module
//!
//! Reverse mapping from semantic tag to the set of keys carrying it,
//! used to fan out tag-based invalidation across both tiers.

use std::collections::{HashMap, HashSet};

// == Tag Index ==
/// Maps each tag to the keys currently carrying it.
///
/// The index only references keys; it never owns entry lifetime. The engine
/// calls [`TagIndex::detach`] once a key is absent from every tier, so a key
/// evicted or expired out of L1 stays indexed while its L2 copy is live.
#[derive(Debug, Default)]
pub struct TagIndex {
    buckets: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    /// Creates a new empty tag index.
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    // == Attach ==
    /// Adds a key to each tag's bucket; no-op for tags already holding it.
    pub fn attach<'a, I>(&mut self, tags: I, key: &str)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for tag in tags {
            self.buckets
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    // == Detach ==
    /// Removes a key from all tag buckets.
    ///
    /// Returns the tags whose buckets became empty (and were dropped).
    pub fn detach(&mut self, key: &str) -> HashSet<String> {
        let mut emptied = HashSet::new();
        self.buckets.retain(|tag, keys| {
            if keys.remove(key) && keys.is_empty() {
                emptied.insert(tag.clone());
                false
            } else {
                true
            }
        });
        emptied
    }

    // == Keys For Tag ==
    /// Returns current membership for a tag; empty if the tag is unknown.
    pub fn keys_for_tag(&self, tag: &str) -> HashSet<String> {
        self.buckets.get(tag).cloned().unwrap_or_default()
    }

    /// Drops a tag's bucket entirely, returning how many keys it held.
    pub fn clear_tag(&mut self, tag: &str) -> usize {
        self.buckets.remove(tag).map(|keys| keys.len()).unwrap_or(0)
    }

    /// Clears the whole index.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Returns the number of distinct tags currently indexed.
    pub fn tag_count(&self) -> usize {
        self.buckets.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_attach_and_lookup() {
        let mut index = TagIndex::new();

        index.attach(&tags(&["jobs", "user:42"]), "cache:jobs:1");
        index.attach(&tags(&["jobs"]), "cache:jobs:2");

        let jobs = index.keys_for_tag("jobs");
        assert_eq!(jobs.len(), 2);
        assert!(jobs.contains("cache:jobs:1"));
        assert!(jobs.contains("cache:jobs:2"));

        assert_eq!(index.keys_for_tag("user:42").len(), 1);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut index = TagIndex::new();

        index.attach(&tags(&["jobs"]), "cache:jobs:1");
        index.attach(&tags(&["jobs"]), "cache:jobs:1");

        assert_eq!(index.keys_for_tag("jobs").len(), 1);
    }

    #[test]
    fn test_unknown_tag_is_empty_not_error() {
        let index = TagIndex::new();
        assert!(index.keys_for_tag("unknown").is_empty());
    }

    #[test]
    fn test_detach_removes_from_all_buckets() {
        let mut index = TagIndex::new();

        index.attach(&tags(&["jobs", "user:42"]), "cache:jobs:1");
        index.attach(&tags(&["jobs"]), "cache:jobs:2");

        let emptied = index.detach("cache:jobs:1");

        // "user:42" had only this key, so its bucket is gone
        assert!(emptied.contains("user:42"));
        assert!(!emptied.contains("jobs"));
        assert!(index.keys_for_tag("user:42").is_empty());
        assert_eq!(index.keys_for_tag("jobs").len(), 1);
    }

    #[test]
    fn test_detach_unknown_key_is_noop() {
        let mut index = TagIndex::new();
        index.attach(&tags(&["jobs"]), "cache:jobs:1");

        let emptied = index.detach("cache:unknown");
        assert!(emptied.is_empty());
        assert_eq!(index.keys_for_tag("jobs").len(), 1);
    }

    #[test]
    fn test_clear_tag() {
        let mut index = TagIndex::new();
        index.attach(&tags(&["jobs"]), "cache:jobs:1");
        index.attach(&tags(&["jobs"]), "cache:jobs:2");

        assert_eq!(index.clear_tag("jobs"), 2);
        assert!(index.keys_for_tag("jobs").is_empty());
        assert_eq!(index.clear_tag("jobs"), 0);
    }

    #[test]
    fn test_clear() {
        let mut index = TagIndex::new();
        index.attach(&tags(&["jobs", "users"]), "cache:k");

        index.clear();
        assert_eq!(index.tag_count(), 0);
    }
}

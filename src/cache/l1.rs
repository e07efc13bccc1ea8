//! L1 Store Module
//!
//! Bounded in-process tier combining HashMap storage with LRU eviction and
//! TTL expiration. Mutation happens behind the engine's lock; this type
//! itself is single-threaded.

use std::collections::HashMap;

use crate::cache::{CacheEntry, LruTracker};
use crate::key::Matcher;

// == Lookup Outcome ==
/// Result of an L1 lookup.
///
/// Expired entries are removed on access (lazy deletion) and handed back so
/// the engine can detach them from the tag index.
#[derive(Debug)]
pub enum L1Lookup {
    /// Live entry; recency and access count already updated
    Hit(CacheEntry),
    /// Entry was present but past its expiry; it has been removed
    Expired(CacheEntry),
    /// No entry under this key
    Miss,
}

// == Insert Outcome ==
/// Result of an L1 insert.
#[derive(Debug, Default)]
pub struct L1Insert {
    /// Whether the new entry was actually stored
    pub stored: bool,
    /// Entries evicted to make room, with their keys
    pub evicted: Vec<(String, CacheEntry)>,
}

// == L1 Store ==
/// The fast in-process tier, bounded by entry count and aggregate bytes.
#[derive(Debug)]
pub struct L1Store {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Maximum aggregate value size in bytes
    max_bytes: usize,
    /// Current aggregate value size in bytes
    current_bytes: usize,
}

impl L1Store {
    // == Constructor ==
    /// Creates a new L1Store.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the tier can hold
    /// * `max_bytes` - Maximum aggregate value size in bytes
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            max_entries,
            max_bytes,
            current_bytes: 0,
        }
    }

    // == Get ==
    /// Looks up a key, updating recency and access count on a hit.
    ///
    /// An entry past its expiry is removed and reported as [`L1Lookup::Expired`],
    /// never returned as a hit.
    pub fn get(&mut self, key: &str) -> L1Lookup {
        let is_expired = match self.entries.get(key) {
            None => return L1Lookup::Miss,
            Some(entry) => entry.is_expired(),
        };

        if is_expired {
            return match self.remove(key) {
                Some(entry) => L1Lookup::Expired(entry),
                None => L1Lookup::Miss,
            };
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.access_count += 1;
                let snapshot = entry.clone();
                self.lru.touch(key);
                L1Lookup::Hit(snapshot)
            }
            None => L1Lookup::Miss,
        }
    }

    // == Set ==
    /// Inserts or overwrites an entry, evicting LRU entries until it fits.
    ///
    /// Eviction triggers on whichever budget (entry count or bytes) is hit
    /// first. A value larger than the whole byte budget is not stored at all;
    /// the caller still owns it and the remote tier may hold it instead.
    pub fn set(&mut self, key: String, entry: CacheEntry) -> L1Insert {
        let mut outcome = L1Insert::default();

        // Overwrite releases the old entry's budget first
        if let Some(old) = self.entries.remove(&key) {
            self.current_bytes -= old.size_bytes;
            self.lru.remove(&key);
        }

        if entry.size_bytes > self.max_bytes {
            return outcome;
        }

        while self.entries.len() >= self.max_entries
            || self.current_bytes + entry.size_bytes > self.max_bytes
        {
            match self.lru.evict_oldest() {
                Some(victim_key) => {
                    if let Some(victim) = self.entries.remove(&victim_key) {
                        self.current_bytes -= victim.size_bytes;
                        outcome.evicted.push((victim_key, victim));
                    }
                }
                None => break,
            }
        }

        self.current_bytes += entry.size_bytes;
        self.entries.insert(key.clone(), entry);
        self.lru.touch(&key);
        outcome.stored = true;
        outcome
    }

    // == Remove ==
    /// Removes an entry by key; idempotent.
    ///
    /// Returns the removed entry so the engine can detach its tags.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.current_bytes -= entry.size_bytes;
        self.lru.remove(key);
        Some(entry)
    }

    // == Keys Matching ==
    /// Lazily enumerates currently-held keys passing the matcher.
    ///
    /// The enumeration is finite and restartable; callers collect before
    /// mutating the store.
    pub fn keys_matching<'a>(&'a self, matcher: &'a Matcher) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .keys()
            .filter(move |key| matcher.matches(key))
            .map(String::as_str)
    }

    /// Iterates all entries with their keys, for the admin key browser.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    // == Sweep Expired ==
    /// Removes all expired entries, returning them with their keys.
    pub fn sweep_expired(&mut self) -> Vec<(String, CacheEntry)> {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        expired_keys
            .into_iter()
            .filter_map(|key| self.remove(&key).map(|entry| (key, entry)))
            .collect()
    }

    // == Clear ==
    /// Drops every entry and resets the byte gauge.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.current_bytes = 0;
    }

    // == Gauges ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the tier holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the current aggregate value size in bytes.
    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }
}

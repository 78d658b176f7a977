//! Fingerprint-keyed response cache with fuzzy lookup.
//!
//! [`ResponseCache`] stores model responses under the [`fingerprint`] of the
//! content that produced them. Lookups try the exact fingerprint first, then
//! fall back to scanning every stored fingerprint for one that is close
//! enough by normalized Levenshtein similarity.
//!
//! # Architecture
//!
//! ```text
//!   find_similar(content)
//!          │ fingerprint
//!          ▼
//!   ┌──────────────────┐  exact hit   ┌──────────────────────┐
//!   │ IndexMap lookup  │ ───────────► │ touch (move to back) │
//!   └────────┬─────────┘              └──────────────────────┘
//!            │ miss                              ▲
//!            ▼                                   │ similarity ≥ threshold
//!   ┌──────────────────┐                         │
//!   │ oldest-first scan│ ────────────────────────┘
//!   └────────┬─────────┘
//!            │ nothing close
//!            ▼
//!          None
//! ```
//!
//! The map's insertion order *is* the access order (index 0 is the least
//! recently touched entry), so the key set and the eviction order can never
//! drift apart. Both live behind one mutex that is held only for the
//! in-memory operation.
//!
//! # Scalability
//!
//! A miss costs O(n·m) for n entries and m-character fingerprints. That is
//! fine at the small capacities this cache is configured with (tens of
//! entries) and is the reason `max_entries` defaults to 50.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::fingerprint::{fingerprint, similarity};
use crate::telemetry;
use crate::types::AnalysisKind;

/// Configuration for the response cache.
///
/// ```rust
/// # use cuecard::CacheConfig;
/// let config = CacheConfig::new()
///     .max_entries(100)
///     .similarity_threshold(0.9);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 50.
    pub max_entries: usize,
    /// Minimum fingerprint similarity for a fuzzy hit. Default: 0.8.
    pub similarity_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            similarity_threshold: 0.8,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

/// What produced a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub kind: AnalysisKind,
    /// Length of the prompt sent to the model, in characters.
    pub prompt_length: usize,
    /// Arbitrary caller-supplied tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, serde_json::Value>,
}

impl CacheMetadata {
    pub fn new(kind: AnalysisKind, prompt_length: usize) -> Self {
        Self {
            kind,
            prompt_length,
            tags: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A cache hit. Owned copy; the cache never hands out references.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub response: String,
    pub metadata: CacheMetadata,
    /// Fingerprint of the stored entry (differs from the query's on a fuzzy hit).
    pub fingerprint: String,
    pub cached_at: SystemTime,
    /// Whether the query fingerprint matched exactly.
    pub exact: bool,
}

/// Per-entry summary in [`CacheStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntrySummary {
    pub key: String,
    /// Milliseconds since the Unix epoch.
    pub cached_at: u64,
    pub response_length: usize,
    pub kind: AnalysisKind,
}

/// Cache introspection snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`; `None` before the first lookup.
    pub hit_rate: Option<f64>,
    /// Oldest (least recently touched) first.
    pub entries: Vec<CacheEntrySummary>,
}

#[derive(Debug)]
struct CacheEntry {
    response: String,
    metadata: CacheMetadata,
    cached_at: SystemTime,
}

impl CacheEntry {
    fn to_hit(&self, fingerprint: &str, exact: bool) -> CachedResponse {
        CachedResponse {
            response: self.response.clone(),
            metadata: self.metadata.clone(),
            fingerprint: fingerprint.to_string(),
            cached_at: self.cached_at,
            exact,
        }
    }
}

#[derive(Debug, Default)]
struct CacheIndex {
    /// Least recently touched first.
    entries: IndexMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl CacheIndex {
    /// Move `key` to the most-recently-used position.
    fn touch(&mut self, key: &str) {
        if let Some(index) = self.entries.get_index_of(key) {
            let last = self.entries.len() - 1;
            self.entries.move_index(index, last);
        }
    }
}

/// In-memory LRU cache of model responses keyed by content fingerprint.
#[derive(Debug)]
pub struct ResponseCache {
    config: CacheConfig,
    index: Mutex<CacheIndex>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            index: Mutex::new(CacheIndex::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CacheIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fingerprint used as the cache key for `content`.
    pub fn generate_key(&self, content: &str) -> Option<String> {
        fingerprint(content)
    }

    /// Look up `content`, exactly or fuzzily.
    ///
    /// Content without a fingerprint bypasses the cache and does not count
    /// as a miss.
    pub fn find_similar(&self, content: &str) -> Option<CachedResponse> {
        let key = fingerprint(content)?;
        let mut index = self.lock();

        if let Some(entry) = index.entries.get(&key) {
            let hit = entry.to_hit(&key, true);
            index.touch(&key);
            index.hits += 1;
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "match" => "exact").increment(1);
            debug!(key = %key, "cache hit (exact)");
            return Some(hit);
        }

        let threshold = self.config.similarity_threshold;
        let fuzzy = index.entries.iter().find_map(|(stored, entry)| {
            let score = similarity(&key, stored);
            (score >= threshold).then(|| (entry.to_hit(stored, false), score))
        });

        match fuzzy {
            Some((hit, score)) => {
                index.touch(&hit.fingerprint);
                index.hits += 1;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "match" => "fuzzy").increment(1);
                debug!(key = %key, matched = %hit.fingerprint, similarity = score, "cache hit (fuzzy)");
                Some(hit)
            }
            None => {
                index.misses += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(key = %key, "cache miss");
                None
            }
        }
    }

    /// Store `response` for `content`.
    ///
    /// Returns `false` if the content has no fingerprint or the cache has
    /// zero capacity. Re-storing an existing fingerprint replaces the entry
    /// and marks it most recently used without evicting anything.
    pub fn store(&self, content: &str, response: impl Into<String>, metadata: CacheMetadata) -> bool {
        let Some(key) = fingerprint(content) else {
            debug!("content has no fingerprint, not caching");
            return false;
        };
        if self.config.max_entries == 0 {
            return false;
        }

        let entry = CacheEntry {
            response: response.into(),
            metadata,
            cached_at: SystemTime::now(),
        };

        let mut index = self.lock();
        if index.entries.shift_remove(&key).is_none() {
            while index.entries.len() >= self.config.max_entries {
                if let Some((evicted, _)) = index.entries.shift_remove_index(0) {
                    metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
                    debug!(key = %evicted, "evicted least recently used entry");
                }
            }
        }
        index.entries.insert(key.clone(), entry);
        debug!(key = %key, size = index.entries.len(), "cached response");
        true
    }

    /// Whether an entry with exactly `content`'s fingerprint exists. Does not
    /// touch the entry or the hit counters.
    pub fn contains(&self, content: &str) -> bool {
        fingerprint(content).is_some_and(|key| self.lock().entries.contains_key(&key))
    }

    /// Remove the entry with exactly `content`'s fingerprint.
    pub fn remove(&self, content: &str) -> bool {
        fingerprint(content).is_some_and(|key| self.lock().entries.shift_remove(&key).is_some())
    }

    /// Drop every entry and reset the hit/miss counters.
    pub fn clear(&self) {
        let mut index = self.lock();
        let dropped = index.entries.len();
        *index = CacheIndex::default();
        debug!(dropped, "cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.lock();
        let lookups = index.hits + index.misses;
        CacheStats {
            size: index.entries.len(),
            max_size: self.config.max_entries,
            hits: index.hits,
            misses: index.misses,
            hit_rate: (lookups > 0).then(|| index.hits as f64 / lookups as f64),
            entries: index
                .entries
                .iter()
                .map(|(key, entry)| CacheEntrySummary {
                    key: key.clone(),
                    cached_at: entry
                        .cached_at
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_millis() as u64)
                        .unwrap_or_default(),
                    response_length: entry.response.chars().count(),
                    kind: entry.metadata.kind,
                })
                .collect(),
        }
    }
}

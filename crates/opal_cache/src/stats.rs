//! Persistent hit/miss counters.
//!
//! Counters are stored as `stats.json` in the cache directory. Loading
//! is fail-safe: a missing or corrupt file reads as fresh counters.
//! Concurrent shim processes may lose individual increments under
//! last-writer-wins; the counters are diagnostic, not authoritative.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Name of the statistics file within the cache directory.
const STATS_FILE: &str = "stats.json";

/// Cache usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of invocations served from the cache.
    pub hits: u64,

    /// Number of cacheable invocations that ran the real tool.
    pub misses: u64,

    /// Number of entries evicted to stay within the size budget.
    pub evictions: u64,
}

impl Stats {
    /// Loads counters from the cache directory, returning fresh counters
    /// if the file is missing or unreadable.
    pub fn load(cache_dir: &Path) -> Self {
        let path = cache_dir.join(STATS_FILE);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Persists the counters atomically.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let path = cache_dir.join(STATS_FILE);
        opal_util::write(json.as_bytes(), &path.to_string_lossy())?;
        Ok(())
    }

    /// Counts one cache hit.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Counts one cache miss.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Counts evicted entries.
    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    /// Resets all counters to zero.
    pub fn zero(&mut self) {
        *self = Self::default();
    }

    /// Hit rate in percent, or `None` before any cacheable invocation.
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        if total == 0 {
            return None;
        }
        Some(self.hits as f64 * 100.0 / total as f64)
    }
}

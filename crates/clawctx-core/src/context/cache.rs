//! Query context cache — persisted key → pack store with LRU eviction.
//!
//! The whole store is one JSON document. Every [`QueryCache::get`] hit and
//! every [`QueryCache::put`] re-reads the file, applies its change, and
//! rewrites it, so several engines pointed at the same directory see each
//! other's entries (last writer wins on a race).
//!
//! Keys are opaque to the cache; the engine composes them from the
//! repository hash, query fingerprint, and retrieval parameters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::model::ContextPack;
use super::{ContextError, store};

/// Cache file name inside the cache directory.
pub const QUERY_CACHE_FILE_NAME: &str = "query_cache.json";

/// Default maximum number of cached packs.
pub const DEFAULT_CAPACITY: usize = 200;

/// A cached pack plus its last-access stamp (nanoseconds since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub pack: ContextPack,
    #[serde(default, deserialize_with = "stamp_from_number")]
    pub last_access: u64,
}

/// Reads a stamp from any JSON number. Integers are nanoseconds and floats
/// are fractional seconds since the epoch. Negative or non-finite values
/// read as 0.
fn stamp_from_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(nanos) = number.as_u64() {
        return Ok(nanos);
    }
    match number.as_f64() {
        Some(secs) if number.is_f64() && secs.is_finite() && secs > 0.0 => {
            Ok((secs * 1e9) as u64)
        }
        _ => Ok(0),
    }
}

/// Disk-backed, capacity-bounded store of retrieved packs.
#[derive(Debug)]
pub struct QueryCache {
    path: PathBuf,
    capacity: usize,
    /// Store contents as of the last operation.
    entries: BTreeMap<String, CacheEntry>,
}

impl QueryCache {
    /// Open (or start) the store at `path`, creating its parent directory.
    /// A missing or corrupt file opens as empty.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, ContextError> {
        if capacity == 0 {
            return Err(ContextError::InvalidParams(
                "cache capacity must be at least 1".to_string(),
            ));
        }
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let entries = store::load_or_default(&path);
        Ok(Self {
            path,
            capacity,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries as of the last operation.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` was present as of the last operation. Does not touch
    /// the access stamp.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up `key`.
    ///
    /// A hit refreshes the entry's last-access stamp and rewrites the store,
    /// so reads reorder eviction just like writes do.
    pub fn get(&mut self, key: &str) -> Result<Option<ContextPack>, ContextError> {
        self.reload();
        let stamp = self.next_stamp();
        let Some(entry) = self.entries.get_mut(key) else {
            debug!(key, "Query cache miss");
            return Ok(None);
        };
        entry.last_access = stamp;
        let pack = entry.pack.clone();
        self.flush()?;

        debug!(key, "Query cache hit");
        Ok(Some(pack))
    }

    /// Store `pack` under `key`, then evict least-recently-accessed entries
    /// until the store is back within capacity. Returns the evicted keys.
    pub fn put(&mut self, key: &str, pack: &ContextPack) -> Result<Vec<String>, ContextError> {
        self.reload();
        let last_access = self.next_stamp();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                pack: pack.clone(),
                last_access,
            },
        );
        let evicted = self.evict();
        self.flush()?;

        if !evicted.is_empty() {
            debug!(key, evicted = evicted.len(), "Query cache evicted entries");
        }
        Ok(evicted)
    }

    /// Remove every entry and rewrite the store.
    pub fn clear(&mut self) -> Result<(), ContextError> {
        self.entries.clear();
        self.flush()
    }

    /// Write the current contents to disk.
    pub fn flush(&self) -> Result<(), ContextError> {
        store::write_json(&self.path, &self.entries)
    }

    /// Flush and release the store.
    pub fn close(self) -> Result<(), ContextError> {
        self.flush()
    }

    fn reload(&mut self) {
        self.entries = store::load_or_default(&self.path);
    }

    /// Wall-clock nanoseconds, bumped past every stamp already in the store
    /// so access order is strict even within one clock tick.
    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let latest = self.entries.values().map(|e| e.last_access).max();
        match latest {
            Some(latest) => now.max(latest.saturating_add(1)),
            None => now,
        }
    }

    /// Drop the oldest entries (by stamp, then key) beyond capacity.
    fn evict(&mut self) -> Vec<String> {
        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess == 0 {
            return Vec::new();
        }

        let mut by_age: Vec<(u64, &String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_access, key))
            .collect();
        by_age.sort();
        let victims: Vec<String> = by_age
            .into_iter()
            .take(excess)
            .map(|(_, key)| key.clone())
            .collect();

        for key in &victims {
            self.entries.remove(key);
        }
        victims
    }
}

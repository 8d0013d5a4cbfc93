//! Bounded geocode, reverse-geocode and suggestion caches.
//!
//! Inserts never evict. A maintenance pass, normally driven by
//! [`spawn_maintenance`] on a fixed interval, trims each cache that exceeds
//! its ceiling by dropping its oldest entries in one sweep. Between passes a
//! cache may exceed its ceiling.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::geocoding::{GeocodeResult, ReverseGeocodeResult};
use super::suggestions::SearchSuggestion;

/// A cached value with its insertion sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<K, V> {
    /// Lookup key.
    pub key: K,
    /// Cached value.
    pub value: V,
    /// Monotonic insertion counter; lower is older.
    pub inserted_at_order: u64,
}

/// Exact-key map bounded by periodic bulk eviction.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
    ceiling: usize,
    entries: HashMap<K, CacheEntry<K, V>>,
    next_order: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache with the given ceiling.
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            entries: HashMap::new(),
            next_order: 0,
        }
    }

    /// Configured ceiling.
    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the value cached under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value`; replacing a key refreshes its insertion order.
    pub fn insert(&mut self, key: K, value: V) {
        let inserted_at_order = self.next_order;
        self.next_order += 1;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                inserted_at_order,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Evict the oldest entries if the cache exceeds its ceiling.
    ///
    /// Removes `max(len / 2, len - ceiling)` entries, so the oldest half goes
    /// and the cache always ends at or below its ceiling. Returns the number
    /// of entries evicted.
    pub fn maintain(&mut self) -> usize {
        let len = self.entries.len();
        if len <= self.ceiling {
            return 0;
        }
        let evict = (len / 2).max(len - self.ceiling);
        let mut by_age: Vec<(u64, K)> = self
            .entries
            .values()
            .map(|entry| (entry.inserted_at_order, entry.key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(order, _)| *order);
        for (_, key) in by_age.into_iter().take(evict) {
            self.entries.remove(&key);
        }
        evict
    }

    fn ordered_entries(&self) -> Vec<&CacheEntry<K, V>> {
        let mut entries: Vec<&CacheEntry<K, V>> = self.entries.values().collect();
        entries.sort_unstable_by_key(|entry| entry.inserted_at_order);
        entries
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry<K, V> {
    key: K,
    value: V,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    entries: Vec<Value>,
}

/// Outcome of restoring a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Entries loaded into the cache.
    pub restored: usize,
    /// Malformed entries skipped.
    pub discarded: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    /// Serialise the cache as `{"entries":[{"key":..,"value":..}]}`, oldest
    /// first.
    pub fn export(&self) -> Result<Value, serde_json::Error> {
        let entries = self
            .ordered_entries()
            .into_iter()
            .map(|entry| {
                serde_json::to_value(SnapshotEntry {
                    key: &entry.key,
                    value: &entry.value,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        serde_json::to_value(Snapshot { entries })
    }

    /// Load entries from a snapshot produced by [`BoundedCache::export`].
    ///
    /// Entries that fail to decode are skipped with a warning; only a
    /// snapshot whose envelope is unreadable is an error.
    pub fn restore(&mut self, snapshot: Value) -> Result<RestoreReport, serde_json::Error> {
        let Snapshot { entries } = serde_json::from_value(snapshot)?;
        let mut report = RestoreReport::default();
        for (index, raw) in entries.into_iter().enumerate() {
            match serde_json::from_value::<SnapshotEntry<K, V>>(raw) {
                Ok(entry) => {
                    self.insert(entry.key, entry.value);
                    report.restored += 1;
                }
                Err(error) => {
                    warn!(index, %error, "discarding malformed cache entry");
                    report.discarded += 1;
                }
            }
        }
        Ok(report)
    }
}

/// Eviction ceilings for the three caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCeilings {
    /// Forward geocode cache ceiling.
    pub geocode: usize,
    /// Reverse geocode cache ceiling.
    pub reverse: usize,
    /// Suggestion cache ceiling.
    pub suggestions: usize,
}

impl Default for CacheCeilings {
    fn default() -> Self {
        Self {
            geocode: 100,
            reverse: 50,
            suggestions: 200,
        }
    }
}

/// Selects one of the engine caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// Forward geocode results.
    Geocode,
    /// Reverse geocode results.
    Reverse,
    /// Merged search suggestions.
    Suggestions,
}

/// Entries evicted by one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Evicted forward geocode entries.
    pub geocode: usize,
    /// Evicted reverse geocode entries.
    pub reverse: usize,
    /// Evicted suggestion entries.
    pub suggestions: usize,
}

/// The engine's three caches, each behind its own lock.
#[derive(Debug)]
pub struct EngineCaches {
    geocode: Mutex<BoundedCache<String, Vec<GeocodeResult>>>,
    reverse: Mutex<BoundedCache<String, ReverseGeocodeResult>>,
    suggestions: Mutex<BoundedCache<String, Vec<SearchSuggestion>>>,
}

pub(super) fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineCaches {
    /// Create empty caches with the given ceilings.
    pub fn new(ceilings: CacheCeilings) -> Self {
        Self {
            geocode: Mutex::new(BoundedCache::new(ceilings.geocode)),
            reverse: Mutex::new(BoundedCache::new(ceilings.reverse)),
            suggestions: Mutex::new(BoundedCache::new(ceilings.suggestions)),
        }
    }

    /// Cached forward geocode results.
    pub fn geocode(&self, key: &str) -> Option<Vec<GeocodeResult>> {
        locked(&self.geocode).get(key)
    }

    /// Store forward geocode results.
    pub fn store_geocode(&self, key: String, results: Vec<GeocodeResult>) {
        locked(&self.geocode).insert(key, results);
    }

    /// Cached reverse geocode result.
    pub fn reverse(&self, key: &str) -> Option<ReverseGeocodeResult> {
        locked(&self.reverse).get(key)
    }

    /// Store a reverse geocode result.
    pub fn store_reverse(&self, key: String, result: ReverseGeocodeResult) {
        locked(&self.reverse).insert(key, result);
    }

    /// Cached suggestions.
    pub fn suggestions(&self, key: &str) -> Option<Vec<SearchSuggestion>> {
        locked(&self.suggestions).get(key)
    }

    /// Store suggestions.
    pub fn store_suggestions(&self, key: String, suggestions: Vec<SearchSuggestion>) {
        locked(&self.suggestions).insert(key, suggestions);
    }

    /// Current entry count of one cache.
    pub fn len(&self, kind: CacheKind) -> usize {
        match kind {
            CacheKind::Geocode => locked(&self.geocode).len(),
            CacheKind::Reverse => locked(&self.reverse).len(),
            CacheKind::Suggestions => locked(&self.suggestions).len(),
        }
    }

    /// Run one maintenance pass over every cache.
    pub fn maintain(&self) -> MaintenanceReport {
        let report = MaintenanceReport {
            geocode: locked(&self.geocode).maintain(),
            reverse: locked(&self.reverse).maintain(),
            suggestions: locked(&self.suggestions).maintain(),
        };
        debug!(
            geocode = report.geocode,
            reverse = report.reverse,
            suggestions = report.suggestions,
            "cache maintenance evicted entries"
        );
        report
    }

    /// Empty every cache.
    pub fn clear(&self) {
        locked(&self.geocode).clear();
        locked(&self.reverse).clear();
        locked(&self.suggestions).clear();
        debug!("caches cleared");
    }

    /// Export one cache as a JSON snapshot.
    pub fn export(&self, kind: CacheKind) -> Result<Value, serde_json::Error> {
        match kind {
            CacheKind::Geocode => locked(&self.geocode).export(),
            CacheKind::Reverse => locked(&self.reverse).export(),
            CacheKind::Suggestions => locked(&self.suggestions).export(),
        }
    }

    /// Restore one cache from a JSON snapshot.
    pub fn restore(
        &self,
        kind: CacheKind,
        snapshot: Value,
    ) -> Result<RestoreReport, serde_json::Error> {
        match kind {
            CacheKind::Geocode => locked(&self.geocode).restore(snapshot),
            CacheKind::Reverse => locked(&self.reverse).restore(snapshot),
            CacheKind::Suggestions => locked(&self.suggestions).restore(snapshot),
        }
    }
}

impl Default for EngineCaches {
    fn default() -> Self {
        Self::new(CacheCeilings::default())
    }
}

/// Run [`EngineCaches::maintain`] every `interval` until the task is aborted.
///
/// The first pass happens one full interval after spawning.
pub fn spawn_maintenance(caches: Arc<EngineCaches>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            caches.maintain();
        }
    })
}

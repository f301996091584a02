// crates/browserscope-core/src/runtime/cache.rs
// ============================================================================
// Module: Browserscope In-Memory Cache
// Description: Namespaced byte cache with TTL expiry and bounded size.
// Purpose: Provide a deterministic cache backend for tests and local runs.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryCache`] implements [`CacheBackend`] with per-entry expiry and an
//! optional entry bound. Like any cache backend it may drop values at any
//! time; callers must treat a miss as "recompute". The cache can be switched
//! offline to exercise fallback paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use crate::interfaces::CacheBackend;
use crate::interfaces::CacheError;

// ============================================================================
// SECTION: In-Memory Cache
// ============================================================================

/// Cached value with optional expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Cached bytes.
    bytes: Vec<u8>,
    /// Expiry instant, when a TTL was supplied.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    /// Returns true when the entry has expired at `now`.
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// In-memory cache backend.
///
/// # Invariants
/// - Never holds more than `max_entries` entries when a bound is set.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    /// Entries keyed by (namespace, key).
    entries: Arc<Mutex<BTreeMap<(String, String), CacheEntry>>>,
    /// Optional entry bound.
    max_entries: Option<usize>,
    /// When false, every call fails with [`CacheError::Unavailable`].
    online: Arc<AtomicBool>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    /// Creates an unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_entries(None)
    }

    /// Creates a cache with an optional entry bound.
    #[must_use]
    pub fn with_max_entries(max_entries: Option<usize>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            max_entries,
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Switches the cache online or offline.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|entry| !entry.is_expired(now)).count())
            .unwrap_or_default()
    }

    /// Returns true when no live entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks the entries after checking availability.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<(String, String), CacheEntry>>, CacheError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache offline".to_string()));
        }
        self.entries.lock().map_err(|_| CacheError::Unavailable("cache mutex poisoned".to_string()))
    }
}

impl CacheBackend for InMemoryCache {
    fn get_multi(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<BTreeMap<String, Vec<u8>>, CacheError> {
        let now = Instant::now();
        let entries = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                entries
                    .get(&(namespace.to_string(), key.clone()))
                    .filter(|entry| !entry.is_expired(now))
                    .map(|entry| (key.clone(), entry.bytes.clone()))
            })
            .collect())
    }

    fn set_multi(
        &self,
        namespace: &str,
        values: BTreeMap<String, Vec<u8>>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));
        let mut entries = self.lock()?;
        for (key, bytes) in values {
            let slot = (namespace.to_string(), key);
            if let Some(max) = self.max_entries
                && !entries.contains_key(&slot)
                && entries.len() >= max
            {
                entries.retain(|_, entry| !entry.is_expired(now));
                if entries.len() >= max
                    && let Some(evict) = entries.keys().next().cloned()
                {
                    entries.remove(&evict);
                }
            }
            entries.insert(
                slot,
                CacheEntry {
                    bytes,
                    expires_at,
                },
            );
        }
        drop(entries);
        Ok(())
    }

    fn delete_multi(&self, namespace: &str, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        for key in keys {
            entries.remove(&(namespace.to_string(), key.clone()));
        }
        drop(entries);
        Ok(())
    }
}

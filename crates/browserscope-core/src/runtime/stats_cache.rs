// crates/browserscope-core/src/runtime/stats_cache.rs
// ============================================================================
// Module: Browserscope Stats Cache
// Description: Read-through cache of per-browser stats bundles.
// Purpose: Keep aggregate reads cheap while staying coherent with rankers.
// Dependencies: crate::{core, interfaces, telemetry}, thiserror
// ============================================================================

//! ## Overview
//! Stats bundles live in the namespace `category_stats__{category}`, suffixed
//! with a params digest when a params string is in force, and are keyed by
//! browser label. Reads fetch every requested label in one bulk call,
//! recompute the misses from rankers, and write them back with a TTL. Cache
//! failures degrade to recomputation; only store failures are errors.
//! Reads are not transactional with ranker writes, so a bundle may lag a
//! concurrent fold until the next invalidation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::BrowserLabel;
use crate::core::BrowserStats;
use crate::core::Category;
use crate::core::ParamsString;
use crate::core::StatsTable;
use crate::core::UserAgentInfo;
use crate::core::sha256_hex;
use crate::interfaces::CacheBackend;
use crate::interfaces::EntityStore;
use crate::interfaces::StoreError;
use crate::interfaces::TestSet;
use crate::interfaces::decode_stats;
use crate::interfaces::encode_stats;
use crate::telemetry::EventSink;
use crate::telemetry::StatsEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Namespace prefix for stats bundles.
pub const STATS_NAMESPACE_PREFIX: &str = "category_stats_";

/// Default time-to-live for cached bundles.
pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(3600);

/// Hex digits of the params digest appended to namespaces.
const PARAMS_DIGEST_LEN: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Stats cache errors.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The entity store failed while loading rankers.
    #[error("stats store error: {0}")]
    Store(String),
    /// The cache backend failed on an operation that has no fallback.
    #[error("stats cache error: {0}")]
    Cache(String),
    /// No test set is registered for the category.
    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

impl From<StoreError> for StatsError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

// ============================================================================
// SECTION: Namespaces
// ============================================================================

/// Returns the cache namespace for a category and optional params string.
#[must_use]
pub fn stats_namespace(category: &Category, params: Option<&ParamsString>) -> String {
    let mut namespace = format!("{STATS_NAMESPACE_PREFIX}_{category}");
    if let Some(params) = params {
        let digest = sha256_hex(params.as_str().as_bytes());
        namespace.push_str("__p");
        namespace.push_str(&digest[.. PARAMS_DIGEST_LEN]);
    }
    namespace
}

// ============================================================================
// SECTION: Stats Cache
// ============================================================================

/// Read-through stats cache service.
#[derive(Clone)]
pub struct StatsCache {
    /// Entity store holding rankers.
    store: Arc<dyn EntityStore>,
    /// Cache backend.
    cache: Arc<dyn CacheBackend>,
    /// Event sink.
    events: Arc<dyn EventSink>,
    /// TTL applied to written bundles.
    ttl: Option<Duration>,
}

impl StatsCache {
    /// Creates a stats cache service.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn CacheBackend>,
        events: Arc<dyn EventSink>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            cache,
            events,
            ttl,
        }
    }

    /// Returns one stats bundle per requested browser, in request order.
    ///
    /// With `use_cache` false the cache is neither read nor written.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Store`] when rankers cannot be loaded.
    pub fn get_stats(
        &self,
        test_set: &dyn TestSet,
        browsers: &[BrowserLabel],
        params: Option<&ParamsString>,
        use_cache: bool,
    ) -> Result<StatsTable, StatsError> {
        let namespace = stats_namespace(test_set.category(), params);
        let mut cached = if use_cache {
            self.read_cached(&namespace, browsers)
        } else {
            BTreeMap::new()
        };
        let mut recomputed = BTreeMap::new();
        for browser in browsers {
            if cached.contains_key(browser.as_str()) || recomputed.contains_key(browser.as_str()) {
                continue;
            }
            let stats = self.compute(test_set, browser, params)?;
            recomputed.insert(browser.as_str().to_string(), stats);
        }
        if !recomputed.is_empty() {
            self.events.emit(StatsEvent::StatsRecomputed {
                category: test_set.category().to_string(),
                browsers: recomputed.len(),
            });
            if use_cache {
                self.write_cached(&namespace, &recomputed);
            }
        }
        cached.append(&mut recomputed);
        let rows = browsers
            .iter()
            .filter_map(|browser| {
                cached.get(browser.as_str()).map(|stats| (browser.clone(), stats.clone()))
            })
            .collect();
        Ok(StatsTable {
            rows,
        })
    }

    /// Deletes cached bundles for the given browsers.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Cache`] when the backend rejects the delete.
    pub fn invalidate(
        &self,
        category: &Category,
        params: Option<&ParamsString>,
        browsers: &[BrowserLabel],
    ) -> Result<(), StatsError> {
        let namespace = stats_namespace(category, params);
        let keys: Vec<String> = browsers.iter().map(|browser| browser.to_string()).collect();
        self.cache.delete_multi(&namespace, &keys).map_err(|err| StatsError::Cache(err.to_string()))
    }

    /// Recomputes and caches bundles for every label of a user agent.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Store`] when rankers cannot be loaded.
    pub fn update_stats_cache(
        &self,
        test_set: &dyn TestSet,
        user_agent: &UserAgentInfo,
        params: Option<&ParamsString>,
    ) -> Result<StatsTable, StatsError> {
        let browsers = user_agent.string_list();
        let table = self.get_stats(test_set, &browsers, params, false)?;
        let namespace = stats_namespace(test_set.category(), params);
        let entries: BTreeMap<String, BrowserStats> = table
            .rows
            .iter()
            .map(|(browser, stats)| (browser.to_string(), stats.clone()))
            .collect();
        self.write_cached(&namespace, &entries);
        Ok(table)
    }

    /// Recomputes one bundle from rankers.
    fn compute(
        &self,
        test_set: &dyn TestSet,
        browser: &BrowserLabel,
        params: Option<&ParamsString>,
    ) -> Result<BrowserStats, StatsError> {
        let tests = test_set.test_keys();
        let browsers = std::slice::from_ref(browser);
        let mut keyed = Vec::with_capacity(tests.len());
        for test in &tests {
            if let Some(key) = test_set.ranker_keys(test, browsers, params).into_iter().next() {
                keyed.push((test, key));
            }
        }
        let keys: Vec<_> = keyed.iter().map(|(_, key)| key.clone()).collect();
        let rankers = self.store.load_rankers(&keys)?;
        let mut results = BTreeMap::new();
        let mut total_runs = 0;
        for ((test, _), ranker) in keyed.into_iter().zip(rankers) {
            let count = ranker.count();
            total_runs = total_runs.max(count);
            results.insert(test.clone(), test_set.test_stats(test, ranker.median(), count));
        }
        let (summary_score, summary_display) = test_set.summarize(&results);
        Ok(BrowserStats {
            summary_score,
            summary_display,
            total_runs,
            results,
        })
    }

    /// Reads cached bundles; backend and decode failures count as misses.
    fn read_cached(
        &self,
        namespace: &str,
        browsers: &[BrowserLabel],
    ) -> BTreeMap<String, BrowserStats> {
        let keys: Vec<String> = browsers.iter().map(|browser| browser.to_string()).collect();
        match self.cache.get_multi(namespace, &keys) {
            Ok(values) => values
                .into_iter()
                .filter_map(|(key, bytes)| match decode_stats(&bytes) {
                    Ok(stats) => Some((key, stats)),
                    Err(err) => {
                        self.fallback(namespace, &err.to_string());
                        None
                    }
                })
                .collect(),
            Err(err) => {
                self.fallback(namespace, &err.to_string());
                BTreeMap::new()
            }
        }
    }

    /// Writes bundles; failures are logged and dropped.
    fn write_cached(&self, namespace: &str, entries: &BTreeMap<String, BrowserStats>) {
        let mut encoded = BTreeMap::new();
        for (key, stats) in entries {
            match encode_stats(stats) {
                Ok(bytes) => {
                    encoded.insert(key.clone(), bytes);
                }
                Err(err) => self.fallback(namespace, &err.to_string()),
            }
        }
        if let Err(err) = self.cache.set_multi(namespace, encoded, self.ttl) {
            self.fallback(namespace, &err.to_string());
        }
    }

    /// Emits a cache fallback event.
    fn fallback(&self, namespace: &str, error: &str) {
        self.events.emit(StatsEvent::CacheFallback {
            namespace: namespace.to_string(),
            error: error.to_string(),
        });
    }
}

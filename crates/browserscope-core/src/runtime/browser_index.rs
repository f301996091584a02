// crates/browserscope-core/src/runtime/browser_index.rs
// ============================================================================
// Module: Browserscope Browser Version Index
// Description: Per-category sorted browser lists at each version level.
// Purpose: Track which browser labels have results so tables can list them.
// Dependencies: crate::{core, interfaces, telemetry}, thiserror
// ============================================================================

//! ## Overview
//! Each (category, level) pair owns one row keyed `"{category}_{level}"`: a
//! duplicate-free list of labels sorted case-insensitively. Rows are stored in
//! the entity store and mirrored in the cache namespace
//! `category_level_browsers`. Updates read all four rows in bulk, insert the
//! user agent's labels, and write back only rows that changed. Concurrent
//! updates are last-writer-wins per row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::BrowserLabel;
use crate::core::Category;
use crate::core::LevelSelector;
use crate::core::UserAgentInfo;
use crate::core::VersionLevel;
use crate::interfaces::CacheBackend;
use crate::interfaces::EntityStore;
use crate::interfaces::StoreError;
use crate::telemetry::EventSink;
use crate::telemetry::StatsEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Cache namespace for browser level rows.
pub const BROWSER_LEVELS_NAMESPACE: &str = "category_level_browsers";

/// Fixed list returned for [`LevelSelector::Top`].
pub const TOP_BROWSERS: [&str; 13] = [
    "Chrome 3",
    "Chrome 4",
    "Firefox 3.0",
    "Firefox 3.5",
    "IE 6",
    "IE 7",
    "IE 8",
    "iPhone 2.2",
    "iPhone 3.1",
    "Opera 9.64",
    "Opera 10",
    "Safari 3.2",
    "Safari 4.0",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Browser index errors.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The entity store failed.
    #[error("browser index store error: {0}")]
    Store(String),
    /// The cache failed on an operation that has no fallback.
    #[error("browser index cache error: {0}")]
    Cache(String),
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

// ============================================================================
// SECTION: Row Helpers
// ============================================================================

/// Returns the row key for a category and level.
#[must_use]
pub fn key_name(category: &Category, level: VersionLevel) -> String {
    format!("{category}_{}", level.index())
}

/// Inserts a label into a sorted row unless a case-insensitive match exists.
///
/// Returns true when the row changed.
pub fn insort_browser(browsers: &mut Vec<BrowserLabel>, label: BrowserLabel) -> bool {
    let key = label.sort_key();
    let index = browsers.partition_point(|existing| existing.sort_key() <= key);
    if index > 0 && browsers[index - 1].sort_key() == key {
        return false;
    }
    browsers.insert(index, label);
    true
}

/// Sorts labels case-insensitively and drops case-insensitive duplicates.
#[must_use]
pub fn sort_browsers(browsers: Vec<BrowserLabel>) -> Vec<BrowserLabel> {
    let mut sorted = Vec::with_capacity(browsers.len());
    for label in browsers {
        insort_browser(&mut sorted, label);
    }
    sorted
}

/// Returns the fixed top browser list.
#[must_use]
pub fn top_browsers() -> Vec<BrowserLabel> {
    TOP_BROWSERS.iter().map(|label| BrowserLabel::new(*label)).collect()
}

// ============================================================================
// SECTION: Browser Version Index
// ============================================================================

/// Browser version index service.
#[derive(Clone)]
pub struct BrowserVersionIndex {
    /// Entity store holding rows.
    store: Arc<dyn EntityStore>,
    /// Cache mirror of rows.
    cache: Arc<dyn CacheBackend>,
    /// Event sink.
    events: Arc<dyn EventSink>,
}

impl BrowserVersionIndex {
    /// Creates a browser index service.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn CacheBackend>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            cache,
            events,
        }
    }

    /// Adds a user agent's label at every level to the category's rows.
    ///
    /// Returns the levels whose rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Store`] when rows cannot be loaded or written.
    pub fn add_user_agent(
        &self,
        category: &Category,
        user_agent: &UserAgentInfo,
    ) -> Result<Vec<VersionLevel>, IndexError> {
        let wanted: Vec<(VersionLevel, String, BrowserLabel)> = VersionLevel::ALL
            .iter()
            .map(|level| (*level, key_name(category, *level), user_agent.label_at(*level)))
            .collect();
        let keys: Vec<String> = wanted.iter().map(|(_, key, _)| key.clone()).collect();
        let mut rows = self.read_cached(&keys);
        let stale: Vec<String> = wanted
            .iter()
            .filter(|(_, key, label)| {
                rows.get(key).is_none_or(|row| !contains_label(row, label))
            })
            .map(|(_, key, _)| key.clone())
            .collect();
        if !stale.is_empty() {
            let stored = self.store.load_browser_levels(&stale)?;
            for key in &stale {
                rows.insert(key.clone(), stored.get(key).cloned().unwrap_or_default());
            }
        }
        let mut changed_rows = BTreeMap::new();
        let mut changed_levels = Vec::new();
        for (level, key, label) in wanted {
            let Some(row) = rows.get_mut(&key) else {
                continue;
            };
            if insort_browser(row, label) {
                changed_rows.insert(key, row.clone());
                changed_levels.push(level);
            }
        }
        if changed_rows.is_empty() {
            return Ok(changed_levels);
        }
        self.store.put_browser_levels(&changed_rows)?;
        self.write_cached(&changed_rows);
        self.events.emit(StatsEvent::BrowserIndexUpdated {
            category: category.to_string(),
            levels: changed_levels.iter().map(|level| level.index()).collect(),
        });
        Ok(changed_levels)
    }

    /// Returns the browser list for a selector.
    ///
    /// Level rows are read through the cache; absent rows are empty.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Store`] when a cache miss cannot be filled.
    pub fn browsers(
        &self,
        category: &Category,
        selector: LevelSelector,
    ) -> Result<Vec<BrowserLabel>, IndexError> {
        let level = match selector {
            LevelSelector::Top => return Ok(top_browsers()),
            LevelSelector::Level(level) => level,
        };
        let key = key_name(category, level);
        let keys = vec![key.clone()];
        if let Some(row) = self.read_cached(&keys).remove(&key) {
            return Ok(row);
        }
        let row = self.store.load_browser_levels(&keys)?.remove(&key).unwrap_or_default();
        let mut rows = BTreeMap::new();
        rows.insert(key, row.clone());
        self.write_cached(&rows);
        Ok(row)
    }

    /// Replaces a level row after sorting and deduplicating the labels.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Store`] when the row cannot be written.
    pub fn set_browsers(
        &self,
        category: &Category,
        level: VersionLevel,
        browsers: Vec<BrowserLabel>,
    ) -> Result<Vec<BrowserLabel>, IndexError> {
        let sorted = sort_browsers(browsers);
        let mut rows = BTreeMap::new();
        rows.insert(key_name(category, level), sorted.clone());
        self.store.put_browser_levels(&rows)?;
        self.write_cached(&rows);
        Ok(sorted)
    }

    /// Drops the cached copy of a level row.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cache`] when the backend rejects the delete.
    pub fn delete_cached(
        &self,
        category: &Category,
        level: VersionLevel,
    ) -> Result<(), IndexError> {
        self.cache
            .delete_multi(BROWSER_LEVELS_NAMESPACE, &[key_name(category, level)])
            .map_err(|err| IndexError::Cache(err.to_string()))
    }

    /// Reads cached rows; failures count as misses.
    fn read_cached(&self, keys: &[String]) -> BTreeMap<String, Vec<BrowserLabel>> {
        match self.cache.get_multi(BROWSER_LEVELS_NAMESPACE, keys) {
            Ok(values) => values
                .into_iter()
                .filter_map(|(key, bytes)| match serde_json::from_slice(&bytes) {
                    Ok(row) => Some((key, row)),
                    Err(err) => {
                        self.fallback(&err.to_string());
                        None
                    }
                })
                .collect(),
            Err(err) => {
                self.fallback(&err.to_string());
                BTreeMap::new()
            }
        }
    }

    /// Mirrors rows into the cache; failures are logged and dropped.
    fn write_cached(&self, rows: &BTreeMap<String, Vec<BrowserLabel>>) {
        let mut encoded = BTreeMap::new();
        for (key, row) in rows {
            match serde_json::to_vec(row) {
                Ok(bytes) => {
                    encoded.insert(key.clone(), bytes);
                }
                Err(err) => self.fallback(&err.to_string()),
            }
        }
        if let Err(err) = self.cache.set_multi(BROWSER_LEVELS_NAMESPACE, encoded, None) {
            self.fallback(&err.to_string());
        }
    }

    /// Emits a cache fallback event.
    fn fallback(&self, error: &str) {
        self.events.emit(StatsEvent::CacheFallback {
            namespace: BROWSER_LEVELS_NAMESPACE.to_string(),
            error: error.to_string(),
        });
    }
}

/// Returns true when the row holds a case-insensitive match for the label.
fn contains_label(row: &[BrowserLabel], label: &BrowserLabel) -> bool {
    let key = label.sort_key();
    row.iter().any(|existing| existing.sort_key() == key)
}

// crates/browserscope-core/src/core/stats.rs
// ============================================================================
// Module: Browserscope Stats Bundles
// Description: Aggregate per-browser statistics served from the stats cache.
// Purpose: Define the cached value shape and the ordered stats table.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! A [`BrowserStats`] bundle summarizes every test of a category for one
//! browser label. Bundles are derived data: they are JSON-encoded into the
//! cache and can be evicted and recomputed from rankers at any time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::BrowserLabel;
use crate::core::identifiers::TestKey;

// ============================================================================
// SECTION: Stats Types
// ============================================================================

/// Aggregate for one test of one browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    /// Ranker median, absent when no samples exist.
    pub median: Option<i64>,
    /// Display score in `0..=10`.
    pub score: u8,
    /// Human-readable display value.
    pub display: String,
    /// Number of samples in the ranker.
    pub count: usize,
}

/// Aggregate bundle for one browser label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserStats {
    /// Summary score across tests in `0..=10`.
    pub summary_score: u8,
    /// Summary display value.
    pub summary_display: String,
    /// Maximum sample count across the category's rankers.
    pub total_runs: usize,
    /// Per-test aggregates.
    pub results: BTreeMap<TestKey, TestStats>,
}

impl BrowserStats {
    /// Returns the aggregate for one test.
    #[must_use]
    pub fn test(&self, key: &TestKey) -> Option<&TestStats> {
        self.results.get(key)
    }
}

/// Stats bundles in the order the browsers were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsTable {
    /// One entry per requested browser, in request order.
    pub rows: Vec<(BrowserLabel, BrowserStats)>,
}

impl StatsTable {
    /// Returns the bundle for a browser label.
    #[must_use]
    pub fn get(&self, browser: &BrowserLabel) -> Option<&BrowserStats> {
        self.rows.iter().find(|(label, _)| label == browser).map(|(_, stats)| stats)
    }

    /// Returns the browser labels in row order.
    #[must_use]
    pub fn browsers(&self) -> Vec<&BrowserLabel> {
        self.rows.iter().map(|(label, _)| label).collect()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

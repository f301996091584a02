// crates/browserscope-core/src/core/ranker.rs
// ============================================================================
// Module: Browserscope Rankers
// Description: Append-only score collections with on-demand medians.
// Purpose: Hold per-browser score samples for one test.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! A [`Ranker`] holds every score folded for one (category, test, browser
//! label, params) tuple. The median is recomputed from the current contents on
//! each call: a sorted copy is indexed at `n / 2`, which is the upper middle
//! element for even counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::BrowserLabel;
use crate::core::identifiers::Category;
use crate::core::identifiers::ParamsString;
use crate::core::identifiers::TestKey;

// ============================================================================
// SECTION: Ranker Key
// ============================================================================

/// Separator used in flattened ranker storage keys.
const KEY_SEPARATOR: char = '\u{1f}';

/// Identity of a ranker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankerKey {
    /// Test category.
    pub category: Category,
    /// Test key.
    pub test: TestKey,
    /// Browser label at one version level.
    pub browser: BrowserLabel,
    /// Params string, when the test set is parameterized.
    pub params: Option<ParamsString>,
}

impl RankerKey {
    /// Creates a ranker key.
    #[must_use]
    pub const fn new(
        category: Category,
        test: TestKey,
        browser: BrowserLabel,
        params: Option<ParamsString>,
    ) -> Self {
        Self {
            category,
            test,
            browser,
            params,
        }
    }

    /// Returns a flat string key unique per ranker identity.
    #[must_use]
    pub fn storage_key(&self) -> String {
        let params = self.params.as_ref().map_or("", ParamsString::as_str);
        format!(
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{params}",
            self.category, self.test, self.browser
        )
    }
}

// ============================================================================
// SECTION: Ranker
// ============================================================================

/// Score samples for one ranker key.
///
/// # Invariants
/// - Scores are only appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranker {
    /// Ranker identity.
    pub key: RankerKey,
    /// Scores in append order.
    scores: Vec<i64>,
}

impl Ranker {
    /// Creates an empty ranker.
    #[must_use]
    pub const fn new(key: RankerKey) -> Self {
        Self {
            key,
            scores: Vec::new(),
        }
    }

    /// Creates a ranker from stored scores in append order.
    #[must_use]
    pub const fn from_scores(key: RankerKey, scores: Vec<i64>) -> Self {
        Self {
            key,
            scores,
        }
    }

    /// Appends one score.
    pub fn add(&mut self, score: i64) {
        self.scores.push(score);
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn count(&self) -> usize {
        self.scores.len()
    }

    /// Returns the scores in append order.
    #[must_use]
    pub fn scores(&self) -> &[i64] {
        &self.scores
    }

    /// Returns the median of the current samples, or `None` when empty.
    #[must_use]
    pub fn median(&self) -> Option<i64> {
        let mut sorted = self.scores.clone();
        sorted.sort_unstable();
        sorted.get(sorted.len() / 2).copied()
    }
}

// crates/browserscope-core/src/runtime/test_set.rs
// ============================================================================
// Module: Browserscope Static Test Sets
// Description: Declarative test sets and the category registry.
// Purpose: Parse results strings and turn ranker medians into display scores.
// Dependencies: crate::{core, interfaces}, serde
// ============================================================================

//! ## Overview
//! A [`StaticTestSet`] is built from [`TestDefinition`] values. Boolean tests
//! score 10 ("yes") for a non-zero median and 1 ("no") otherwise. Numeric tests
//! interpolate linearly between a best and a worst value onto `1..=10`. Tests
//! can rescale submitted values with a [`ScoreAdjustment`]; the raw value is
//! then kept on the submission parent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::core::BrowserLabel;
use crate::core::Category;
use crate::core::ParamsString;
use crate::core::RankerKey;
use crate::core::TestKey;
use crate::core::TestStats;
use crate::interfaces::ParsedResults;
use crate::interfaces::ParsedScore;
use crate::interfaces::TestSet;
use crate::interfaces::TestSetError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Highest display score.
const MAX_SCORE: u8 = 10;

/// Score assigned to a failing boolean test.
const FAIL_SCORE: u8 = 1;

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Scoring rule for one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreKind {
    /// Pass/fail test; any non-zero median passes.
    Boolean,
    /// Measured value interpolated between `best` and `worst`.
    Numeric {
        /// Value scoring 10.
        best: i64,
        /// Value scoring 1.
        worst: i64,
        /// Unit suffix for display values.
        #[serde(default)]
        unit: String,
    },
}

/// Rescaling applied to a submitted value before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreAdjustment {
    /// Integer division rounded half away from zero.
    Divide {
        /// Positive divisor.
        divisor: i64,
    },
}

impl ScoreAdjustment {
    /// Applies the adjustment to a raw value.
    ///
    /// Returns `None` when the adjustment is not well-formed.
    #[must_use]
    pub const fn apply(self, raw: i64) -> Option<i64> {
        match self {
            Self::Divide {
                divisor,
            } => {
                if divisor <= 0 {
                    return None;
                }
                let quotient = raw / divisor;
                let remainder = raw % divisor;
                if remainder.unsigned_abs() * 2 >= divisor.unsigned_abs() {
                    Some(quotient + raw.signum())
                } else {
                    Some(quotient)
                }
            }
        }
    }
}

/// One test in a static test set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Test key used in results strings.
    pub key: TestKey,
    /// Human-readable test name.
    pub name: String,
    /// Scoring rule.
    pub kind: ScoreKind,
    /// Optional rescaling of submitted values.
    #[serde(default)]
    pub adjustment: Option<ScoreAdjustment>,
}

// ============================================================================
// SECTION: Static Test Set
// ============================================================================

/// Test set backed by a fixed list of definitions.
///
/// # Invariants
/// - Test keys are unique and non-empty.
/// - Every divide adjustment has a positive divisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTestSet {
    /// Category served by the set.
    category: Category,
    /// Definitions in display order.
    tests: Vec<TestDefinition>,
}

impl StaticTestSet {
    /// Builds a test set, validating the definitions.
    ///
    /// # Errors
    ///
    /// Returns [`TestSetError::InvalidDefinition`] for duplicate or empty keys
    /// and non-positive divisors.
    pub fn new(category: Category, tests: Vec<TestDefinition>) -> Result<Self, TestSetError> {
        let mut seen = BTreeSet::new();
        for test in &tests {
            if test.key.as_str().is_empty() {
                return Err(TestSetError::InvalidDefinition(format!(
                    "{category}: empty test key"
                )));
            }
            if !seen.insert(test.key.clone()) {
                return Err(TestSetError::InvalidDefinition(format!(
                    "{category}: duplicate test key {}",
                    test.key
                )));
            }
            if let Some(ScoreAdjustment::Divide {
                divisor,
            }) = test.adjustment
                && divisor <= 0
            {
                return Err(TestSetError::InvalidDefinition(format!(
                    "{category}: divisor for {} must be positive",
                    test.key
                )));
            }
        }
        Ok(Self {
            category,
            tests,
        })
    }

    /// Returns the definition for a test key.
    #[must_use]
    pub fn definition(&self, key: &TestKey) -> Option<&TestDefinition> {
        self.tests.iter().find(|test| &test.key == key)
    }
}

impl TestSet for StaticTestSet {
    fn category(&self) -> &Category {
        &self.category
    }

    fn test_keys(&self) -> Vec<TestKey> {
        self.tests.iter().map(|test| test.key.clone()).collect()
    }

    fn parse_results(
        &self,
        results: &str,
        ignore_unknown: bool,
    ) -> Result<ParsedResults, TestSetError> {
        let mut parsed = ParsedResults::default();
        let mut seen = BTreeSet::new();
        for pair in results.split(',') {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(TestSetError::MalformedValue(format!("missing '=' in '{pair}'")));
            };
            let key = TestKey::new(key.trim());
            let value = value.trim();
            let raw: i64 = value.parse().map_err(|_| {
                TestSetError::MalformedValue(format!("{key}: '{value}' is not an integer"))
            })?;
            if !seen.insert(key.clone()) {
                return Err(TestSetError::MalformedValue(format!("duplicate test key {key}")));
            }
            let Some(definition) = self.definition(&key) else {
                if ignore_unknown {
                    parsed.dropped.push(key);
                    continue;
                }
                return Err(TestSetError::UnknownTestKey(key.to_string()));
            };
            let score = match definition.adjustment {
                Some(adjustment) => ParsedScore {
                    test: key,
                    score: adjustment.apply(raw).ok_or_else(|| {
                        TestSetError::InvalidDefinition("invalid adjustment".to_string())
                    })?,
                    raw: Some(raw),
                },
                None => ParsedScore {
                    test: key,
                    score: raw,
                    raw: None,
                },
            };
            parsed.scores.push(score);
        }
        Ok(parsed)
    }

    fn ranker_keys(
        &self,
        test: &TestKey,
        browsers: &[BrowserLabel],
        params: Option<&ParamsString>,
    ) -> Vec<RankerKey> {
        if self.definition(test).is_none() {
            return Vec::new();
        }
        browsers
            .iter()
            .map(|browser| {
                RankerKey::new(
                    self.category.clone(),
                    test.clone(),
                    browser.clone(),
                    params.cloned(),
                )
            })
            .collect()
    }

    fn test_stats(&self, test: &TestKey, median: Option<i64>, count: usize) -> TestStats {
        let (score, display) = match (self.definition(test), median) {
            (Some(definition), Some(median)) => score_median(&definition.kind, median),
            _ => (0, String::new()),
        };
        TestStats {
            median,
            score,
            display,
            count,
        }
    }

    fn summarize(&self, results: &BTreeMap<TestKey, TestStats>) -> (u8, String) {
        let scored: Vec<u8> = self
            .tests
            .iter()
            .filter_map(|test| results.get(&test.key))
            .filter(|stats| stats.median.is_some())
            .map(|stats| stats.score)
            .collect();
        if scored.is_empty() {
            return (0, String::new());
        }
        let total: usize = scored.iter().map(|score| usize::from(*score)).sum();
        let max = self.tests.len() * usize::from(MAX_SCORE);
        let mean = (total + scored.len() / 2) / scored.len();
        let summary = u8::try_from(mean).unwrap_or(MAX_SCORE).min(MAX_SCORE);
        (summary, format!("{total}/{max}"))
    }
}

/// Maps a median onto a display score and display string.
fn score_median(kind: &ScoreKind, median: i64) -> (u8, String) {
    match kind {
        ScoreKind::Boolean => {
            if median == 0 {
                (FAIL_SCORE, "no".to_string())
            } else {
                (MAX_SCORE, "yes".to_string())
            }
        }
        ScoreKind::Numeric {
            best,
            worst,
            unit,
        } => (interpolate(*best, *worst, median), format!("{median}{unit}")),
    }
}

/// Interpolates a value between `worst` (1) and `best` (10), clamped.
fn interpolate(best: i64, worst: i64, value: i64) -> u8 {
    let mut span = i128::from(worst) - i128::from(best);
    let mut distance = i128::from(worst) - i128::from(value);
    if span == 0 {
        return if value == best { MAX_SCORE } else { FAIL_SCORE };
    }
    if span < 0 {
        span = -span;
        distance = -distance;
    }
    let distance = distance.clamp(0, span);
    let steps = i128::from(MAX_SCORE - FAIL_SCORE);
    let scaled = (distance * steps + span / 2) / span;
    u8::try_from(scaled).map_or(MAX_SCORE, |scaled| FAIL_SCORE + scaled)
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry mapping categories to their test sets.
#[derive(Clone, Default)]
pub struct TestSetRegistry {
    /// Test sets keyed by category.
    sets: BTreeMap<Category, Arc<dyn TestSet>>,
}

impl TestSetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a test set under its category, replacing any previous set.
    pub fn register(&mut self, test_set: Arc<dyn TestSet>) {
        self.sets.insert(test_set.category().clone(), test_set);
    }

    /// Returns the test set for a category.
    #[must_use]
    pub fn get(&self, category: &Category) -> Option<Arc<dyn TestSet>> {
        self.sets.get(category).cloned()
    }

    /// Returns the registered categories in order.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.sets.keys().cloned().collect()
    }
}

// crates/browserscope-core/src/runtime/policy.rs
// ============================================================================
// Module: Browserscope Pipeline Policy
// Description: Stats gating policy and ingestion limits.
// Purpose: Centralize the knobs that decide what the pipeline accepts and updates.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Rankers are only updated for categories in the active set, except outside
//! production where every category is aggregated. Ingestion limits bound the
//! size of a single submission before any parsing or storage happens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::Category;
use crate::core::DEFAULT_MAX_EXTRA_FIELDS;

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Production deployment; stats gated by the active category set.
    #[default]
    Production,
    /// Development deployment; all categories aggregated.
    Development,
    /// Test deployment; all categories aggregated.
    Test,
}

// ============================================================================
// SECTION: Reconcile Policy
// ============================================================================

/// Gating policy applied during reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    /// Deployment environment.
    pub environment: Environment,
    /// Categories whose rankers are updated in production.
    pub active_categories: BTreeSet<Category>,
}

impl ReconcilePolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(environment: Environment, active_categories: BTreeSet<Category>) -> Self {
        Self {
            environment,
            active_categories,
        }
    }

    /// Returns true when rankers should be updated for the category.
    #[must_use]
    pub fn stats_update_needed(&self, category: &Category) -> bool {
        self.active_categories.contains(category) || self.environment != Environment::Production
    }
}

// ============================================================================
// SECTION: Ingest Limits
// ============================================================================

/// Default maximum results string length in bytes.
pub const DEFAULT_MAX_RESULTS_BYTES: usize = 16 * 1024;

/// Default maximum number of tests per submission.
pub const DEFAULT_MAX_TESTS_PER_SUBMISSION: usize = 256;

/// Size limits enforced on each submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestLimits {
    /// Maximum results string length in bytes.
    pub max_results_bytes: usize,
    /// Maximum number of parsed tests.
    pub max_tests_per_submission: usize,
    /// Maximum number of extra fields on the parent.
    pub max_extra_fields: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_results_bytes: DEFAULT_MAX_RESULTS_BYTES,
            max_tests_per_submission: DEFAULT_MAX_TESTS_PER_SUBMISSION,
            max_extra_fields: DEFAULT_MAX_EXTRA_FIELDS,
        }
    }
}

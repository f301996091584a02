// crates/browserscope-core/src/runtime/reconciler.rs
// ============================================================================
// Module: Browserscope Dirty Reconciler
// Description: Folds dirty child scores of one submission into rankers.
// Purpose: Converge rankers with ingested submissions under at-least-once delivery.
// Dependencies: crate::{core, interfaces, runtime, telemetry}, serde, thiserror
// ============================================================================

//! ## Overview
//! A reconciliation pass loads the dirty children of one submission and folds
//! each through [`EntityStore::fold_dirty_score`], which re-checks the dirty
//! flag inside its own transaction. Redelivered or concurrent passes therefore
//! fold each score at most once. A failing record is reported and left dirty
//! for the next delivery; the rest of the pass continues.
//!
//! When the category is gated off, dirty flags are still cleared but no ranker
//! is touched. Whenever a gated-on submission is found with no dirty children
//! left, including on redelivery, its cached stats are invalidated and a
//! category update job is scheduled. Imports never reach the completion step.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::BrowserLabel;
use crate::core::SubmissionId;
use crate::core::SubmissionRecord;
use crate::core::TestKey;
use crate::interfaces::CategoryUpdateJob;
use crate::interfaces::EntityStore;
use crate::interfaces::FoldOutcome;
use crate::interfaces::Job;
use crate::interfaces::StoreError;
use crate::interfaces::WorkQueue;
use crate::runtime::policy::ReconcilePolicy;
use crate::runtime::stats_cache::StatsCache;
use crate::runtime::stats_cache::stats_namespace;
use crate::runtime::test_set::TestSetRegistry;
use crate::telemetry::EventSink;
use crate::telemetry::StatsEvent;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Reconciliation errors that abort a pass before any fold.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The entity store failed.
    #[error("reconcile store error: {0}")]
    Store(String),
    /// The submission references a user agent that is not stored.
    #[error("missing user agent: {0}")]
    MissingUserAgent(String),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Overall result of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Every dirty score was folded or found clean.
    Completed,
    /// Some scores failed and remain dirty.
    PartialReconciliation,
    /// The submission had no dirty scores.
    AlreadyClean,
    /// The submission does not exist.
    Missing,
}

/// A score that failed to fold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldFailure {
    /// Test key of the failing score.
    pub test: TestKey,
    /// Store error.
    pub error: String,
}

/// Report of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Reconciled submission.
    pub submission_id: SubmissionId,
    /// Overall outcome.
    pub outcome: ReconcileOutcome,
    /// Scores folded by this pass.
    pub folded: usize,
    /// Scores another pass had already folded.
    pub already_clean: usize,
    /// Scores whose test is not in the category's test set.
    pub unknown_tests: Vec<TestKey>,
    /// Scores that failed to fold.
    pub failures: Vec<FoldFailure>,
    /// Whether the gate allowed ranker updates.
    pub stats_updated: bool,
    /// Dirty scores left after the pass.
    pub remaining_dirty: usize,
    /// Whether a category update job was enqueued.
    pub category_update_scheduled: bool,
}

impl ReconcileReport {
    /// Creates an empty report with the given outcome.
    const fn empty(submission_id: SubmissionId, outcome: ReconcileOutcome) -> Self {
        Self {
            submission_id,
            outcome,
            folded: 0,
            already_clean: 0,
            unknown_tests: Vec::new(),
            failures: Vec::new(),
            stats_updated: false,
            remaining_dirty: 0,
            category_update_scheduled: false,
        }
    }
}

// ============================================================================
// SECTION: Dirty Reconciler
// ============================================================================

/// Reconciliation service.
#[derive(Clone)]
pub struct DirtyReconciler {
    /// Entity store.
    store: Arc<dyn EntityStore>,
    /// Work queue receiving category update jobs.
    queue: Arc<dyn WorkQueue>,
    /// Stats cache invalidated on completion.
    stats: StatsCache,
    /// Test sets by category.
    registry: Arc<TestSetRegistry>,
    /// Gating policy.
    policy: ReconcilePolicy,
    /// Event sink.
    events: Arc<dyn EventSink>,
}

impl DirtyReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        queue: Arc<dyn WorkQueue>,
        stats: StatsCache,
        registry: Arc<TestSetRegistry>,
        policy: ReconcilePolicy,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            queue,
            stats,
            registry,
            policy,
            events,
        }
    }

    /// Folds the submission's dirty scores into rankers.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when the submission context cannot be loaded.
    /// Per-score failures are reported, not returned.
    pub fn reconcile(&self, id: SubmissionId) -> Result<ReconcileReport, ReconcileError> {
        let Some(parent) = self.store.load_submission(id)? else {
            self.events.emit(StatsEvent::ReconcileSkipped {
                submission_id: id.get(),
                reason: "submission not found".to_string(),
            });
            return Ok(ReconcileReport::empty(id, ReconcileOutcome::Missing));
        };
        let dirty = self.store.load_dirty_scores(id)?;
        let stats_updated = self.policy.stats_update_needed(&parent.category);
        if dirty.is_empty() {
            let mut report = ReconcileReport::empty(id, ReconcileOutcome::AlreadyClean);
            if stats_updated && !parent.is_import {
                let browsers = self.browsers(&parent)?;
                report.stats_updated = true;
                self.complete(&parent, &browsers, &mut report);
            }
            self.emit_completed(&report);
            return Ok(report);
        }
        let browsers = self.browsers(&parent)?;
        let test_set = self.registry.get(&parent.category);
        let mut report = ReconcileReport::empty(id, ReconcileOutcome::Completed);
        report.stats_updated = stats_updated;

        for score in dirty {
            let rankers = match (&test_set, stats_updated) {
                (Some(test_set), true) => {
                    test_set.ranker_keys(&score.test, &browsers, parent.params.as_ref())
                }
                _ => Vec::new(),
            };
            if stats_updated && rankers.is_empty() {
                self.events.emit(StatsEvent::UnknownRankerTest {
                    category: parent.category.to_string(),
                    test: score.test.to_string(),
                });
                report.unknown_tests.push(score.test.clone());
            }
            match self.store.fold_dirty_score(id, &score.test, &rankers) {
                Ok(FoldOutcome::Folded {
                    ..
                }) => report.folded += 1,
                Ok(FoldOutcome::AlreadyClean | FoldOutcome::Missing) => report.already_clean += 1,
                Err(err) => report.failures.push(FoldFailure {
                    test: score.test,
                    error: err.to_string(),
                }),
            }
        }

        report.remaining_dirty = self.store.count_dirty_scores(id)?;
        if !report.failures.is_empty() || report.remaining_dirty > 0 {
            report.outcome = ReconcileOutcome::PartialReconciliation;
        }
        if stats_updated && report.remaining_dirty == 0 {
            self.complete(&parent, &browsers, &mut report);
        }
        self.emit_completed(&report);
        Ok(report)
    }

    /// Resolves the browser labels of the submission's user agent.
    fn browsers(&self, parent: &SubmissionRecord) -> Result<Vec<BrowserLabel>, ReconcileError> {
        let user_agent = self
            .store
            .load_user_agent(&parent.user_agent_key)?
            .ok_or_else(|| ReconcileError::MissingUserAgent(parent.user_agent_key.to_string()))?;
        Ok(user_agent.string_list())
    }

    /// Invalidates cached stats and schedules the category update.
    ///
    /// Also runs on clean redeliveries; both steps are idempotent.
    fn complete(
        &self,
        parent: &SubmissionRecord,
        browsers: &[BrowserLabel],
        report: &mut ReconcileReport,
    ) {
        let invalidated = self.stats.invalidate(&parent.category, parent.params.as_ref(), browsers);
        if let Err(err) = invalidated {
            self.events.emit(StatsEvent::CacheInvalidationFailed {
                namespace: stats_namespace(&parent.category, parent.params.as_ref()),
                error: err.to_string(),
            });
        }
        let job = Job::CategoryUpdate(CategoryUpdateJob {
            category: parent.category.clone(),
            user_agent_key: parent.user_agent_key.clone(),
            params: parent.params.clone(),
        });
        let queue = job.queue_name();
        match self.queue.enqueue(job) {
            Ok(()) => report.category_update_scheduled = true,
            Err(err) => self.events.emit(StatsEvent::SchedulingFailed {
                queue: queue.to_string(),
                category: parent.category.to_string(),
                error: err.to_string(),
            }),
        }
    }

    /// Emits the completion event for a report.
    fn emit_completed(&self, report: &ReconcileReport) {
        self.events.emit(StatsEvent::ReconcileCompleted {
            submission_id: report.submission_id.get(),
            folded: report.folded,
            already_clean: report.already_clean,
            failures: report.failures.len(),
            stats_updated: report.stats_updated,
            finished: report.remaining_dirty == 0,
        });
    }
}

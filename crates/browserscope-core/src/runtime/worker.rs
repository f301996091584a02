// crates/browserscope-core/src/runtime/worker.rs
// ============================================================================
// Module: Browserscope Job Runner
// Description: Dispatch of background jobs and the dirty sweep.
// Purpose: Execute reconcile and category update jobs with bounded retries.
// Dependencies: crate::{core, interfaces, runtime, telemetry}, serde, thiserror
// ============================================================================

//! ## Overview
//! [`JobRunner::run`] executes one job. [`JobRunner::drain`] empties an
//! in-process queue, retrying failed jobs and partial reconciliations up to
//! the configured attempt limit; jobs scheduled while draining are drained
//! too. [`JobRunner::sweep_dirty`] reconciles submissions that still have
//! dirty scores, which recovers jobs that were never scheduled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::SubmissionId;
use crate::core::VersionLevel;
use crate::interfaces::CategoryUpdateJob;
use crate::interfaces::EntityStore;
use crate::interfaces::Job;
use crate::interfaces::QueueError;
use crate::interfaces::StoreError;
use crate::runtime::browser_index::BrowserVersionIndex;
use crate::runtime::browser_index::IndexError;
use crate::runtime::queue::InMemoryWorkQueue;
use crate::runtime::reconciler::DirtyReconciler;
use crate::runtime::reconciler::ReconcileError;
use crate::runtime::reconciler::ReconcileOutcome;
use crate::runtime::reconciler::ReconcileReport;
use crate::runtime::stats_cache::StatsCache;
use crate::runtime::stats_cache::StatsError;
use crate::runtime::test_set::TestSetRegistry;
use crate::telemetry::EventSink;
use crate::telemetry::StatsEvent;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Default attempt limit per job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Job execution errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// Reconciliation failed.
    #[error("reconcile job failed: {0}")]
    Reconcile(String),
    /// Browser index update failed.
    #[error("browser index update failed: {0}")]
    Index(String),
    /// Stats refresh failed.
    #[error("stats refresh failed: {0}")]
    Stats(String),
    /// Entity store failed.
    #[error("job store error: {0}")]
    Store(String),
    /// The job references a user agent that is not stored.
    #[error("missing user agent: {0}")]
    MissingUserAgent(String),
    /// The queue failed.
    #[error("job queue error: {0}")]
    Queue(String),
}

impl From<ReconcileError> for JobError {
    fn from(err: ReconcileError) -> Self {
        Self::Reconcile(err.to_string())
    }
}

impl From<IndexError> for JobError {
    fn from(err: IndexError) -> Self {
        Self::Index(err.to_string())
    }
}

impl From<StatsError> for JobError {
    fn from(err: StatsError) -> Self {
        Self::Stats(err.to_string())
    }
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<QueueError> for JobError {
    fn from(err: QueueError) -> Self {
        Self::Queue(err.to_string())
    }
}

/// Result of one job execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobOutcome {
    /// A reconciliation pass ran.
    Reconciled {
        /// Pass report.
        report: ReconcileReport,
    },
    /// A category update ran.
    CategoryUpdated {
        /// Levels whose browser rows changed.
        changed_levels: Vec<VersionLevel>,
        /// Stats bundles refreshed in the cache.
        refreshed: usize,
    },
}

impl JobOutcome {
    /// Returns true when the job should be retried.
    #[must_use]
    pub const fn needs_retry(&self) -> bool {
        matches!(
            self,
            Self::Reconciled {
                report: ReconcileReport {
                    outcome: ReconcileOutcome::PartialReconciliation,
                    ..
                },
            }
        )
    }
}

/// Summary of a queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Jobs that finished successfully.
    pub completed: usize,
    /// Extra attempts made for failing jobs.
    pub retries: usize,
    /// Jobs abandoned after the attempt limit.
    pub failed: usize,
    /// Outcomes of completed jobs in completion order.
    pub outcomes: Vec<JobOutcome>,
}

/// Summary of a dirty sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Reports of reconciled submissions.
    pub reconciled: Vec<ReconcileReport>,
    /// Submissions whose pass failed, with the error.
    pub errors: Vec<(SubmissionId, String)>,
}

// ============================================================================
// SECTION: Job Runner
// ============================================================================

/// Background job runner.
#[derive(Clone)]
pub struct JobRunner {
    /// Entity store.
    store: Arc<dyn EntityStore>,
    /// Reconciliation service.
    reconciler: DirtyReconciler,
    /// Browser index service.
    index: BrowserVersionIndex,
    /// Stats cache service.
    stats: StatsCache,
    /// Test sets by category.
    registry: Arc<TestSetRegistry>,
    /// Event sink.
    events: Arc<dyn EventSink>,
    /// Attempt limit per job.
    max_attempts: u32,
}

impl JobRunner {
    /// Creates a job runner.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        reconciler: DirtyReconciler,
        index: BrowserVersionIndex,
        stats: StatsCache,
        registry: Arc<TestSetRegistry>,
        events: Arc<dyn EventSink>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            reconciler,
            index,
            stats,
            registry,
            events,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Executes one job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when the job fails and should be redelivered.
    pub fn run(&self, job: &Job) -> Result<JobOutcome, JobError> {
        match job {
            Job::Reconcile(job) => Ok(JobOutcome::Reconciled {
                report: self.reconciler.reconcile(job.submission_id)?,
            }),
            Job::CategoryUpdate(job) => self.category_update(job),
        }
    }

    /// Runs jobs from the queue until it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Queue`] when the queue cannot be read.
    pub fn drain(&self, queue: &InMemoryWorkQueue) -> Result<DrainReport, JobError> {
        let mut report = DrainReport::default();
        while let Some(job) = queue.pop()? {
            let mut attempts = 0;
            loop {
                attempts += 1;
                let result = self.run(&job);
                let retry = match &result {
                    Ok(outcome) => outcome.needs_retry(),
                    Err(_) => true,
                };
                if !retry {
                    if let Ok(outcome) = result {
                        report.outcomes.push(outcome);
                    }
                    report.completed += 1;
                    break;
                }
                if attempts >= self.max_attempts {
                    let error = match result {
                        Ok(_) => "partial reconciliation".to_string(),
                        Err(err) => err.to_string(),
                    };
                    self.events.emit(StatsEvent::JobFailed {
                        queue: job.queue_name().to_string(),
                        attempts,
                        error,
                    });
                    report.failed += 1;
                    break;
                }
                report.retries += 1;
            }
        }
        Ok(report)
    }

    /// Reconciles up to `limit` submissions that still have dirty scores.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Store`] when dirty submissions cannot be listed.
    pub fn sweep_dirty(&self, limit: usize) -> Result<SweepReport, JobError> {
        let mut report = SweepReport::default();
        for id in self.store.list_dirty_submissions(limit)? {
            match self.reconciler.reconcile(id) {
                Ok(reconciled) => report.reconciled.push(reconciled),
                Err(err) => report.errors.push((id, err.to_string())),
            }
        }
        Ok(report)
    }

    /// Indexes a user agent's labels and refreshes its cached stats.
    fn category_update(&self, job: &CategoryUpdateJob) -> Result<JobOutcome, JobError> {
        let user_agent = self
            .store
            .load_user_agent(&job.user_agent_key)?
            .ok_or_else(|| JobError::MissingUserAgent(job.user_agent_key.to_string()))?;
        let changed_levels = self.index.add_user_agent(&job.category, &user_agent)?;
        let refreshed = match self.registry.get(&job.category) {
            Some(test_set) => self
                .stats
                .update_stats_cache(test_set.as_ref(), &user_agent, job.params.as_ref())?
                .len(),
            None => 0,
        };
        Ok(JobOutcome::CategoryUpdated {
            changed_levels,
            refreshed,
        })
    }
}

// crates/browserscope-core/src/runtime/ingest.rs
// ============================================================================
// Module: Browserscope Result Store
// Description: Transactional ingestion of submitted test runs.
// Purpose: Validate, parse, and persist one submission, then schedule reconciliation.
// Dependencies: crate::{core, interfaces, runtime::policy, telemetry}, thiserror
// ============================================================================

//! ## Overview
//! [`ResultStore::add_result`] validates a submission completely before any
//! write: params, size limits, and the results string are all checked first.
//! The user agent is deduplicated, then the parent and every child are written
//! by one atomic [`EntityStore::insert_submission`] call. Reconciliation is
//! scheduled after commit; a scheduling failure is logged and swallowed
//! because the dirty sweep recovers the submission.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ExtraFields;
use crate::core::NewScore;
use crate::core::NewSubmission;
use crate::core::ParamsString;
use crate::core::SubmissionId;
use crate::core::SubmissionRecord;
use crate::core::TestKey;
use crate::core::Timestamp;
use crate::core::UserAgentInfo;
use crate::interfaces::EntityStore;
use crate::interfaces::Job;
use crate::interfaces::ReconcileJob;
use crate::interfaces::StoreError;
use crate::interfaces::TestSet;
use crate::interfaces::TestSetError;
use crate::interfaces::WorkQueue;
use crate::runtime::policy::IngestLimits;
use crate::telemetry::EventSink;
use crate::telemetry::StatsEvent;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ingestion errors. No records are written when any of these is returned.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request violates an argument rule or size limit.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The results string names a test outside the test set.
    #[error("unknown test key: {0}")]
    UnknownTestKey(String),
    /// The results string is malformed.
    #[error("malformed results value: {0}")]
    MalformedValue(String),
    /// The entity store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<TestSetError> for IngestError {
    fn from(err: TestSetError) -> Self {
        match err {
            TestSetError::UnknownTestKey(key) => Self::UnknownTestKey(key),
            TestSetError::MalformedValue(detail) => Self::MalformedValue(detail),
            TestSetError::InvalidDefinition(detail) => Self::InvalidArgument(detail),
        }
    }
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// One submitted test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Submitter address, hashed by the caller.
    pub ip_hash: String,
    /// Raw HTTP user-agent string.
    pub user_agent: String,
    /// Results string (`key=value,key=value`).
    pub results: String,
    /// Bulk import flag; unknown keys are dropped and scores are stored clean.
    #[serde(default)]
    pub is_import: bool,
    /// Optional params string; empty and `"None"` are rejected.
    #[serde(default)]
    pub params: Option<String>,
    /// JavaScript-reported user agent.
    #[serde(default)]
    pub js_user_agent: Option<String>,
    /// IE document mode.
    #[serde(default)]
    pub js_document_mode: Option<String>,
    /// Submission time.
    pub created: Timestamp,
}

// ============================================================================
// SECTION: Result Store
// ============================================================================

/// Ingestion service for submitted runs.
#[derive(Clone)]
pub struct ResultStore {
    /// Entity store.
    store: Arc<dyn EntityStore>,
    /// Work queue receiving reconciliation jobs.
    queue: Arc<dyn WorkQueue>,
    /// Event sink.
    events: Arc<dyn EventSink>,
    /// Submission size limits.
    limits: IngestLimits,
}

impl ResultStore {
    /// Creates a result store service.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        queue: Arc<dyn WorkQueue>,
        events: Arc<dyn EventSink>,
        limits: IngestLimits,
    ) -> Self {
        Self {
            store,
            queue,
            events,
            limits,
        }
    }

    /// Validates and stores one submission, then schedules reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] when validation or the store write fails; in
    /// that case no parent or child is visible.
    pub fn add_result(
        &self,
        test_set: &dyn TestSet,
        request: SubmitRequest,
    ) -> Result<SubmissionRecord, IngestError> {
        let category = test_set.category().clone();
        let prepared = match self.prepare(test_set, &request) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.events.emit(StatsEvent::SubmissionRejected {
                    category: category.to_string(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };
        let user_agent = UserAgentInfo::parse(
            &request.user_agent,
            request.js_user_agent.as_deref(),
            request.js_document_mode.as_deref(),
        );
        let user_agent_key = self.store.upsert_user_agent(&user_agent)?;
        let tests = prepared.scores.len();
        let record = self.store.insert_submission(NewSubmission {
            category: category.clone(),
            user_agent_key: user_agent_key.clone(),
            ip_hash: request.ip_hash,
            created: request.created,
            params: prepared.params,
            is_import: request.is_import,
            extra: prepared.extra,
            scores: prepared.scores,
        })?;
        let job = Job::Reconcile(ReconcileJob {
            submission_id: record.id,
            category: category.clone(),
            user_agent_key,
        });
        let queue = job.queue_name();
        if let Err(err) = self.queue.enqueue(job) {
            self.events.emit(StatsEvent::SchedulingFailed {
                queue: queue.to_string(),
                category: category.to_string(),
                error: err.to_string(),
            });
        }
        self.events.emit(StatsEvent::SubmissionAccepted {
            submission_id: record.id.get(),
            category: category.to_string(),
            tests,
            dropped: prepared.dropped,
        });
        Ok(record)
    }

    /// Returns the test key to score map of a stored submission.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] when the read fails.
    pub fn results(
        &self,
        id: SubmissionId,
    ) -> Result<Option<BTreeMap<TestKey, i64>>, IngestError> {
        if self.store.load_submission(id)?.is_none() {
            return Ok(None);
        }
        let scores = self.store.load_scores(id)?;
        Ok(Some(scores.into_iter().map(|score| (score.test, score.score)).collect()))
    }

    /// Loads a stored submission parent.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Store`] when the read fails.
    pub fn submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>, IngestError> {
        Ok(self.store.load_submission(id)?)
    }

    /// Runs every validation step that precedes the store write.
    fn prepare(
        &self,
        test_set: &dyn TestSet,
        request: &SubmitRequest,
    ) -> Result<PreparedSubmission, IngestError> {
        let params = ParamsString::parse(request.params.as_deref())
            .map_err(|err| IngestError::InvalidArgument(err.to_string()))?;
        if request.results.len() > self.limits.max_results_bytes {
            return Err(IngestError::InvalidArgument(format!(
                "results exceed size limit: {} bytes (max {})",
                request.results.len(),
                self.limits.max_results_bytes
            )));
        }
        let parsed = test_set.parse_results(&request.results, request.is_import)?;
        if parsed.scores.len() > self.limits.max_tests_per_submission {
            return Err(IngestError::InvalidArgument(format!(
                "too many tests: {} (max {})",
                parsed.scores.len(),
                self.limits.max_tests_per_submission
            )));
        }
        let mut extra = ExtraFields::new();
        let mut scores = Vec::with_capacity(parsed.scores.len());
        for score in parsed.scores {
            if let Some(raw) = score.raw {
                extra
                    .insert(score.test.clone(), raw, self.limits.max_extra_fields)
                    .map_err(|err| IngestError::InvalidArgument(err.to_string()))?;
            }
            scores.push(NewScore {
                test: score.test,
                score: score.score,
            });
        }
        Ok(PreparedSubmission {
            params,
            extra,
            scores,
            dropped: parsed.dropped.len(),
        })
    }
}

/// Validated submission content ready to be written.
struct PreparedSubmission {
    /// Validated params string.
    params: Option<ParamsString>,
    /// Raw values of adjusted scores.
    extra: ExtraFields,
    /// Scores to persist.
    scores: Vec<NewScore>,
    /// Number of dropped unknown keys.
    dropped: usize,
}

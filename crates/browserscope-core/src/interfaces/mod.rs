// crates/browserscope-core/src/interfaces/mod.rs
// ============================================================================
// Module: Browserscope Interfaces
// Description: Backend-agnostic interfaces for storage, caching, jobs, and tests.
// Purpose: Define the contract surfaces used by the stats pipeline runtime.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline reaches its collaborators without
//! embedding backend details. The entity store is the only durable component
//! and the only one that must provide transactions; the cache is best-effort
//! and the work queue is at-least-once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::BrowserLabel;
use crate::core::BrowserStats;
use crate::core::Category;
use crate::core::NewSubmission;
use crate::core::ParamsString;
use crate::core::Ranker;
use crate::core::RankerKey;
use crate::core::ScoreRecord;
use crate::core::SubmissionId;
use crate::core::SubmissionRecord;
use crate::core::TestKey;
use crate::core::TestStats;
use crate::core::UserAgentInfo;
use crate::core::UserAgentKey;

// ============================================================================
// SECTION: Test Set
// ============================================================================

/// Test-set errors raised while parsing a results string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestSetError {
    /// A results key is not part of the test set.
    #[error("unknown test key: {0}")]
    UnknownTestKey(String),
    /// A results pair is malformed or its value is not an integer.
    #[error("malformed results value: {0}")]
    MalformedValue(String),
    /// The test set definition itself is invalid.
    #[error("invalid test set definition: {0}")]
    InvalidDefinition(String),
}

/// One parsed score from a results string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedScore {
    /// Test key.
    pub test: TestKey,
    /// Canonical score to persist.
    pub score: i64,
    /// Raw submitted value when the test set adjusted the score.
    pub raw: Option<i64>,
}

/// Parsed results string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResults {
    /// Scores in submission order.
    pub scores: Vec<ParsedScore>,
    /// Unknown keys dropped because the submission was an import.
    pub dropped: Vec<TestKey>,
}

/// Test definitions for one category.
pub trait TestSet: Send + Sync {
    /// Returns the category served by the test set.
    fn category(&self) -> &Category;

    /// Returns the test keys in display order.
    fn test_keys(&self) -> Vec<TestKey>;

    /// Parses a `key=value,key=value` results string.
    ///
    /// Unknown keys fail unless `ignore_unknown` is set, in which case they
    /// are reported in [`ParsedResults::dropped`].
    ///
    /// # Errors
    ///
    /// Returns [`TestSetError`] for unknown keys or malformed values.
    fn parse_results(
        &self,
        results: &str,
        ignore_unknown: bool,
    ) -> Result<ParsedResults, TestSetError>;

    /// Resolves the rankers a score for `test` folds into, one per browser.
    ///
    /// Returns an empty list when the test is no longer part of the set.
    fn ranker_keys(
        &self,
        test: &TestKey,
        browsers: &[BrowserLabel],
        params: Option<&ParamsString>,
    ) -> Vec<RankerKey>;

    /// Transforms a ranker median and sample count into display stats.
    fn test_stats(&self, test: &TestKey, median: Option<i64>, count: usize) -> TestStats;

    /// Computes the summary score and display across per-test stats.
    fn summarize(&self, results: &BTreeMap<TestKey, TestStats>) -> (u8, String);
}

// ============================================================================
// SECTION: Entity Store
// ============================================================================

/// Entity store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("entity store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("entity store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("entity store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("entity store invalid data: {0}")]
    Invalid(String),
    /// Store backend error.
    #[error("entity store error: {0}")]
    Store(String),
}

/// Outcome of folding one dirty score into its rankers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FoldOutcome {
    /// The score was appended to the rankers and marked clean.
    Folded {
        /// Number of rankers updated.
        rankers: usize,
    },
    /// The score was already clean; nothing changed.
    AlreadyClean,
    /// No score exists for the submission and test key.
    Missing,
}

/// Durable entity store for submissions, rankers, and browser levels.
pub trait EntityStore: Send + Sync {
    /// Stores a user agent descriptor if absent and returns its key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_user_agent(&self, info: &UserAgentInfo) -> Result<UserAgentKey, StoreError>;

    /// Loads a stored user agent descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn load_user_agent(&self, key: &UserAgentKey) -> Result<Option<UserAgentInfo>, StoreError>;

    /// Writes a parent and all of its children in one transaction.
    ///
    /// Either every record becomes visible or none does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transaction fails.
    fn insert_submission(&self, submission: NewSubmission)
    -> Result<SubmissionRecord, StoreError>;

    /// Loads a submission parent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn load_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>, StoreError>;

    /// Loads every child score of a submission in test key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn load_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError>;

    /// Loads the dirty child scores of a submission in test key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn load_dirty_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError>;

    /// Counts the dirty child scores of a submission.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn count_dirty_scores(&self, id: SubmissionId) -> Result<usize, StoreError>;

    /// Lists submissions that still have dirty children, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_dirty_submissions(&self, limit: usize) -> Result<Vec<SubmissionId>, StoreError>;

    /// Atomically re-checks the dirty flag, appends the score to every ranker,
    /// and clears the flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transaction fails; no partial fold is visible.
    fn fold_dirty_score(
        &self,
        id: SubmissionId,
        test: &TestKey,
        rankers: &[RankerKey],
    ) -> Result<FoldOutcome, StoreError>;

    /// Loads one ranker; absent rankers load empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn load_ranker(&self, key: &RankerKey) -> Result<Ranker, StoreError>;

    /// Loads several rankers in request order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any read fails.
    fn load_rankers(&self, keys: &[RankerKey]) -> Result<Vec<Ranker>, StoreError> {
        keys.iter().map(|key| self.load_ranker(key)).collect()
    }

    /// Loads stored browser level rows by key name; absent rows are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn load_browser_levels(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, Vec<BrowserLabel>>, StoreError>;

    /// Replaces browser level rows by key name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_browser_levels(&self, rows: &BTreeMap<String, Vec<BrowserLabel>>)
    -> Result<(), StoreError>;

    /// Checks that the store is reachable and its schema is current.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is not ready.
    fn readiness(&self) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Cache Backend
// ============================================================================

/// Cache backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Cache backend is unavailable.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    /// Cached value could not be encoded or decoded.
    #[error("cache codec error: {0}")]
    Codec(String),
}

/// Namespaced byte cache without durability guarantees.
pub trait CacheBackend: Send + Sync {
    /// Reads several keys; missing or expired keys are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    fn get_multi(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<BTreeMap<String, Vec<u8>>, CacheError>;

    /// Writes several keys with an optional time-to-live.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    fn set_multi(
        &self,
        namespace: &str,
        entries: BTreeMap<String, Vec<u8>>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Deletes several keys; missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    fn delete_multi(&self, namespace: &str, keys: &[String]) -> Result<(), CacheError>;
}

/// Decodes a cached stats bundle.
///
/// # Errors
///
/// Returns [`CacheError::Codec`] when the bytes are not a valid bundle.
pub fn decode_stats(bytes: &[u8]) -> Result<BrowserStats, CacheError> {
    serde_json::from_slice(bytes).map_err(|err| CacheError::Codec(err.to_string()))
}

/// Encodes a stats bundle for caching.
///
/// # Errors
///
/// Returns [`CacheError::Codec`] when serialization fails.
pub fn encode_stats(stats: &BrowserStats) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(stats).map_err(|err| CacheError::Codec(err.to_string()))
}

// ============================================================================
// SECTION: Work Queue
// ============================================================================

/// Queue receiving reconciliation jobs.
pub const DIRTY_QUEUE: &str = "update-dirty";

/// Queue receiving category update jobs.
pub const CATEGORY_QUEUE: &str = "user-agent-group";

/// Work queue errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The job could not be scheduled.
    #[error("scheduling failure: {0}")]
    SchedulingFailure(String),
}

/// Parameters of a reconciliation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileJob {
    /// Submission to reconcile.
    pub submission_id: SubmissionId,
    /// Submission category.
    pub category: Category,
    /// Submission user agent.
    pub user_agent_key: UserAgentKey,
}

/// Parameters of a category update job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdateJob {
    /// Category to update.
    pub category: Category,
    /// User agent whose labels are indexed and re-cached.
    pub user_agent_key: UserAgentKey,
    /// Params string of the reconciled submission.
    pub params: Option<ParamsString>,
}

/// Background job delivered at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Fold a submission's dirty scores into rankers.
    Reconcile(ReconcileJob),
    /// Index a user agent's labels and refresh its cached stats.
    CategoryUpdate(CategoryUpdateJob),
}

impl Job {
    /// Returns the queue the job is delivered on.
    #[must_use]
    pub const fn queue_name(&self) -> &'static str {
        match self {
            Self::Reconcile(_) => DIRTY_QUEUE,
            Self::CategoryUpdate(_) => CATEGORY_QUEUE,
        }
    }

    /// Returns the job's category.
    #[must_use]
    pub const fn category(&self) -> &Category {
        match self {
            Self::Reconcile(job) => &job.category,
            Self::CategoryUpdate(job) => &job.category,
        }
    }
}

/// At-least-once job queue.
pub trait WorkQueue: Send + Sync {
    /// Enqueues a job on its queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the job cannot be scheduled.
    fn enqueue(&self, job: Job) -> Result<(), QueueError>;
}

// crates/browserscope-core/tests/reconcile.rs
// ============================================================================
// Module: Reconciliation Tests
// Description: Folding dirty scores into rankers and follow-up scheduling.
// Purpose: Ensure every score is counted exactly once in every ranker.
// Dependencies: browserscope-core
// ============================================================================
//! ## Overview
//! Drives [`DirtyReconciler`] and the [`JobRunner`] over in-memory
//! collaborators, with a store wrapper that fails selected folds.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use browserscope_core::BrowserLabel;
use browserscope_core::Category;
use browserscope_core::EntityStore;
use browserscope_core::Environment;
use browserscope_core::FoldOutcome;
use browserscope_core::InMemoryCache;
use browserscope_core::InMemoryEntityStore;
use browserscope_core::InMemoryWorkQueue;
use browserscope_core::Job;
use browserscope_core::JobOutcome;
use browserscope_core::LevelSelector;
use browserscope_core::MemoryEventSink;
use browserscope_core::NewSubmission;
use browserscope_core::PipelineSettings;
use browserscope_core::Ranker;
use browserscope_core::RankerKey;
use browserscope_core::ReconcileOutcome;
use browserscope_core::ReconcilePolicy;
use browserscope_core::ScoreKind;
use browserscope_core::ScoreRecord;
use browserscope_core::StaticTestSet;
use browserscope_core::StatsEvent;
use browserscope_core::StatsPipeline;
use browserscope_core::StoreError;
use browserscope_core::SubmissionId;
use browserscope_core::SubmissionRecord;
use browserscope_core::SubmitRequest;
use browserscope_core::TestDefinition;
use browserscope_core::TestKey;
use browserscope_core::TestSetRegistry;
use browserscope_core::Timestamp;
use browserscope_core::UserAgentInfo;
use browserscope_core::UserAgentKey;
use browserscope_core::VersionLevel;

const FIREFOX_UA: &str = "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US; rv:1.9.0.6) \
                          Gecko/2009011913 Firefox/3.0.6";

fn mock_category() -> Category {
    Category::new("mock")
}

fn mock_registry() -> TestSetRegistry {
    let tests = ["apple", "banana", "coconut"]
        .into_iter()
        .map(|key| TestDefinition {
            key: TestKey::new(key),
            name: key.to_string(),
            kind: ScoreKind::Numeric {
                best: 0,
                worst: 1000,
                unit: String::new(),
            },
            adjustment: None,
        })
        .collect();
    let mut registry = TestSetRegistry::new();
    registry.register(Arc::new(StaticTestSet::new(mock_category(), tests).unwrap()));
    registry
}

fn request(results: &str) -> SubmitRequest {
    SubmitRequest {
        ip_hash: "hashed-ip".to_string(),
        user_agent: FIREFOX_UA.to_string(),
        results: results.to_string(),
        is_import: false,
        params: None,
        js_user_agent: None,
        js_document_mode: None,
        created: Timestamp::Logical(7),
    }
}

fn ranker(test: &str, browser: &str, store: &dyn EntityStore) -> Ranker {
    store
        .load_ranker(&RankerKey::new(
            mock_category(),
            TestKey::new(test),
            BrowserLabel::new(browser),
            None,
        ))
        .unwrap()
}

struct Harness {
    queue: Arc<InMemoryWorkQueue>,
    cache: Arc<InMemoryCache>,
    events: Arc<MemoryEventSink>,
    pipeline: StatsPipeline,
}

fn harness(store: Arc<dyn EntityStore>, policy: ReconcilePolicy) -> Harness {
    let queue = Arc::new(InMemoryWorkQueue::new());
    let events = Arc::new(MemoryEventSink::new());
    let cache = Arc::new(InMemoryCache::new());
    let pipeline = StatsPipeline::new(
        store,
        cache.clone(),
        queue.clone(),
        events.clone(),
        mock_registry(),
        PipelineSettings {
            policy,
            ..PipelineSettings::default()
        },
    );
    Harness {
        queue,
        cache,
        events,
        pipeline,
    }
}

fn test_policy() -> ReconcilePolicy {
    ReconcilePolicy::new(Environment::Test, BTreeSet::new())
}

/// Entity store that fails folds for one test, and dirty counts, a fixed
/// number of times.
struct FlakyStore {
    inner: InMemoryEntityStore,
    failing_test: TestKey,
    failures_left: AtomicUsize,
    count_failures_left: AtomicUsize,
}

fn flaky(inner: &InMemoryEntityStore, test: &str, folds: usize, counts: usize) -> FlakyStore {
    FlakyStore {
        inner: inner.clone(),
        failing_test: TestKey::new(test),
        failures_left: AtomicUsize::new(folds),
        count_failures_left: AtomicUsize::new(counts),
    }
}

fn take_failure(left: &AtomicUsize) -> bool {
    left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1)).is_ok()
}

impl EntityStore for FlakyStore {
    fn upsert_user_agent(&self, info: &UserAgentInfo) -> Result<UserAgentKey, StoreError> {
        self.inner.upsert_user_agent(info)
    }

    fn load_user_agent(&self, key: &UserAgentKey) -> Result<Option<UserAgentInfo>, StoreError> {
        self.inner.load_user_agent(key)
    }

    fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionRecord, StoreError> {
        self.inner.insert_submission(submission)
    }

    fn load_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>, StoreError> {
        self.inner.load_submission(id)
    }

    fn load_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError> {
        self.inner.load_scores(id)
    }

    fn load_dirty_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError> {
        self.inner.load_dirty_scores(id)
    }

    fn count_dirty_scores(&self, id: SubmissionId) -> Result<usize, StoreError> {
        if take_failure(&self.count_failures_left) {
            return Err(StoreError::Io("injected count failure".to_string()));
        }
        self.inner.count_dirty_scores(id)
    }

    fn list_dirty_submissions(&self, limit: usize) -> Result<Vec<SubmissionId>, StoreError> {
        self.inner.list_dirty_submissions(limit)
    }

    fn fold_dirty_score(
        &self,
        id: SubmissionId,
        test: &TestKey,
        rankers: &[RankerKey],
    ) -> Result<FoldOutcome, StoreError> {
        if *test == self.failing_test && take_failure(&self.failures_left) {
            return Err(StoreError::Io("injected fold failure".to_string()));
        }
        self.inner.fold_dirty_score(id, test, rankers)
    }

    fn load_ranker(&self, key: &RankerKey) -> Result<Ranker, StoreError> {
        self.inner.load_ranker(key)
    }

    fn load_browser_levels(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, Vec<BrowserLabel>>, StoreError> {
        self.inner.load_browser_levels(keys)
    }

    fn put_browser_levels(
        &self,
        rows: &BTreeMap<String, Vec<BrowserLabel>>,
    ) -> Result<(), StoreError> {
        self.inner.put_browser_levels(rows)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.inner.readiness()
    }
}

/// Reconciling folds every score into the ranker of every label.
#[test]
fn reconcile_folds_into_every_label() {
    let store = InMemoryEntityStore::new();
    let h = harness(Arc::new(store.clone()), test_policy());
    let record = h.pipeline.submit(&mock_category(), request("apple=1,banana=20")).unwrap();
    let report = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::Completed);
    assert_eq!(report.folded, 2);
    assert!(report.stats_updated);
    assert!(report.category_update_scheduled);
    for browser in ["Firefox", "Firefox 3", "Firefox 3.0", "Firefox 3.0.6"] {
        assert_eq!(ranker("apple", browser, &store).scores(), &[1]);
        assert_eq!(ranker("banana", browser, &store).scores(), &[20]);
    }
    assert_eq!(store.count_dirty_scores(record.id).unwrap(), 0);
}

/// A second reconcile of the same submission leaves rankers unchanged and
/// repeats only the completion step.
#[test]
fn reconcile_is_idempotent() {
    let store = InMemoryEntityStore::new();
    let h = harness(Arc::new(store.clone()), test_policy());
    let record = h.pipeline.submit(&mock_category(), request("apple=5")).unwrap();
    h.pipeline.reconciler().reconcile(record.id).unwrap();
    let before = ranker("apple", "Firefox 3", &store);
    let again = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert_eq!(again.outcome, ReconcileOutcome::AlreadyClean);
    assert_eq!(again.folded, 0);
    assert!(again.category_update_scheduled);
    assert_eq!(ranker("apple", "Firefox 3", &store), before);
}

/// Inactive categories in production clear dirty flags without touching rankers.
#[test]
fn production_gating_skips_inactive_categories() {
    let store = InMemoryEntityStore::new();
    let policy = ReconcilePolicy::new(Environment::Production, BTreeSet::new());
    let h = harness(Arc::new(store.clone()), policy);
    let record = h.pipeline.submit(&mock_category(), request("apple=3")).unwrap();
    let report = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::Completed);
    assert!(!report.stats_updated);
    assert!(!report.category_update_scheduled);
    assert_eq!(ranker("apple", "Firefox", &store).count(), 0);
    assert_eq!(store.count_dirty_scores(record.id).unwrap(), 0);

    let active = ReconcilePolicy::new(Environment::Production, BTreeSet::from([mock_category()]));
    let h = harness(Arc::new(store.clone()), active);
    let record = h.pipeline.submit(&mock_category(), request("apple=4")).unwrap();
    let report = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert!(report.stats_updated);
    assert_eq!(ranker("apple", "Firefox", &store).scores(), &[4]);
}

/// Failed folds leave the score dirty and schedule no category update.
#[test]
fn partial_reconciliation_keeps_failed_scores_dirty() {
    let inner = InMemoryEntityStore::new();
    let store = flaky(&inner, "banana", 1, 0);
    let h = harness(Arc::new(store), test_policy());
    let record = h.pipeline.submit(&mock_category(), request("apple=1,banana=2")).unwrap();
    let report = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::PartialReconciliation);
    assert_eq!(report.folded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].test, TestKey::new("banana"));
    assert_eq!(report.remaining_dirty, 1);
    assert!(!report.category_update_scheduled);
    assert_eq!(ranker("banana", "Firefox", &inner).count(), 0);

    let retry = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert_eq!(retry.outcome, ReconcileOutcome::Completed);
    assert_eq!(retry.folded, 1);
    assert!(retry.category_update_scheduled);
    assert_eq!(ranker("apple", "Firefox", &inner).scores(), &[1]);
    assert_eq!(ranker("banana", "Firefox", &inner).scores(), &[2]);
}

/// Draining retries partial reconciliations and then runs the category update.
#[test]
fn drain_retries_then_updates_category() {
    let inner = InMemoryEntityStore::new();
    let store = flaky(&inner, "coconut", 2, 0);
    let h = harness(Arc::new(store), test_policy());
    h.pipeline.submit(&mock_category(), request("apple=1,coconut=300")).unwrap();
    let report = h.pipeline.runner().drain(&h.queue).unwrap();
    assert_eq!(report.retries, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.completed, 2);
    assert!(matches!(report.outcomes[1], JobOutcome::CategoryUpdated { .. }));
    assert_eq!(ranker("coconut", "Firefox 3.0.6", &inner).scores(), &[300]);
    assert!(h.queue.is_empty());
}

/// Exhausted retries emit a job failure and the sweep recovers the submission.
#[test]
fn exhausted_retries_are_recovered_by_sweep() {
    let inner = InMemoryEntityStore::new();
    let store = flaky(&inner, "apple", 3, 0);
    let h = harness(Arc::new(store), test_policy());
    let record = h.pipeline.submit(&mock_category(), request("apple=9")).unwrap();
    let report = h.pipeline.runner().drain(&h.queue).unwrap();
    assert_eq!(report.failed, 1);
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        StatsEvent::JobFailed { attempts: 3, .. }
    )));
    assert_eq!(inner.list_dirty_submissions(10).unwrap(), vec![record.id]);

    let sweep = h.pipeline.runner().sweep_dirty(10).unwrap();
    assert_eq!(sweep.reconciled.len(), 1);
    assert!(sweep.errors.is_empty());
    assert_eq!(ranker("apple", "Firefox", &inner).scores(), &[9]);
    assert!(inner.list_dirty_submissions(10).unwrap().is_empty());
}

/// Missing submissions are reported, not treated as errors.
#[test]
fn missing_submission_is_reported() {
    let h = harness(Arc::new(InMemoryEntityStore::new()), test_policy());
    let id = SubmissionId::from_raw(42).unwrap();
    let report = h.pipeline.reconciler().reconcile(id).unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::Missing);
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        StatsEvent::ReconcileSkipped { submission_id: 42, .. }
    )));
}

/// Completion schedules a category update on the user-agent-group queue.
#[test]
fn completion_enqueues_category_update() {
    let h = harness(Arc::new(InMemoryEntityStore::new()), test_policy());
    let record = h.pipeline.submit(&mock_category(), request("apple=1")).unwrap();
    assert_eq!(h.queue.pop().unwrap().unwrap().queue_name(), "update-dirty");
    h.pipeline.reconciler().reconcile(record.id).unwrap();
    let pending = h.queue.pending();
    assert_eq!(pending.len(), 1);
    match &pending[0] {
        Job::CategoryUpdate(job) => {
            assert_eq!(job.category, mock_category());
            assert_eq!(job.user_agent_key, record.user_agent_key);
            assert_eq!(job.params, None);
        }
        other => panic!("unexpected job: {other:?}"),
    }
    assert_eq!(pending[0].queue_name(), "user-agent-group");
}

/// Imported submissions are stored clean and reconcile as already clean.
#[test]
fn imports_reconcile_as_already_clean() {
    let store = InMemoryEntityStore::new();
    let h = harness(Arc::new(store.clone()), test_policy());
    let mut req = request("apple=1");
    req.is_import = true;
    let record = h.pipeline.submit(&mock_category(), req).unwrap();
    let report = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::AlreadyClean);
    assert!(!report.category_update_scheduled);
    assert_eq!(ranker("apple", "Firefox", &store).count(), 0);
}

/// A completion lost after every fold committed is finished by the retry.
#[test]
fn failed_completion_check_is_finished_on_retry() {
    let inner = InMemoryEntityStore::new();
    let h = harness(Arc::new(flaky(&inner, "apple", 0, 1)), test_policy());
    h.pipeline.submit(&mock_category(), request("apple=1,coconut=300")).unwrap();
    let report = h.pipeline.runner().drain(&h.queue).unwrap();
    assert_eq!(report.retries, 1);
    assert_eq!(report.failed, 0);
    let JobOutcome::Reconciled {
        report: reconciled,
    } = &report.outcomes[0]
    else {
        panic!("expected reconcile outcome");
    };
    assert_eq!(reconciled.outcome, ReconcileOutcome::AlreadyClean);
    assert!(reconciled.category_update_scheduled);
    assert!(matches!(report.outcomes[1], JobOutcome::CategoryUpdated { .. }));

    assert_eq!(ranker("coconut", "Firefox 3.0.6", &inner).scores(), &[300]);
    let family = h
        .pipeline
        .index()
        .browsers(&mock_category(), LevelSelector::Level(VersionLevel::Family))
        .unwrap();
    assert_eq!(family, vec![BrowserLabel::new("Firefox")]);
}

/// Invalidation failures are reported without failing the pass.
#[test]
fn invalidation_failure_is_reported() {
    let h = harness(Arc::new(InMemoryEntityStore::new()), test_policy());
    let record = h.pipeline.submit(&mock_category(), request("apple=1")).unwrap();
    h.cache.set_online(false);
    let report = h.pipeline.reconciler().reconcile(record.id).unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::Completed);
    assert!(report.category_update_scheduled);
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        StatsEvent::CacheInvalidationFailed { namespace, .. } if namespace == "category_stats__mock"
    )));
}

/// Concurrent deliveries of one reconcile job fold each score exactly once.
#[test]
fn concurrent_deliveries_fold_once() {
    let store = InMemoryEntityStore::new();
    let h = Arc::new(harness(Arc::new(store.clone()), test_policy()));
    let record =
        h.pipeline.submit(&mock_category(), request("apple=1,banana=2,coconut=3")).unwrap();
    let handles: Vec<_> = (0 .. 8)
        .map(|_| {
            let h = Arc::clone(&h);
            thread::spawn(move || h.pipeline.reconciler().reconcile(record.id).unwrap())
        })
        .collect();
    let reports: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert_eq!(reports.iter().map(|report| report.folded).sum::<usize>(), 3);
    assert!(reports.iter().all(|report| report.remaining_dirty == 0));
    assert!(reports.iter().all(|report| report.failures.is_empty()));
    for browser in ["Firefox", "Firefox 3.0.6"] {
        assert_eq!(ranker("apple", browser, &store).scores(), &[1]);
        assert_eq!(ranker("banana", browser, &store).scores(), &[2]);
        assert_eq!(ranker("coconut", browser, &store).scores(), &[3]);
    }
    assert_eq!(store.count_dirty_scores(record.id).unwrap(), 0);
}

// crates/browserscope-core/tests/end_to_end.rs
// ============================================================================
// Module: Pipeline End-to-End Tests
// Description: Submission through reconciliation to category stats.
// Purpose: Ensure the wired pipeline produces coherent stats tables.
// Dependencies: browserscope-core, serde_json, tempfile
// ============================================================================
//! ## Overview
//! Runs the [`StatsPipeline`] over in-memory collaborators: submissions from
//! several browsers are drained through the queues and read back per level,
//! with the dirty sweep covering lost scheduling and a file sink capturing
//! telemetry.

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

use std::collections::BTreeSet;
use std::sync::Arc;

use browserscope_core::BrowserLabel;
use browserscope_core::Category;
use browserscope_core::Environment;
use browserscope_core::EventSink;
use browserscope_core::FileEventSink;
use browserscope_core::InMemoryCache;
use browserscope_core::InMemoryEntityStore;
use browserscope_core::InMemoryWorkQueue;
use browserscope_core::LevelSelector;
use browserscope_core::MemoryEventSink;
use browserscope_core::PipelineSettings;
use browserscope_core::ReconcilePolicy;
use browserscope_core::ScoreKind;
use browserscope_core::StaticTestSet;
use browserscope_core::StatsError;
use browserscope_core::StatsEvent;
use browserscope_core::StatsPipeline;
use browserscope_core::SubmitRequest;
use browserscope_core::TOP_BROWSERS;
use browserscope_core::TestDefinition;
use browserscope_core::TestKey;
use browserscope_core::TestSetRegistry;
use browserscope_core::Timestamp;
use browserscope_core::VersionLevel;

const FIREFOX_30_UA: &str = "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US; rv:1.9.0.6) \
                             Gecko/2009011913 Firefox/3.0.6";
const FIREFOX_35_UA: &str = "Mozilla/5.0 (Windows; U; Windows NT 6.1; en-US; rv:1.9.1.5) \
                             Gecko/20091102 Firefox/3.5.1";
const CHROME_UA: &str = "Mozilla/5.0 (Windows; U; Windows NT 6.1; en-US) AppleWebKit/532.5 \
                         (KHTML, like Gecko) Chrome/4.0.249.78 Safari/532.5";

fn mock_category() -> Category {
    Category::new("mock")
}

fn mock_registry() -> TestSetRegistry {
    let tests = vec![
        TestDefinition {
            key: TestKey::new("apple"),
            name: "Apple".to_string(),
            kind: ScoreKind::Boolean,
            adjustment: None,
        },
        TestDefinition {
            key: TestKey::new("coconut"),
            name: "Coconut".to_string(),
            kind: ScoreKind::Numeric {
                best: 0,
                worst: 1000,
                unit: "ms".to_string(),
            },
            adjustment: None,
        },
    ];
    let mut registry = TestSetRegistry::new();
    registry.register(Arc::new(StaticTestSet::new(mock_category(), tests).unwrap()));
    registry
}

fn request(user_agent: &str, apple: i64, coconut: i64) -> SubmitRequest {
    SubmitRequest {
        ip_hash: "hashed-ip".to_string(),
        user_agent: user_agent.to_string(),
        results: format!("apple={apple},coconut={coconut}"),
        is_import: false,
        params: None,
        js_user_agent: None,
        js_document_mode: None,
        created: Timestamp::Logical(11),
    }
}

fn pipeline(events: Arc<dyn EventSink>) -> (StatsPipeline, Arc<InMemoryWorkQueue>) {
    let queue = Arc::new(InMemoryWorkQueue::new());
    let pipeline = StatsPipeline::new(
        Arc::new(InMemoryEntityStore::new()),
        Arc::new(InMemoryCache::new()),
        queue.clone(),
        events,
        mock_registry(),
        PipelineSettings {
            policy: ReconcilePolicy::new(
                Environment::Production,
                BTreeSet::from([mock_category()]),
            ),
            ..PipelineSettings::default()
        },
    );
    (pipeline, queue)
}

fn names(labels: Vec<&BrowserLabel>) -> Vec<&str> {
    labels.into_iter().map(BrowserLabel::as_str).collect()
}

/// Submissions from several browsers surface at every level after draining.
#[test]
fn submissions_surface_in_category_stats() {
    let (pipeline, queue) = pipeline(Arc::new(MemoryEventSink::new()));
    let category = mock_category();
    for (ua, apple, coconut) in [
        (FIREFOX_30_UA, 0, 500),
        (FIREFOX_30_UA, 1, 200),
        (FIREFOX_30_UA, 0, 300),
        (FIREFOX_35_UA, 1, 100),
        (CHROME_UA, 1, 50),
    ] {
        pipeline.submit(&category, request(ua, apple, coconut)).unwrap();
    }
    let report = pipeline.runner().drain(&queue).unwrap();
    assert_eq!(report.completed, 10);
    assert_eq!(report.failed, 0);

    let family = pipeline
        .category_stats(&category, LevelSelector::Level(VersionLevel::Family), None)
        .unwrap();
    assert_eq!(names(family.browsers()), vec!["Chrome", "Firefox"]);
    let firefox = family.get(&BrowserLabel::new("Firefox")).unwrap();
    assert_eq!(firefox.total_runs, 4);
    assert_eq!(firefox.test(&TestKey::new("coconut")).unwrap().median, Some(300));

    let full = pipeline
        .category_stats(&category, LevelSelector::Level(VersionLevel::Full), None)
        .unwrap();
    assert_eq!(names(full.browsers()), vec!["Chrome 4.0.249", "Firefox 3.0.6", "Firefox 3.5.1"]);
    let firefox_30 = full.get(&BrowserLabel::new("Firefox 3.0.6")).unwrap();
    assert_eq!(firefox_30.total_runs, 3);
    assert_eq!(firefox_30.test(&TestKey::new("coconut")).unwrap().median, Some(300));
    assert_eq!(firefox_30.test(&TestKey::new("apple")).unwrap().display, "no");

    let top = pipeline.category_stats(&category, LevelSelector::Top, None).unwrap();
    assert_eq!(top.len(), TOP_BROWSERS.len());
    assert_eq!(top.get(&BrowserLabel::new("Chrome 4")).unwrap().total_runs, 1);
    assert_eq!(top.get(&BrowserLabel::new("Firefox 3.5")).unwrap().total_runs, 1);
    assert_eq!(top.get(&BrowserLabel::new("IE 8")).unwrap().total_runs, 0);
}

/// Inactive production categories accept submissions but aggregate nothing.
#[test]
fn inactive_category_is_not_aggregated() {
    let events = Arc::new(MemoryEventSink::new());
    let queue = Arc::new(InMemoryWorkQueue::new());
    let registry = mock_registry();
    let pipeline = StatsPipeline::new(
        Arc::new(InMemoryEntityStore::new()),
        Arc::new(InMemoryCache::new()),
        queue.clone(),
        events.clone(),
        registry,
        PipelineSettings::default(),
    );
    let category = mock_category();
    pipeline.submit(&category, request(FIREFOX_30_UA, 1, 100)).unwrap();
    let report = pipeline.runner().drain(&queue).unwrap();
    assert_eq!(report.completed, 1);
    let family = pipeline
        .category_stats(&category, LevelSelector::Level(VersionLevel::Family), None)
        .unwrap();
    assert!(family.is_empty());
}

/// Unregistered categories are rejected on both paths.
#[test]
fn unknown_category_is_rejected() {
    let (pipeline, _queue) = pipeline(Arc::new(MemoryEventSink::new()));
    let unknown = Category::new("unknown");
    assert!(pipeline.submit(&unknown, request(FIREFOX_30_UA, 1, 1)).is_err());
    let err = pipeline.category_stats(&unknown, LevelSelector::Top, None).unwrap_err();
    assert!(matches!(err, StatsError::UnknownCategory(_)));
}

/// The dirty sweep reconciles submissions whose scheduling was lost.
#[test]
fn sweep_recovers_lost_scheduling() {
    let events = Arc::new(MemoryEventSink::new());
    let (pipeline, queue) = pipeline(events.clone());
    let category = mock_category();
    queue.set_online(false);
    let record = pipeline.submit(&category, request(CHROME_UA, 1, 75)).unwrap();
    assert!(queue.is_empty());
    queue.set_online(true);

    let sweep = pipeline.runner().sweep_dirty(pipeline.settings().sweep_batch_size).unwrap();
    assert_eq!(sweep.reconciled.len(), 1);
    assert_eq!(sweep.reconciled[0].submission_id, record.id);
    assert!(sweep.reconciled[0].category_update_scheduled);
    pipeline.runner().drain(&queue).unwrap();

    let major = pipeline
        .category_stats(&category, LevelSelector::Level(VersionLevel::Major), None)
        .unwrap();
    assert_eq!(names(major.browsers()), vec!["Chrome 4"]);
    assert_eq!(major.get(&BrowserLabel::new("Chrome 4")).unwrap().total_runs, 1);
    let events = events.events();
    assert!(events.iter().any(|event| matches!(event, StatsEvent::SchedulingFailed { .. })));
}

/// The file sink appends one JSON object per event.
#[test]
fn file_sink_writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let sink = Arc::new(FileEventSink::new(&path).unwrap());
    let (pipeline, queue) = pipeline(sink);
    pipeline.submit(&mock_category(), request(FIREFOX_30_UA, 1, 100)).unwrap();
    pipeline.runner().drain(&queue).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert!(!lines.is_empty());
    assert_eq!(lines[0]["event"], "submission_accepted");
    assert_eq!(lines[0]["level"], "info");
    assert_eq!(lines[0]["submission_id"], 1);
    assert!(lines.iter().all(|line| line["timestamp_ms"].is_u64()));
    assert!(lines.iter().any(|line| line["event"] == "reconcile_completed"));
}

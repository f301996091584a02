// crates/browserscope-core/tests/browser_index.rs
// ============================================================================
// Module: Browser Index Tests
// Description: Sorted per-level browser rows and their cache layer.
// Purpose: Ensure rows stay sorted, unique, and durable across cache loss.
// Dependencies: browserscope-core, proptest
// ============================================================================
//! ## Overview
//! Covers the row helpers, incremental indexing of user agents, selector
//! lookups, and case-insensitive ordering under arbitrary insert sequences.

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

use std::str::FromStr;
use std::sync::Arc;

use browserscope_core::BROWSER_LEVELS_NAMESPACE;
use browserscope_core::BrowserLabel;
use browserscope_core::BrowserVersionIndex;
use browserscope_core::CacheBackend;
use browserscope_core::Category;
use browserscope_core::EntityStore;
use browserscope_core::InMemoryCache;
use browserscope_core::InMemoryEntityStore;
use browserscope_core::LevelSelector;
use browserscope_core::MemoryEventSink;
use browserscope_core::StatsEvent;
use browserscope_core::TOP_BROWSERS;
use browserscope_core::UserAgentInfo;
use browserscope_core::VersionLevel;
use browserscope_core::insort_browser;
use browserscope_core::key_name;
use browserscope_core::sort_browsers;
use browserscope_core::top_browsers;
use proptest::prelude::*;

fn firefox(version: &str) -> UserAgentInfo {
    let raw = format!(
        "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US; rv:1.9.0.6) Gecko/2009011913 \
         Firefox/{version}"
    );
    UserAgentInfo::parse(&raw, None, None)
}

fn labels(values: &[&str]) -> Vec<BrowserLabel> {
    values.iter().map(|value| BrowserLabel::new(*value)).collect()
}

fn names(row: &[BrowserLabel]) -> Vec<&str> {
    row.iter().map(BrowserLabel::as_str).collect()
}

struct Harness {
    store: InMemoryEntityStore,
    cache: Arc<InMemoryCache>,
    events: Arc<MemoryEventSink>,
    index: BrowserVersionIndex,
}

fn harness() -> Harness {
    let store = InMemoryEntityStore::new();
    let cache = Arc::new(InMemoryCache::new());
    let events = Arc::new(MemoryEventSink::new());
    let index = BrowserVersionIndex::new(Arc::new(store.clone()), cache.clone(), events.clone());
    Harness {
        store,
        cache,
        events,
        index,
    }
}

/// Row keys join the category and level index.
#[test]
fn key_name_joins_category_and_level() {
    assert_eq!(key_name(&Category::new("network"), VersionLevel::Family), "network_0");
    assert_eq!(key_name(&Category::new("network"), VersionLevel::Full), "network_3");
}

/// Inserts keep the row sorted and skip case-insensitive duplicates.
#[test]
fn insort_keeps_order_and_skips_duplicates() {
    let mut row = labels(&["Chrome", "Safari"]);
    assert!(insort_browser(&mut row, BrowserLabel::new("Firefox")));
    assert!(insort_browser(&mut row, BrowserLabel::new("android")));
    assert!(!insort_browser(&mut row, BrowserLabel::new("firefox")));
    assert_eq!(names(&row), vec!["android", "Chrome", "Firefox", "Safari"]);
}

/// Sorting is case-insensitive and keeps the first spelling seen.
#[test]
fn sort_browsers_is_case_insensitive() {
    let sorted = sort_browsers(labels(&["firefox 3", "Chrome 4", "Firefox 3", "IE 8"]));
    assert_eq!(names(&sorted), vec!["Chrome 4", "firefox 3", "IE 8"]);
}

/// The top selector returns the fixed list without touching rows.
#[test]
fn top_selector_returns_fixed_list() {
    let h = harness();
    let category = Category::new("network");
    let top = h.index.browsers(&category, LevelSelector::from_str("top").unwrap()).unwrap();
    assert_eq!(top, top_browsers());
    assert_eq!(top.len(), TOP_BROWSERS.len());
    assert_eq!(top[0].as_str(), "Chrome 3");
    assert_eq!(top[12].as_str(), "Safari 4.0");
    let family_key = key_name(&category, VersionLevel::Family);
    assert!(h.store.load_browser_levels(&[family_key]).unwrap().is_empty());
}

/// Indexing reports only the levels whose rows changed.
#[test]
fn add_user_agent_reports_changed_levels() {
    let h = harness();
    let category = Category::new("network");
    let changed = h.index.add_user_agent(&category, &firefox("3.0.6")).unwrap();
    assert_eq!(changed, VersionLevel::ALL.to_vec());
    assert!(h.index.add_user_agent(&category, &firefox("3.0.6")).unwrap().is_empty());
    let changed = h.index.add_user_agent(&category, &firefox("3.0.7")).unwrap();
    assert_eq!(changed, vec![VersionLevel::Full]);
    let changed = h.index.add_user_agent(&category, &firefox("3.5.1")).unwrap();
    assert_eq!(changed, vec![VersionLevel::Minor, VersionLevel::Full]);

    let full = h.index.browsers(&category, LevelSelector::Level(VersionLevel::Full)).unwrap();
    assert_eq!(names(&full), vec!["Firefox 3.0.6", "Firefox 3.0.7", "Firefox 3.5.1"]);
    let family = h.index.browsers(&category, LevelSelector::Level(VersionLevel::Family)).unwrap();
    assert_eq!(names(&family), vec!["Firefox"]);
    let updates = h
        .events
        .events()
        .into_iter()
        .filter(|event| matches!(event, StatsEvent::BrowserIndexUpdated { .. }))
        .count();
    assert_eq!(updates, 3);
}

/// Rows survive cache loss and unavailability.
#[test]
fn rows_are_served_from_store_without_cache() {
    let h = harness();
    let category = Category::new("network");
    h.index.add_user_agent(&category, &firefox("3.0.6")).unwrap();
    let major_key = key_name(&category, VersionLevel::Major);
    h.cache.delete_multi(BROWSER_LEVELS_NAMESPACE, &[major_key]).unwrap();
    let major = h.index.browsers(&category, LevelSelector::Level(VersionLevel::Major)).unwrap();
    assert_eq!(names(&major), vec!["Firefox 3"]);

    h.cache.set_online(false);
    let changed = h.index.add_user_agent(&category, &firefox("3.5.1")).unwrap();
    assert_eq!(changed, vec![VersionLevel::Minor, VersionLevel::Full]);
    let minor = h.index.browsers(&category, LevelSelector::Level(VersionLevel::Minor)).unwrap();
    assert_eq!(names(&minor), vec!["Firefox 3.0", "Firefox 3.5"]);
    let events = h.events.events();
    assert!(events.iter().any(|event| matches!(event, StatsEvent::CacheFallback { .. })));
}

/// Replacing a row sorts and deduplicates it, and a stale cache copy can be dropped.
#[test]
fn set_browsers_replaces_row() {
    let h = harness();
    let category = Category::new("network");
    let stored = h
        .index
        .set_browsers(&category, VersionLevel::Major, labels(&["Safari 4", "chrome 4", "Chrome 4"]))
        .unwrap();
    assert_eq!(names(&stored), vec!["chrome 4", "Safari 4"]);
    h.index.delete_cached(&category, VersionLevel::Major).unwrap();
    let major = h.index.browsers(&category, LevelSelector::Level(VersionLevel::Major)).unwrap();
    assert_eq!(major, stored);
}

/// Unknown levels read as empty rows.
#[test]
fn absent_rows_are_empty() {
    let h = harness();
    let row = h
        .index
        .browsers(&Category::new("unused"), LevelSelector::Level(VersionLevel::Minor))
        .unwrap();
    assert!(row.is_empty());
}

proptest! {
    /// Rows stay strictly ascending and case-insensitively unique under any insert order.
    #[test]
    fn rows_stay_sorted_and_unique(values in prop::collection::vec("[A-Ca-c]{1,3}", 0 .. 40)) {
        let mut row = Vec::new();
        for value in &values {
            insort_browser(&mut row, BrowserLabel::new(value.as_str()));
        }
        for pair in row.windows(2) {
            prop_assert!(pair[0].sort_key() < pair[1].sort_key());
        }
        for value in &values {
            let key = value.to_lowercase();
            prop_assert_eq!(row.iter().filter(|label| label.sort_key() == key).count(), 1);
        }
        prop_assert_eq!(sort_browsers(row.clone()), row);
    }
}

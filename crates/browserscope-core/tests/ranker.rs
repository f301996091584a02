// crates/browserscope-core/tests/ranker.rs
// ============================================================================
// Module: Ranker Tests
// Description: Median semantics and key identity for rankers.
// Purpose: Ensure medians follow the upper-middle rule and stay fresh.
// Dependencies: browserscope-core, proptest
// ============================================================================
//! ## Overview
//! Validates ranker medians against a classical reference and checks that
//! storage keys distinguish every part of the ranker identity.

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

use browserscope_core::BrowserLabel;
use browserscope_core::Category;
use browserscope_core::ParamsString;
use browserscope_core::Ranker;
use browserscope_core::RankerKey;
use browserscope_core::TestKey;
use proptest::prelude::*;

fn key(params: Option<&str>) -> RankerKey {
    RankerKey::new(
        Category::new("network"),
        TestKey::new("latency"),
        BrowserLabel::new("Firefox 3.5"),
        params.map(|value| ParamsString::new(value).unwrap()),
    )
}

fn ranker_with(scores: &[i64]) -> Ranker {
    Ranker::from_scores(key(None), scores.to_vec())
}

/// Empty rankers have no median.
#[test]
fn empty_ranker_has_no_median() {
    let ranker = Ranker::new(key(None));
    assert_eq!(ranker.count(), 0);
    assert_eq!(ranker.median(), None);
}

/// Odd counts return the middle element of the sorted scores.
#[test]
fn odd_count_returns_middle() {
    assert_eq!(ranker_with(&[500, 200, 300]).median(), Some(300));
    assert_eq!(ranker_with(&[0, 1, 0, 1, 0]).median(), Some(0));
}

/// Even counts return the upper middle element.
#[test]
fn even_count_returns_upper_middle() {
    assert_eq!(ranker_with(&[4, 1, 3, 2]).median(), Some(3));
    assert_eq!(ranker_with(&[7, 9]).median(), Some(9));
}

/// Medians reflect scores appended after an earlier read.
#[test]
fn median_is_recomputed_after_add() {
    let mut ranker = ranker_with(&[10, 20, 30]);
    assert_eq!(ranker.median(), Some(20));
    ranker.add(40);
    ranker.add(50);
    assert_eq!(ranker.median(), Some(30));
    assert_eq!(ranker.scores(), &[10, 20, 30, 40, 50]);
}

/// Storage keys differ when only the params string differs.
#[test]
fn storage_key_distinguishes_params() {
    let plain = key(None).storage_key();
    let with_params = key(Some("mode=fast")).storage_key();
    assert_ne!(plain, with_params);
    assert!(with_params.ends_with("mode=fast"));
}

proptest! {
    /// Medians match a sort-and-index reference for arbitrary samples.
    #[test]
    fn median_matches_reference(
        scores in prop::collection::vec(-1_000_000i64 .. 1_000_000, 1 .. 64)
    ) {
        let mut reference = scores.clone();
        reference.sort_unstable();
        let expected = reference[reference.len() / 2];
        let ranker = ranker_with(&scores);
        prop_assert_eq!(ranker.median(), Some(expected));
        let below = scores.iter().filter(|score| **score < expected).count();
        let above = scores.iter().filter(|score| **score > expected).count();
        prop_assert!(below <= scores.len() / 2);
        prop_assert!(above <= scores.len() / 2);
    }
}

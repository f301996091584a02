// crates/browserscope-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and command execution.
// Purpose: Ensure commands wire the pipeline from config and persist results.
// Dependencies: browserscope-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Runs the command functions against a temporary `SQLite` store so each
//! command opens a fresh pipeline, the same way separate CLI invocations do.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use browserscope_core::BrowserLabel;
use browserscope_core::LevelSelector;
use browserscope_core::TestKey;
use browserscope_core::VersionLevel;
use clap::Parser;
use tempfile::TempDir;

use super::BrowserscopeConfig;
use super::BrowsersCommand;
use super::Cli;
use super::Commands;
use super::StatsCommand;
use super::SubmitCommand;
use super::SweepCommand;
use super::command_browsers;
use super::command_config_check;
use super::command_stats;
use super::command_submit;
use super::command_sweep;
use super::parse_level;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const FIREFOX_UA: &str = "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US; rv:1.9.0.6) \
                          Gecko/2009011913 Firefox/3.0.6";

fn sqlite_config(dir: &Path) -> BrowserscopeConfig {
    let path = dir.join("browserscope.sqlite");
    let content = format!(
        r#"
[reconcile]
active_categories = ["network"]

[store]
type = "sqlite"
path = '{}'

[telemetry]
sink = "none"

[[test_sets]]
category = "network"

[[test_sets.tests]]
key = "latency"
name = "Latency"
kind = {{ type = "numeric", best = 0, worst = 1000, unit = "ms" }}
"#,
        path.display()
    );
    BrowserscopeConfig::from_toml_str(&content).unwrap()
}

fn submit(category: &str, latency: i64) -> SubmitCommand {
    SubmitCommand {
        category: category.to_string(),
        user_agent: FIREFOX_UA.to_string(),
        results: format!("latency={latency}"),
        ip: "10.0.0.1".to_string(),
        params: None,
        is_import: false,
        js_user_agent: None,
        js_document_mode: None,
        created_ms: Some(1_700_000_000_000),
    }
}

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn parse_level_accepts_top_and_indices() {
    assert_eq!(parse_level("top").unwrap(), LevelSelector::Top);
    assert_eq!(parse_level("2").unwrap(), LevelSelector::Level(VersionLevel::Minor));
    assert!(parse_level("7").is_err());
    assert!(parse_level("family").is_err());
}

#[test]
fn cli_parses_submit_arguments() {
    let cli = Cli::try_parse_from([
        "browserscope",
        "--config",
        "custom.toml",
        "submit",
        "--category",
        "network",
        "--user-agent",
        FIREFOX_UA,
        "--results",
        "latency=100",
        "--import",
    ])
    .unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("custom.toml")));
    let Commands::Submit(command) = cli.command else {
        panic!("expected submit command");
    };
    assert!(command.is_import);
    assert_eq!(command.ip, "127.0.0.1");
    assert!(command.created_ms.is_none());
}

#[test]
fn cli_rejects_invalid_level() {
    let result = Cli::try_parse_from([
        "browserscope",
        "stats",
        "--category",
        "network",
        "--level",
        "9",
    ]);
    assert!(result.is_err());
}

// ============================================================================
// SECTION: Commands
// ============================================================================

#[test]
fn submissions_persist_across_invocations() {
    let temp = TempDir::new().unwrap();
    let config = sqlite_config(temp.path());
    for (index, latency) in [120, 80, 100].into_iter().enumerate() {
        let output = command_submit(&config, submit("network", latency)).unwrap();
        assert_eq!(output.submission_id.get(), u64::try_from(index).unwrap() + 1);
        assert_eq!(output.browser.as_str(), "Firefox 3.0.6");
        assert_eq!(output.scores, 1);
        assert_eq!(output.created_ms, Some(1_700_000_000_000));
        assert_eq!(output.drain.failed, 0);
    }

    let stats = command_stats(&config, &StatsCommand {
        category: "network".to_string(),
        level: LevelSelector::Level(VersionLevel::Minor),
        params: None,
    })
    .unwrap();
    let firefox = stats.get(&BrowserLabel::new("Firefox 3.0")).unwrap();
    assert_eq!(firefox.total_runs, 3);
    assert_eq!(firefox.test(&TestKey::new("latency")).unwrap().median, Some(100));

    let browsers = command_browsers(&config, &BrowsersCommand {
        category: "network".to_string(),
        level: LevelSelector::Level(VersionLevel::Family),
    })
    .unwrap();
    assert_eq!(browsers.browsers, vec![BrowserLabel::new("Firefox")]);
    assert_eq!(browsers.level, LevelSelector::Level(VersionLevel::Family).to_string());
}

#[test]
fn sweep_without_dirty_submissions_is_empty() {
    let temp = TempDir::new().unwrap();
    let config = sqlite_config(temp.path());
    command_submit(&config, submit("network", 50)).unwrap();
    let output = command_sweep(&config, &SweepCommand {
        limit: None,
    })
    .unwrap();
    assert_eq!(output.reconciled, 0);
    assert!(output.errors.is_empty());
    assert_eq!(output.drain.completed, 0);
}

#[test]
fn submit_rejects_unknown_category() {
    let temp = TempDir::new().unwrap();
    let config = sqlite_config(temp.path());
    let Err(err) = command_submit(&config, submit("layout", 50)) else {
        panic!("expected unknown category to fail");
    };
    assert!(err.to_string().contains("submission rejected"));
}

#[test]
fn stats_rejects_invalid_params() {
    let temp = TempDir::new().unwrap();
    let config = sqlite_config(temp.path());
    let Err(err) = command_stats(&config, &StatsCommand {
        category: "network".to_string(),
        level: LevelSelector::Top,
        params: Some("None".to_string()),
    }) else {
        panic!("expected invalid params to fail");
    };
    assert!(err.to_string().contains("invalid params"));
}

#[test]
fn config_check_lists_categories() {
    let temp = TempDir::new().unwrap();
    let output = command_config_check(&sqlite_config(temp.path()));
    assert_eq!(output.status, "ok");
    assert_eq!(output.categories, vec!["network".to_string()]);
}

// crates/browserscope-core/tests/user_agent.rs
// ============================================================================
// Module: User Agent Tests
// Description: Label resolution and dedupe keys for user agents.
// Purpose: Ensure browsers map onto stable hierarchical labels.
// Dependencies: browserscope-core
// ============================================================================
//! ## Overview
//! Covers the common browser families, embedded Chrome Frame, IE document
//! modes, and the canonical-string dedupe key.

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
use browserscope_core::OTHER_FAMILY;
use browserscope_core::UserAgentInfo;
use browserscope_core::VersionLevel;

const FIREFOX_UA: &str = "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US; rv:1.9.0.6) \
                          Gecko/2009011913 Firefox/3.0.6";
const CHROME_UA: &str = "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US) AppleWebKit/530.1 \
                         (KHTML, like Gecko) Chrome/2.0.169.1 Safari/530.1";
const IE_FRAME_UA: &str = "Mozilla/4.0 (compatible; MSIE 6.0; Windows NT 6.0; Trident/4.0; \
                           chromeframe; SLCC1; .NET CLR 2.0.5077; 3.0.30729)";
const SAFARI_UA: &str = "Mozilla/5.0 (Macintosh; U; Intel Mac OS X 10_5_7; en-us) \
                         AppleWebKit/530.17 (KHTML, like Gecko) Version/4.0 Safari/530.17";
const IE8_UA: &str = "Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1; Trident/4.0)";

fn labels(info: &UserAgentInfo) -> Vec<String> {
    info.string_list().iter().map(BrowserLabel::to_string).collect()
}

/// Firefox resolves to four levels coarsest to finest.
#[test]
fn firefox_lists_every_level() {
    let info = UserAgentInfo::parse(FIREFOX_UA, None, None);
    assert_eq!(labels(&info), vec!["Firefox", "Firefox 3", "Firefox 3.0", "Firefox 3.0.6"]);
    assert_eq!(info.pretty().as_str(), "Firefox 3.0.6");
}

/// Only the levels present in the version are listed.
#[test]
fn safari_lists_present_levels_only() {
    let info = UserAgentInfo::parse(SAFARI_UA, None, None);
    assert_eq!(labels(&info), vec!["Safari", "Safari 4", "Safari 4.0"]);
    assert_eq!(info.label_at(VersionLevel::Full).as_str(), "Safari 4.0");
    assert_eq!(info.label_at(VersionLevel::Family).as_str(), "Safari");
}

/// Chrome is detected ahead of the Safari token it carries.
#[test]
fn chrome_wins_over_safari_token() {
    let info = UserAgentInfo::parse(CHROME_UA, None, None);
    assert_eq!(info.family, "Chrome");
    assert_eq!(info.pretty().as_str(), "Chrome 2.0.169");
}

/// Chrome Frame inside IE takes its version from the JavaScript user agent.
#[test]
fn chrome_frame_uses_js_user_agent() {
    let info = UserAgentInfo::parse(IE_FRAME_UA, Some(CHROME_UA), None);
    assert_eq!(info.family, "Chrome Frame (IE 6)");
    assert_eq!(info.pretty().as_str(), "Chrome Frame (IE 6) 2.0.169");
    assert_eq!(info.js_user_agent_string.as_deref(), Some(CHROME_UA));
}

/// Without the JavaScript user agent the frame host is reported as IE.
#[test]
fn chrome_frame_without_js_is_ie() {
    let info = UserAgentInfo::parse(IE_FRAME_UA, None, None);
    assert_eq!(labels(&info), vec!["IE", "IE 6", "IE 6.0"]);
}

/// An IE document mode overrides the reported version.
#[test]
fn document_mode_overrides_ie_version() {
    let info = UserAgentInfo::parse(IE8_UA, None, Some("7"));
    assert_eq!(labels(&info), vec!["IE", "IE 7", "IE 7.0"]);
}

/// Unknown agents resolve to a single family label.
#[test]
fn unknown_agent_is_other() {
    let info = UserAgentInfo::parse("curl/7.64.1", None, None);
    assert_eq!(labels(&info), vec![OTHER_FAMILY]);
    assert_eq!(info.label_at(VersionLevel::Minor).as_str(), OTHER_FAMILY);
}

/// The dedupe key depends on every input string and nothing else.
#[test]
fn key_is_stable_and_input_sensitive() {
    let first = UserAgentInfo::parse(IE_FRAME_UA, Some(CHROME_UA), None);
    let second = UserAgentInfo::parse(IE_FRAME_UA, Some(CHROME_UA), None);
    let without_js = UserAgentInfo::parse(IE_FRAME_UA, None, None);
    let with_mode = UserAgentInfo::parse(IE_FRAME_UA, Some(CHROME_UA), Some("8"));
    assert_eq!(first.key(), second.key());
    assert_ne!(first.key(), without_js.key());
    assert_ne!(first.key(), with_mode.key());
    assert_eq!(first.key().as_str().len(), 64);
    assert_eq!(first.canonical_string(), format!("{IE_FRAME_UA}|{CHROME_UA}|"));
}

// crates/browserscope-core/src/core/user_agent.rs
// ============================================================================
// Module: Browserscope User Agents
// Description: User-agent resolution into hierarchical browser labels.
// Purpose: Map raw user-agent strings onto family/major/minor/full labels.
// Dependencies: crate::core::{hashing, identifiers}, serde
// ============================================================================

//! ## Overview
//! A [`UserAgentInfo`] is resolved from the HTTP user-agent string plus two
//! optional client-side hints: the JavaScript-reported user agent (used to
//! detect embedded Chrome Frame) and the IE document mode. Resolution is
//! deterministic, so identical inputs always produce the same labels and the
//! same [`UserAgentKey`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::sha256_hex;
use crate::core::identifiers::BrowserLabel;
use crate::core::identifiers::UserAgentKey;
use crate::core::identifiers::VersionLevel;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Family reported when no known browser token matches.
pub const OTHER_FAMILY: &str = "Other";

/// Token in the raw user agent that advertises the Chrome Frame plugin.
const CHROME_FRAME_TOKEN: &str = "chromeframe";

/// Maximum number of version components tracked per user agent.
const MAX_VERSION_PARTS: usize = 3;

// ============================================================================
// SECTION: User Agent Info
// ============================================================================

/// Resolved user agent descriptor.
///
/// # Invariants
/// - `minor` is only set when `major` is set, and `patch` only when `minor` is.
/// - [`UserAgentInfo::key`] is a pure function of the three input strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentInfo {
    /// Raw HTTP user-agent string.
    pub user_agent_string: String,
    /// JavaScript-reported user agent, when the client supplied one.
    pub js_user_agent_string: Option<String>,
    /// IE document mode reported by the client.
    pub js_document_mode: Option<String>,
    /// Browser family label.
    pub family: String,
    /// Major version component.
    pub major: Option<String>,
    /// Minor version component.
    pub minor: Option<String>,
    /// Patch version component.
    pub patch: Option<String>,
}

impl UserAgentInfo {
    /// Resolves a user agent from the raw string and client-side hints.
    #[must_use]
    pub fn parse(
        user_agent_string: &str,
        js_user_agent_string: Option<&str>,
        js_document_mode: Option<&str>,
    ) -> Self {
        let js_user_agent_string = js_user_agent_string.filter(|value| !value.is_empty());
        let js_document_mode = js_document_mode.filter(|value| !value.is_empty());
        let mut parsed = parse_family(user_agent_string);
        if parsed.family == "IE"
            && let Some(mode) = js_document_mode
            && mode.chars().all(|ch| ch.is_ascii_digit())
        {
            parsed.parts = vec![mode.to_string(), "0".to_string()];
        }
        if user_agent_string.contains(CHROME_FRAME_TOKEN)
            && let Some(js_ua) = js_user_agent_string
            && let Some(chrome_parts) = version_after(js_ua, "Chrome/")
        {
            let host = match parsed.parts.first() {
                Some(major) => format!("{} {}", parsed.family, major),
                None => parsed.family.clone(),
            };
            parsed = ParsedAgent {
                family: format!("Chrome Frame ({host})"),
                parts: chrome_parts,
            };
        }
        let mut parts = parsed.parts.into_iter();
        Self {
            user_agent_string: user_agent_string.to_string(),
            js_user_agent_string: js_user_agent_string.map(str::to_string),
            js_document_mode: js_document_mode.map(str::to_string),
            family: parsed.family,
            major: parts.next(),
            minor: parts.next(),
            patch: parts.next(),
        }
    }

    /// Returns the labels coarsest to finest, one per present version level.
    #[must_use]
    pub fn string_list(&self) -> Vec<BrowserLabel> {
        let mut labels = vec![BrowserLabel::new(self.family.clone())];
        let mut version = String::new();
        for part in [&self.major, &self.minor, &self.patch].into_iter().flatten() {
            if !version.is_empty() {
                version.push('.');
            }
            version.push_str(part);
            labels.push(BrowserLabel::new(format!("{} {}", self.family, version)));
        }
        labels
    }

    /// Returns the label used at a version level.
    ///
    /// Levels finer than the resolved version reuse the finest label.
    #[must_use]
    pub fn label_at(&self, level: VersionLevel) -> BrowserLabel {
        let mut labels = self.string_list();
        let index = level.index().min(labels.len().saturating_sub(1));
        labels.swap_remove(index)
    }

    /// Returns the finest label, used for display.
    #[must_use]
    pub fn pretty(&self) -> BrowserLabel {
        self.label_at(VersionLevel::Full)
    }

    /// Returns the canonical dedupe string for the descriptor.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        format!(
            "{}|{}|{}",
            self.user_agent_string,
            self.js_user_agent_string.as_deref().unwrap_or_default(),
            self.js_document_mode.as_deref().unwrap_or_default()
        )
    }

    /// Returns the storage key derived from the canonical string.
    #[must_use]
    pub fn key(&self) -> UserAgentKey {
        UserAgentKey::new(sha256_hex(self.canonical_string().as_bytes()))
    }
}

// ============================================================================
// SECTION: Family Parsing
// ============================================================================

/// Intermediate parse result before version parts are split into fields.
struct ParsedAgent {
    /// Browser family label.
    family: String,
    /// Version components, at most [`MAX_VERSION_PARTS`].
    parts: Vec<String>,
}

impl ParsedAgent {
    /// Builds a parse result for a family with optional version parts.
    fn new(family: &str, parts: Option<Vec<String>>) -> Self {
        Self {
            family: family.to_string(),
            parts: parts.unwrap_or_default(),
        }
    }
}

/// Resolves the browser family and version from a raw user-agent string.
fn parse_family(ua: &str) -> ParsedAgent {
    if let Some(parts) = version_after(ua, "OPR/") {
        return ParsedAgent::new("Opera", Some(parts));
    }
    if ua.contains("Opera") {
        let parts = version_after(ua, "Version/")
            .or_else(|| version_after(ua, "Opera/"))
            .or_else(|| version_after(ua, "Opera "));
        return ParsedAgent::new("Opera", parts);
    }
    if let Some(parts) = version_after(ua, "Edg/").or_else(|| version_after(ua, "Edge/")) {
        return ParsedAgent::new("Edge", Some(parts));
    }
    if let Some(parts) = version_after(ua, "Chrome/").or_else(|| version_after(ua, "CriOS/")) {
        return ParsedAgent::new("Chrome", Some(parts));
    }
    if let Some(parts) = version_after(ua, "Firefox/") {
        return ParsedAgent::new("Firefox", Some(parts));
    }
    if ua.contains("iPhone") {
        let parts =
            version_after(ua, "iPhone OS ").or_else(|| version_after(ua, "Version/"));
        return ParsedAgent::new("iPhone", parts);
    }
    if ua.contains("Safari/") {
        return ParsedAgent::new("Safari", version_after(ua, "Version/"));
    }
    if let Some(parts) = version_after(ua, "MSIE ") {
        return ParsedAgent::new("IE", Some(parts));
    }
    if ua.contains("Trident/")
        && let Some(parts) = version_after(ua, "rv:")
    {
        return ParsedAgent::new("IE", Some(parts));
    }
    ParsedAgent::new(OTHER_FAMILY, None)
}

/// Extracts up to three version components following a token.
///
/// Components are separated by `.` or `_`; a version must start with a digit.
fn version_after(ua: &str, token: &str) -> Option<Vec<String>> {
    let start = ua.find(token)? + token.len();
    let tail = &ua[start ..];
    if !tail.starts_with(|ch: char| ch.is_ascii_digit()) {
        return None;
    }
    let end = tail
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '_'))
        .unwrap_or(tail.len());
    let parts: Vec<String> = tail[.. end]
        .split(['.', '_'])
        .filter(|part| !part.is_empty())
        .take(MAX_VERSION_PARTS)
        .map(str::to_string)
        .collect();
    if parts.is_empty() { None } else { Some(parts) }
}

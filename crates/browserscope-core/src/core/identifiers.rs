// crates/browserscope-core/src/core/identifiers.rs
// ============================================================================
// Module: Browserscope Identifiers
// Description: Strongly typed identifiers for categories, tests, browsers, and records.
// Purpose: Keep string-keyed concepts distinct at compile time.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as plain strings or numbers. The only
//! validated string identifier is [`ParamsString`], which rejects the empty
//! string and the literal `"None"` so that "no params" is always spelled as
//! `Option::None`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: String Identifiers
// ============================================================================

/// Test category (one test suite, e.g. `network` or `reflow`).
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Creates a new category identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Test key inside a category (e.g. `testDisplay`).
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestKey(String);

impl TestKey {
    /// Creates a new test key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TestKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Browser label at one granularity level (e.g. `Safari 4.3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrowserLabel(String);

impl BrowserLabel {
    /// Creates a new browser label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lowercase form used for index ordering.
    #[must_use]
    pub fn sort_key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for BrowserLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BrowserLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Storage key of a deduplicated user agent descriptor.
///
/// # Invariants
/// - Lowercase hex SHA-256 of the descriptor's canonical string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAgentKey(String);

impl UserAgentKey {
    /// Wraps an existing key value.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserAgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Numeric Identifiers
// ============================================================================

/// Store-assigned submission identifier.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(NonZeroU64);

impl SubmissionId {
    /// Creates a new submission identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a submission identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

// ============================================================================
// SECTION: Params String
// ============================================================================

/// Literal token that callers sometimes send instead of omitting params.
pub const PARAMS_NONE_LITERAL: &str = "None";

/// Errors raised when validating a params string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// The params string was empty.
    #[error("params string must be absent or non-empty")]
    Empty,
    /// The params string was the literal `"None"` token.
    #[error("params string must not be the literal \"None\"")]
    NoneLiteral,
}

/// Serialized test-set parameters distinguishing variant test configurations.
///
/// # Invariants
/// - Never empty and never equal to [`PARAMS_NONE_LITERAL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParamsString(String);

impl ParamsString {
    /// Validates and wraps a params string.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError`] when the value is empty or the `"None"` literal.
    pub fn new(value: impl Into<String>) -> Result<Self, ParamsError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ParamsError::Empty);
        }
        if value == PARAMS_NONE_LITERAL {
            return Err(ParamsError::NoneLiteral);
        }
        Ok(Self(value))
    }

    /// Parses an optional caller-supplied params string.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError`] when a value is present but invalid.
    pub fn parse(value: Option<&str>) -> Result<Option<Self>, ParamsError> {
        value.map(Self::new).transpose()
    }

    /// Returns the params string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParamsString {
    type Error = ParamsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParamsString> for String {
    fn from(value: ParamsString) -> Self {
        value.0
    }
}

impl fmt::Display for ParamsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Version Levels
// ============================================================================

/// Browser label granularity, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionLevel {
    /// Browser family (`Safari`).
    Family,
    /// Major version (`Safari 4`).
    Major,
    /// Minor version (`Safari 4.3`).
    Minor,
    /// Full version (`Safari 4.3.1`).
    Full,
}

impl VersionLevel {
    /// All levels in ascending granularity.
    pub const ALL: [Self; 4] = [Self::Family, Self::Major, Self::Minor, Self::Full];

    /// Returns the zero-based level index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Family => 0,
            Self::Major => 1,
            Self::Minor => 2,
            Self::Full => 3,
        }
    }

    /// Returns the level for a zero-based index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Family),
            1 => Some(Self::Major),
            2 => Some(Self::Minor),
            3 => Some(Self::Full),
            _ => None,
        }
    }

    /// Returns the navigation label shown above browser tables.
    #[must_use]
    pub const fn nav_label(self) -> &'static str {
        match self {
            Self::Family => "Browser Families",
            Self::Major => "Major Versions",
            Self::Minor => "Minor Versions",
            Self::Full => "All Versions",
        }
    }
}

impl fmt::Display for VersionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.index().fmt(f)
    }
}

/// Selector for a browser list: the fixed top list or one version level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSelector {
    /// Well-known top browsers.
    Top,
    /// All browsers seen at one version level.
    Level(VersionLevel),
}

impl LevelSelector {
    /// Returns the navigation label for the selector.
    #[must_use]
    pub const fn nav_label(self) -> &'static str {
        match self {
            Self::Top => "Top Browsers",
            Self::Level(level) => level.nav_label(),
        }
    }
}

/// Navigation order for browser tables.
pub const BROWSER_NAV: [LevelSelector; 5] = [
    LevelSelector::Top,
    LevelSelector::Level(VersionLevel::Family),
    LevelSelector::Level(VersionLevel::Major),
    LevelSelector::Level(VersionLevel::Minor),
    LevelSelector::Level(VersionLevel::Full),
];

/// Error raised when a level selector cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown version level: {0} (expected top, 0, 1, 2, or 3)")]
pub struct LevelParseError(pub String);

impl FromStr for LevelSelector {
    type Err = LevelParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("top") {
            return Ok(Self::Top);
        }
        trimmed
            .parse::<usize>()
            .ok()
            .and_then(VersionLevel::from_index)
            .map(Self::Level)
            .ok_or_else(|| LevelParseError(value.to_string()))
    }
}

impl fmt::Display for LevelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => f.write_str("top"),
            Self::Level(level) => level.fmt(f),
        }
    }
}

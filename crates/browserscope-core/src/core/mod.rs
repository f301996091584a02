// crates/browserscope-core/src/core/mod.rs
// ============================================================================
// Module: Browserscope Core Types
// Description: Canonical data model for submissions, rankers, and stats.
// Purpose: Provide stable, serializable types shared by every pipeline stage.
// Dependencies: serde, sha2, thiserror
// ============================================================================

//! ## Overview
//! Core types describe submitted runs, resolved user agents, per-browser
//! rankers, and the stats bundles derived from them. They carry no I/O; the
//! runtime services move them between the store, the cache, and the queue.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod ranker;
pub mod stats;
pub mod submission;
pub mod time;
pub mod user_agent;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::hash_ip;
pub use hashing::sha256_hex;
pub use identifiers::BROWSER_NAV;
pub use identifiers::BrowserLabel;
pub use identifiers::Category;
pub use identifiers::LevelParseError;
pub use identifiers::LevelSelector;
pub use identifiers::PARAMS_NONE_LITERAL;
pub use identifiers::ParamsError;
pub use identifiers::ParamsString;
pub use identifiers::SubmissionId;
pub use identifiers::TestKey;
pub use identifiers::UserAgentKey;
pub use identifiers::VersionLevel;
pub use ranker::Ranker;
pub use ranker::RankerKey;
pub use stats::BrowserStats;
pub use stats::StatsTable;
pub use stats::TestStats;
pub use submission::DEFAULT_MAX_EXTRA_FIELDS;
pub use submission::ExtraFields;
pub use submission::ExtraFieldsError;
pub use submission::NewScore;
pub use submission::NewSubmission;
pub use submission::ScoreRecord;
pub use submission::SubmissionRecord;
pub use time::Timestamp;
pub use user_agent::OTHER_FAMILY;
pub use user_agent::UserAgentInfo;

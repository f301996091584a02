// crates/browserscope-core/src/core/time.rs
// ============================================================================
// Module: Browserscope Submission Time
// Description: Creation timestamps carried by submission records.
// Purpose: Keep the pipeline free of direct wall-clock reads.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The host that accepts a beacon stamps the submission; the pipeline only
//! stores the value. Tests stamp submissions with logical ticks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Creation time of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Wall-clock milliseconds since the unix epoch, as stamped by the host.
    UnixMillis(i64),
    /// Logical tick used where wall-clock time would make runs differ.
    Logical(u64),
}

impl Timestamp {
    /// Returns the unix milliseconds of a wall-clock stamp.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(millis) => Some(*millis),
            Self::Logical(_) => None,
        }
    }
}

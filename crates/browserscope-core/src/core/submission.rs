// crates/browserscope-core/src/core/submission.rs
// ============================================================================
// Module: Browserscope Submission Records
// Description: Parent submission records, child score records, and extras.
// Purpose: Define the durable shape of one submitted test run.
// Dependencies: crate::core::{identifiers, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! A submission is stored as one [`SubmissionRecord`] parent and one
//! [`ScoreRecord`] child per test key. Children start dirty unless the
//! submission is a bulk import; reconciliation is the only writer that flips
//! the flag. Parents are immutable after creation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::Category;
use crate::core::identifiers::ParamsString;
use crate::core::identifiers::SubmissionId;
use crate::core::identifiers::TestKey;
use crate::core::identifiers::UserAgentKey;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Extra Fields
// ============================================================================

/// Default maximum number of extra fields stored per submission.
pub const DEFAULT_MAX_EXTRA_FIELDS: usize = 256;

/// Errors raised when populating [`ExtraFields`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtraFieldsError {
    /// The map would exceed its configured cardinality.
    #[error("extra fields exceed limit of {max}")]
    LimitExceeded {
        /// Maximum allowed entries.
        max: usize,
    },
}

/// Open map of test key to raw (pre-adjustment) score.
///
/// # Invariants
/// - Never holds more entries than the limit passed to [`ExtraFields::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraFields(BTreeMap<TestKey, i64>);

impl ExtraFields {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts or replaces a raw value, enforcing the cardinality limit.
    ///
    /// # Errors
    ///
    /// Returns [`ExtraFieldsError::LimitExceeded`] when a new key would exceed `max`.
    pub fn insert(&mut self, key: TestKey, value: i64, max: usize) -> Result<(), ExtraFieldsError> {
        if !self.0.contains_key(&key) && self.0.len() >= max {
            return Err(ExtraFieldsError::LimitExceeded {
                max,
            });
        }
        self.0.insert(key, value);
        Ok(())
    }

    /// Returns the raw value stored for a key.
    #[must_use]
    pub fn get(&self, key: &TestKey) -> Option<i64> {
        self.0.get(key).copied()
    }

    /// Returns the number of stored fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no fields are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&TestKey, i64)> {
        self.0.iter().map(|(key, value)| (key, *value))
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// One score to be written with a new submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScore {
    /// Test key.
    pub test: TestKey,
    /// Canonical (possibly adjusted) score.
    pub score: i64,
}

/// Submission payload handed to the entity store for an atomic insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    /// Test category.
    pub category: Category,
    /// Deduplicated user agent key.
    pub user_agent_key: UserAgentKey,
    /// Hashed submitter address.
    pub ip_hash: String,
    /// Caller-supplied creation time.
    pub created: Timestamp,
    /// Optional params string.
    pub params: Option<ParamsString>,
    /// Bulk import flag; imported scores are written clean.
    pub is_import: bool,
    /// Raw values of adjusted scores.
    pub extra: ExtraFields,
    /// Child scores in submission order.
    pub scores: Vec<NewScore>,
}

impl NewSubmission {
    /// Splits the payload into the stored parent and children for an assigned id.
    #[must_use]
    pub fn into_records(self, id: SubmissionId) -> (SubmissionRecord, Vec<ScoreRecord>) {
        let dirty = !self.is_import;
        let children = self
            .scores
            .into_iter()
            .map(|score| ScoreRecord {
                submission_id: id,
                test: score.test,
                score: score.score,
                dirty,
            })
            .collect();
        let parent = SubmissionRecord {
            id,
            category: self.category,
            user_agent_key: self.user_agent_key,
            ip_hash: self.ip_hash,
            created: self.created,
            params: self.params,
            is_import: self.is_import,
            extra: self.extra,
        };
        (parent, children)
    }
}

/// Stored submission parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Store-assigned identifier.
    pub id: SubmissionId,
    /// Test category.
    pub category: Category,
    /// Deduplicated user agent key.
    pub user_agent_key: UserAgentKey,
    /// Hashed submitter address.
    pub ip_hash: String,
    /// Caller-supplied creation time.
    pub created: Timestamp,
    /// Optional params string.
    pub params: Option<ParamsString>,
    /// Bulk import flag.
    pub is_import: bool,
    /// Raw values of adjusted scores.
    pub extra: ExtraFields,
}

/// Stored child score.
///
/// # Invariants
/// - Unique per (`submission_id`, `test`).
/// - `dirty` only transitions from true to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Parent submission.
    pub submission_id: SubmissionId,
    /// Test key.
    pub test: TestKey,
    /// Canonical score.
    pub score: i64,
    /// True until folded into rankers.
    pub dirty: bool,
}

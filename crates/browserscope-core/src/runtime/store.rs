// crates/browserscope-core/src/runtime/store.rs
// ============================================================================
// Module: Browserscope In-Memory Entity Store
// Description: Simple in-memory entity store for tests and local runs.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`EntityStore`] for
//! tests and local demos. All state sits behind one mutex, so every operation
//! is trivially atomic. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::BrowserLabel;
use crate::core::NewSubmission;
use crate::core::Ranker;
use crate::core::RankerKey;
use crate::core::ScoreRecord;
use crate::core::SubmissionId;
use crate::core::SubmissionRecord;
use crate::core::TestKey;
use crate::core::UserAgentInfo;
use crate::core::UserAgentKey;
use crate::interfaces::EntityStore;
use crate::interfaces::FoldOutcome;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable store state guarded by a single lock.
#[derive(Debug, Default)]
struct MemoryState {
    /// Deduplicated user agents.
    user_agents: BTreeMap<UserAgentKey, UserAgentInfo>,
    /// Submission parents by raw id.
    submissions: BTreeMap<u64, SubmissionRecord>,
    /// Child scores by (raw submission id, test key).
    scores: BTreeMap<(u64, TestKey), ScoreRecord>,
    /// Ranker samples in append order.
    rankers: BTreeMap<RankerKey, Vec<i64>>,
    /// Browser level rows by key name.
    browser_levels: BTreeMap<String, Vec<BrowserLabel>>,
    /// Last assigned submission id.
    last_id: u64,
}

/// In-memory entity store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEntityStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryEntityStore {
    /// Creates a new in-memory entity store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("entity store mutex poisoned".to_string()))
    }
}

impl EntityStore for InMemoryEntityStore {
    fn upsert_user_agent(&self, info: &UserAgentInfo) -> Result<UserAgentKey, StoreError> {
        let key = info.key();
        self.lock()?.user_agents.entry(key.clone()).or_insert_with(|| info.clone());
        Ok(key)
    }

    fn load_user_agent(&self, key: &UserAgentKey) -> Result<Option<UserAgentInfo>, StoreError> {
        Ok(self.lock()?.user_agents.get(key).cloned())
    }

    fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionRecord, StoreError> {
        let mut seen = BTreeSet::new();
        for score in &submission.scores {
            if !seen.insert(&score.test) {
                return Err(StoreError::Invalid(format!("duplicate test key: {}", score.test)));
            }
        }
        let mut state = self.lock()?;
        let raw_id = state.last_id + 1;
        let id = SubmissionId::from_raw(raw_id)
            .ok_or_else(|| StoreError::Corrupt("submission id overflow".to_string()))?;
        let (parent, children) = submission.into_records(id);
        state.last_id = raw_id;
        state.submissions.insert(raw_id, parent.clone());
        for child in children {
            state.scores.insert((raw_id, child.test.clone()), child);
        }
        drop(state);
        Ok(parent)
    }

    fn load_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>, StoreError> {
        Ok(self.lock()?.submissions.get(&id.get()).cloned())
    }

    fn load_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError> {
        let state = self.lock()?;
        Ok(children(&state, id).cloned().collect())
    }

    fn load_dirty_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError> {
        let state = self.lock()?;
        Ok(children(&state, id).filter(|score| score.dirty).cloned().collect())
    }

    fn count_dirty_scores(&self, id: SubmissionId) -> Result<usize, StoreError> {
        let state = self.lock()?;
        Ok(children(&state, id).filter(|score| score.dirty).count())
    }

    fn list_dirty_submissions(&self, limit: usize) -> Result<Vec<SubmissionId>, StoreError> {
        let state = self.lock()?;
        let mut ids: Vec<SubmissionId> = Vec::new();
        for score in state.scores.values().filter(|score| score.dirty) {
            if ids.len() >= limit {
                break;
            }
            if ids.last() != Some(&score.submission_id) {
                ids.push(score.submission_id);
            }
        }
        Ok(ids)
    }

    fn fold_dirty_score(
        &self,
        id: SubmissionId,
        test: &TestKey,
        rankers: &[RankerKey],
    ) -> Result<FoldOutcome, StoreError> {
        let mut state = self.lock()?;
        let Some(record) = state.scores.get_mut(&(id.get(), test.clone())) else {
            return Ok(FoldOutcome::Missing);
        };
        if !record.dirty {
            return Ok(FoldOutcome::AlreadyClean);
        }
        record.dirty = false;
        let score = record.score;
        for key in rankers {
            state.rankers.entry(key.clone()).or_default().push(score);
        }
        drop(state);
        Ok(FoldOutcome::Folded {
            rankers: rankers.len(),
        })
    }

    fn load_ranker(&self, key: &RankerKey) -> Result<Ranker, StoreError> {
        let scores = self.lock()?.rankers.get(key).cloned().unwrap_or_default();
        Ok(Ranker::from_scores(key.clone(), scores))
    }

    fn load_browser_levels(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, Vec<BrowserLabel>>, StoreError> {
        let state = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| state.browser_levels.get(key).map(|row| (key.clone(), row.clone())))
            .collect())
    }

    fn put_browser_levels(
        &self,
        rows: &BTreeMap<String, Vec<BrowserLabel>>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        for (key, row) in rows {
            state.browser_levels.insert(key.clone(), row.clone());
        }
        drop(state);
        Ok(())
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

/// Iterates the children of one submission in test key order.
fn children(state: &MemoryState, id: SubmissionId) -> impl Iterator<Item = &ScoreRecord> {
    state
        .scores
        .range((id.get(), TestKey::new(String::new())) ..)
        .take_while(move |((raw_id, _), _)| *raw_id == id.get())
        .map(|(_, score)| score)
}

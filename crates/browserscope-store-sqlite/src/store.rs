// crates/browserscope-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Entity Store
// Description: Durable EntityStore backed by SQLite.
// Purpose: Persist submissions, rankers, and browser rows with atomic folds.
// Dependencies: browserscope-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`EntityStore`] using `SQLite`. A
//! submission parent and its score children are written in one `IMMEDIATE`
//! transaction, and every dirty-score fold re-checks the dirty flag inside its
//! own transaction before appending to rankers, so a fold is applied at most
//! once no matter how often reconciliation is retried. Structured columns are
//! stored as JSON and fail closed when they cannot be decoded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use browserscope_core::BrowserLabel;
use browserscope_core::Category;
use browserscope_core::EntityStore;
use browserscope_core::ExtraFields;
use browserscope_core::FoldOutcome;
use browserscope_core::NewSubmission;
use browserscope_core::ParamsString;
use browserscope_core::Ranker;
use browserscope_core::RankerKey;
use browserscope_core::ScoreRecord;
use browserscope_core::StoreError;
use browserscope_core::SubmissionId;
use browserscope_core::SubmissionRecord;
use browserscope_core::TestKey;
use browserscope_core::Timestamp;
use browserscope_core::UserAgentInfo;
use browserscope_core::UserAgentKey;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` entity store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default pragmas.
    #[must_use]
    pub const fn for_path(path: PathBuf) -> Self {
        Self {
            path,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw submission payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data cannot be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps a `rusqlite` error into a store error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed entity store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Every multi-row write runs in one `IMMEDIATE` transaction.
#[derive(Clone)]
pub struct SqliteEntityStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteEntityStore {
    /// Opens an `SQLite`-backed entity store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))
    }

    /// Writes a parent and its children in one transaction.
    fn insert_submission_tx(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionRecord, SqliteStoreError> {
        let mut seen = BTreeSet::new();
        for score in &submission.scores {
            if !seen.insert(&score.test) {
                return Err(SqliteStoreError::Invalid(format!(
                    "duplicate test key: {}",
                    score.test
                )));
            }
        }
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let next: i64 = tx
            .query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM submissions", params![], |row| {
                row.get(0)
            })
            .map_err(|err| db_error(&err))?;
        let id = submission_id(next)?;
        let (parent, children) = submission.into_records(id);
        let created = encode_json(&parent.created)?;
        let extra = encode_json(&parent.extra)?;
        tx.execute(
            "INSERT INTO submissions (id, category, user_agent_key, ip_hash, created_json, \
             params, is_import, extra_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                next,
                parent.category.as_str(),
                parent.user_agent_key.as_str(),
                parent.ip_hash.as_str(),
                created,
                parent.params.as_ref().map(ParamsString::as_str),
                parent.is_import,
                extra
            ],
        )
        .map_err(|err| db_error(&err))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO scores (submission_id, test, score, dirty) VALUES (?1, ?2, ?3, \
                     ?4)",
                )
                .map_err(|err| db_error(&err))?;
            for child in &children {
                stmt.execute(params![next, child.test.as_str(), child.score, child.dirty])
                    .map_err(|err| db_error(&err))?;
            }
        }
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(parent)
    }

    /// Folds one dirty score inside a transaction.
    fn fold_tx(
        &self,
        id: SubmissionId,
        test: &TestKey,
        rankers: &[RankerKey],
    ) -> Result<FoldOutcome, SqliteStoreError> {
        let raw_id = submission_key(id)?;
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let row: Option<(i64, bool)> = tx
            .query_row(
                "SELECT score, dirty FROM scores WHERE submission_id = ?1 AND test = ?2",
                params![raw_id, test.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        let Some((score, dirty)) = row else {
            return Ok(FoldOutcome::Missing);
        };
        if !dirty {
            return Ok(FoldOutcome::AlreadyClean);
        }
        {
            let mut stmt = tx
                .prepare_cached("INSERT INTO ranker_scores (ranker_key, score) VALUES (?1, ?2)")
                .map_err(|err| db_error(&err))?;
            for key in rankers {
                stmt.execute(params![key.storage_key(), score]).map_err(|err| db_error(&err))?;
            }
        }
        tx.execute(
            "UPDATE scores SET dirty = 0 WHERE submission_id = ?1 AND test = ?2",
            params![raw_id, test.as_str()],
        )
        .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(FoldOutcome::Folded {
            rankers: rankers.len(),
        })
    }

    /// Loads the children of a submission, optionally only the dirty ones.
    fn scores_for(
        &self,
        id: SubmissionId,
        dirty_only: bool,
    ) -> Result<Vec<ScoreRecord>, SqliteStoreError> {
        let raw_id = submission_key(id)?;
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT test, score, dirty FROM scores WHERE submission_id = ?1 AND (dirty = 1 \
                 OR ?2 = 0) ORDER BY test",
            )
            .map_err(|err| db_error(&err))?;
        let rows = stmt
            .query_map(params![raw_id, dirty_only], |row| {
                Ok(ScoreRecord {
                    submission_id: id,
                    test: TestKey::new(row.get::<_, String>(0)?),
                    score: row.get(1)?,
                    dirty: row.get(2)?,
                })
            })
            .map_err(|err| db_error(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_error(&err))
    }

    /// Loads rankers under one lock.
    fn rankers_for(&self, keys: &[RankerKey]) -> Result<Vec<Ranker>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached("SELECT score FROM ranker_scores WHERE ranker_key = ?1 ORDER BY seq")
            .map_err(|err| db_error(&err))?;
        let mut rankers = Vec::with_capacity(keys.len());
        for key in keys {
            let scores = stmt
                .query_map(params![key.storage_key()], |row| row.get::<_, i64>(0))
                .map_err(|err| db_error(&err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| db_error(&err))?;
            rankers.push(Ranker::from_scores(key.clone(), scores));
        }
        Ok(rankers)
    }
}

impl EntityStore for SqliteEntityStore {
    fn upsert_user_agent(&self, info: &UserAgentInfo) -> Result<UserAgentKey, StoreError> {
        let key = info.key();
        let payload = encode_json(info)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT OR IGNORE INTO user_agents (key, info_json) VALUES (?1, ?2)",
                params![key.as_str(), payload],
            )
            .map_err(|err| db_error(&err))?;
        Ok(key)
    }

    fn load_user_agent(&self, key: &UserAgentKey) -> Result<Option<UserAgentInfo>, StoreError> {
        let guard = self.lock()?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT info_json FROM user_agents WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        drop(guard);
        let Some(payload) = payload else {
            return Ok(None);
        };
        let info: UserAgentInfo = decode_json(&payload)?;
        if info.key() != *key {
            return Err(SqliteStoreError::Corrupt(format!("user agent key mismatch for {key}"))
                .into());
        }
        Ok(Some(info))
    }

    fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<SubmissionRecord, StoreError> {
        Ok(self.insert_submission_tx(submission)?)
    }

    fn load_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRecord>, StoreError> {
        let raw_id = submission_key(id)?;
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT category, user_agent_key, ip_hash, created_json, params, is_import, \
                 extra_json FROM submissions WHERE id = ?1",
                params![raw_id],
                |row| {
                    Ok(SubmissionRow {
                        category: row.get(0)?,
                        user_agent_key: row.get(1)?,
                        ip_hash: row.get(2)?,
                        created_json: row.get(3)?,
                        params: row.get(4)?,
                        is_import: row.get(5)?,
                        extra_json: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        drop(guard);
        match row {
            Some(row) => Ok(Some(row.into_record(id)?)),
            None => Ok(None),
        }
    }

    fn load_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.scores_for(id, false)?)
    }

    fn load_dirty_scores(&self, id: SubmissionId) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.scores_for(id, true)?)
    }

    fn count_dirty_scores(&self, id: SubmissionId) -> Result<usize, StoreError> {
        let raw_id = submission_key(id)?;
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(1) FROM scores WHERE submission_id = ?1 AND dirty = 1",
                params![raw_id],
                |row| row.get(0),
            )
            .map_err(|err| db_error(&err))?;
        usize::try_from(count)
            .map_err(|_| SqliteStoreError::Corrupt(format!("invalid dirty count {count}")).into())
    }

    fn list_dirty_submissions(&self, limit: usize) -> Result<Vec<SubmissionId>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached(
                "SELECT DISTINCT submission_id FROM scores WHERE dirty = 1 ORDER BY \
                 submission_id LIMIT ?1",
            )
            .map_err(|err| db_error(&err))?;
        let raw_ids = stmt
            .query_map(params![limit], |row| row.get::<_, i64>(0))
            .map_err(|err| db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| db_error(&err))?;
        raw_ids.into_iter().map(|raw| submission_id(raw).map_err(StoreError::from)).collect()
    }

    fn fold_dirty_score(
        &self,
        id: SubmissionId,
        test: &TestKey,
        rankers: &[RankerKey],
    ) -> Result<FoldOutcome, StoreError> {
        Ok(self.fold_tx(id, test, rankers)?)
    }

    fn load_ranker(&self, key: &RankerKey) -> Result<Ranker, StoreError> {
        let mut rankers = self.rankers_for(std::slice::from_ref(key))?;
        rankers.pop().ok_or_else(|| StoreError::Store("ranker read returned no rows".to_string()))
    }

    fn load_rankers(&self, keys: &[RankerKey]) -> Result<Vec<Ranker>, StoreError> {
        Ok(self.rankers_for(keys)?)
    }

    fn load_browser_levels(
        &self,
        keys: &[String],
    ) -> Result<BTreeMap<String, Vec<BrowserLabel>>, StoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare_cached("SELECT labels_json FROM browser_levels WHERE key = ?1")
            .map_err(|err| db_error(&err))?;
        let mut rows = BTreeMap::new();
        for key in keys {
            let payload: Option<String> = stmt
                .query_row(params![key], |row| row.get(0))
                .optional()
                .map_err(|err| db_error(&err))?;
            if let Some(payload) = payload {
                rows.insert(key.clone(), decode_json(&payload)?);
            }
        }
        Ok(rows)
    }

    fn put_browser_levels(
        &self,
        rows: &BTreeMap<String, Vec<BrowserLabel>>,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO browser_levels (key, labels_json) VALUES (?1, ?2) ON \
                     CONFLICT(key) DO UPDATE SET labels_json = excluded.labels_json",
                )
                .map_err(|err| db_error(&err))?;
            for (key, row) in rows {
                stmt.execute(params![key, encode_json(row)?]).map_err(|err| db_error(&err))?;
            }
        }
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(())
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let version: i64 = guard
            .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
            .map_err(|err| db_error(&err))?;
        if version != SCHEMA_VERSION {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {version}"
            ))
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw submission row prior to decoding.
struct SubmissionRow {
    /// Category column.
    category: String,
    /// User agent key column.
    user_agent_key: String,
    /// Hashed submitter address.
    ip_hash: String,
    /// JSON-encoded timestamp.
    created_json: String,
    /// Params string, if any.
    params: Option<String>,
    /// Import flag.
    is_import: bool,
    /// JSON-encoded extra fields.
    extra_json: String,
}

impl SubmissionRow {
    /// Decodes the row into a submission record.
    fn into_record(self, id: SubmissionId) -> Result<SubmissionRecord, SqliteStoreError> {
        let created: Timestamp = decode_json(&self.created_json)?;
        let extra: ExtraFields = decode_json(&self.extra_json)?;
        let params = ParamsString::parse(self.params.as_deref())
            .map_err(|err| SqliteStoreError::Corrupt(format!("submission {id}: {err}")))?;
        Ok(SubmissionRecord {
            id,
            category: Category::new(self.category),
            user_agent_key: UserAgentKey::new(self.user_agent_key),
            ip_hash: self.ip_hash,
            created,
            params,
            is_import: self.is_import,
            extra,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS user_agents (
                    key TEXT PRIMARY KEY,
                    info_json TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS submissions (
                    id INTEGER PRIMARY KEY,
                    category TEXT NOT NULL,
                    user_agent_key TEXT NOT NULL REFERENCES user_agents(key),
                    ip_hash TEXT NOT NULL,
                    created_json TEXT NOT NULL,
                    params TEXT,
                    is_import INTEGER NOT NULL,
                    extra_json TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS scores (
                    submission_id INTEGER NOT NULL
                        REFERENCES submissions(id) ON DELETE CASCADE,
                    test TEXT NOT NULL,
                    score INTEGER NOT NULL,
                    dirty INTEGER NOT NULL,
                    PRIMARY KEY (submission_id, test)
                );
                CREATE INDEX IF NOT EXISTS idx_scores_dirty
                    ON scores (dirty, submission_id);
                CREATE TABLE IF NOT EXISTS ranker_scores (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    ranker_key TEXT NOT NULL,
                    score INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_ranker_scores_key
                    ON ranker_scores (ranker_key, seq);
                CREATE TABLE IF NOT EXISTS browser_levels (
                    key TEXT PRIMARY KEY,
                    labels_json TEXT NOT NULL
                );",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}

/// Converts a submission id to its column value.
fn submission_key(id: SubmissionId) -> Result<i64, SqliteStoreError> {
    i64::try_from(id.get())
        .map_err(|_| SqliteStoreError::Invalid(format!("submission id out of range: {id}")))
}

/// Converts a column value to a submission id.
fn submission_id(raw: i64) -> Result<SubmissionId, SqliteStoreError> {
    u64::try_from(raw)
        .ok()
        .and_then(SubmissionId::from_raw)
        .ok_or_else(|| SqliteStoreError::Corrupt(format!("invalid submission id {raw}")))
}

/// Encodes a value as a JSON column.
fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Decodes a JSON column.
fn decode_json<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(payload).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

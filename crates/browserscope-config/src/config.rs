// crates/browserscope-config/src/config.rs
// ============================================================================
// Module: Browserscope Configuration
// Description: Configuration loading and validation for the stats pipeline.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: browserscope-core, browserscope-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults so a minimal file only needs `[[test_sets]]`.
//! Missing or invalid configuration fails closed, and the builders at the end
//! of this module turn a validated config into the runtime types the pipeline
//! consumes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use browserscope_core::Category;
use browserscope_core::DEFAULT_MAX_ATTEMPTS;
use browserscope_core::DEFAULT_MAX_EXTRA_FIELDS;
use browserscope_core::DEFAULT_MAX_RESULTS_BYTES;
use browserscope_core::DEFAULT_MAX_TESTS_PER_SUBMISSION;
use browserscope_core::DEFAULT_STATS_TTL;
use browserscope_core::DEFAULT_SWEEP_BATCH_SIZE;
use browserscope_core::Environment;
use browserscope_core::IngestLimits;
use browserscope_core::PipelineSettings;
use browserscope_core::ReconcilePolicy;
use browserscope_core::StaticTestSet;
use browserscope_core::TestDefinition;
use browserscope_core::TestSetRegistry;
use browserscope_store_sqlite::SqliteStoreConfig;
use browserscope_store_sqlite::SqliteStoreMode;
use browserscope_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "browserscope.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "BROWSERSCOPE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured test sets.
const MAX_TEST_SETS: usize = 256;
/// Maximum number of tests per test set.
const MAX_TESTS_PER_SET: usize = 1024;
/// Maximum length of a category or test key.
const MAX_KEY_LENGTH: usize = 128;
/// Maximum attempts per background job.
const MAX_JOB_ATTEMPTS: u32 = 100;
/// Maximum submissions reconciled per sweep.
const MAX_SWEEP_BATCH_SIZE: usize = 10_000;
/// Maximum stats TTL in seconds (30 days).
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
/// Maximum busy timeout for `SQLite` connections.
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default busy timeout for `SQLite` connections.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Upper bound for the results string limit.
const MAX_RESULTS_BYTES_LIMIT: usize = 1024 * 1024;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for the Browserscope stats pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserscopeConfig {
    /// Deployment environment.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Reconciliation and worker configuration.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Entity store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Stats cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Work queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Submission size limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Telemetry sink configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Registered test sets.
    #[serde(default)]
    pub test_sets: Vec<TestSetConfig>,
}

impl BrowserscopeConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then `BROWSERSCOPE_CONFIG`, then
    /// `browserscope.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reconcile.validate()?;
        self.store.validate()?;
        self.cache.validate()?;
        self.queue.validate()?;
        self.limits.validate()?;
        self.telemetry.validate()?;
        validate_test_sets(&self.test_sets)?;
        let known: BTreeSet<&str> =
            self.test_sets.iter().map(|set| set.category.as_str()).collect();
        for category in &self.reconcile.active_categories {
            if !known.contains(category.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "reconcile.active_categories references unknown test set: {category}"
                )));
            }
        }
        Ok(())
    }

    /// Builds a registry holding every configured test set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a test set definition is rejected.
    pub fn test_set_registry(&self) -> Result<TestSetRegistry, ConfigError> {
        let mut registry = TestSetRegistry::new();
        for set in &self.test_sets {
            registry.register(Arc::new(set.build()?));
        }
        Ok(registry)
    }

    /// Returns the stats gating policy.
    #[must_use]
    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        let active = self
            .reconcile
            .active_categories
            .iter()
            .map(|category| Category::new(category.as_str()))
            .collect();
        ReconcilePolicy::new(self.environment.mode, active)
    }

    /// Returns the submission size limits.
    #[must_use]
    pub const fn ingest_limits(&self) -> IngestLimits {
        IngestLimits {
            max_results_bytes: self.limits.max_results_bytes,
            max_tests_per_submission: self.limits.max_tests_per_submission,
            max_extra_fields: self.limits.max_extra_fields,
        }
    }

    /// Returns the full pipeline settings.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            policy: self.reconcile_policy(),
            limits: self.ingest_limits(),
            stats_ttl: self.cache.ttl(),
            max_attempts: self.reconcile.max_attempts,
            sweep_batch_size: self.reconcile.sweep_batch_size,
        }
    }
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Deployment environment configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Deployment mode; production gates stats by active category.
    #[serde(default)]
    pub mode: Environment,
}

// ============================================================================
// SECTION: Reconcile
// ============================================================================

/// Reconciliation and worker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Categories aggregated in production.
    #[serde(default)]
    pub active_categories: Vec<String>,
    /// Attempt limit per background job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Submissions reconciled per sweep.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            active_categories: Vec::new(),
            max_attempts: default_max_attempts(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

impl ReconcileConfig {
    /// Validates reconcile configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_JOB_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "reconcile.max_attempts must be between 1 and {MAX_JOB_ATTEMPTS}"
            )));
        }
        if self.sweep_batch_size == 0 || self.sweep_batch_size > MAX_SWEEP_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "reconcile.sweep_batch_size must be between 1 and {MAX_SWEEP_BATCH_SIZE}"
            )));
        }
        let mut seen = BTreeSet::new();
        for category in &self.active_categories {
            validate_key("reconcile.active_categories", category)?;
            if !seen.insert(category.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "reconcile.active_categories contains duplicate: {category}"
                )));
            }
        }
        Ok(())
    }
}

/// Returns the default attempt limit.
const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Returns the default sweep batch size.
const fn default_sweep_batch_size() -> usize {
    DEFAULT_SWEEP_BATCH_SIZE
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Entity store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store; data is lost when the process exits.
    #[default]
    Memory,
    /// Durable `SQLite` store.
    Sqlite,
}

/// Entity store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(format!(
                        "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

/// Returns the default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Cache and Queue
// ============================================================================

/// Stats cache configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL for cached stats bundles; zero disables expiry.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Optional bound on cached entries.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: None,
        }
    }
}

impl CacheConfig {
    /// Validates cache configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "cache.ttl_secs must be at most {MAX_CACHE_TTL_SECS}"
            )));
        }
        if self.max_entries == Some(0) {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the stats TTL, or `None` when expiry is disabled.
    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        if self.ttl_secs == 0 { None } else { Some(Duration::from_secs(self.ttl_secs)) }
    }
}

/// Returns the default stats TTL in seconds.
const fn default_cache_ttl_secs() -> u64 {
    DEFAULT_STATS_TTL.as_secs()
}

/// Work queue configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Optional bound on queued jobs.
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl QueueConfig {
    /// Validates queue configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "queue.capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Submission size limits.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum results string length in bytes.
    #[serde(default = "default_max_results_bytes")]
    pub max_results_bytes: usize,
    /// Maximum number of tests per submission.
    #[serde(default = "default_max_tests_per_submission")]
    pub max_tests_per_submission: usize,
    /// Maximum number of extra fields on a submission.
    #[serde(default = "default_max_extra_fields")]
    pub max_extra_fields: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_results_bytes: default_max_results_bytes(),
            max_tests_per_submission: default_max_tests_per_submission(),
            max_extra_fields: default_max_extra_fields(),
        }
    }
}

impl LimitsConfig {
    /// Validates limit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results_bytes == 0 || self.max_results_bytes > MAX_RESULTS_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "limits.max_results_bytes must be between 1 and {MAX_RESULTS_BYTES_LIMIT}"
            )));
        }
        if self.max_tests_per_submission == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_tests_per_submission must be greater than zero".to_string(),
            ));
        }
        if self.max_extra_fields == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_extra_fields must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the default results string limit.
const fn default_max_results_bytes() -> usize {
    DEFAULT_MAX_RESULTS_BYTES
}

/// Returns the default per-submission test limit.
const fn default_max_tests_per_submission() -> usize {
    DEFAULT_MAX_TESTS_PER_SUBMISSION
}

/// Returns the default extra field limit.
const fn default_max_extra_fields() -> usize {
    DEFAULT_MAX_EXTRA_FIELDS
}

// ============================================================================
// SECTION: Telemetry
// ============================================================================

/// Telemetry sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetrySinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Events are discarded.
    None,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: TelemetrySinkType,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Validates telemetry configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (TelemetrySinkType::File, None) => {
                Err(ConfigError::Invalid("file telemetry sink requires path".to_string()))
            }
            (TelemetrySinkType::File, Some(path)) => {
                validate_path_string("telemetry.path", &path.to_string_lossy())
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "telemetry.path is only valid for the file sink".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Test Sets
// ============================================================================

/// One configured test set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSetConfig {
    /// Category the test set scores.
    pub category: String,
    /// Test definitions in display order.
    #[serde(default)]
    pub tests: Vec<TestDefinition>,
}

impl TestSetConfig {
    /// Builds the static test set.
    fn build(&self) -> Result<StaticTestSet, ConfigError> {
        StaticTestSet::new(Category::new(self.category.as_str()), self.tests.clone())
            .map_err(|err| ConfigError::Invalid(format!("test_sets: {err}")))
    }
}

/// Validates the configured test sets.
fn validate_test_sets(sets: &[TestSetConfig]) -> Result<(), ConfigError> {
    if sets.len() > MAX_TEST_SETS {
        return Err(ConfigError::Invalid(format!(
            "test_sets exceeds max entries ({MAX_TEST_SETS})"
        )));
    }
    let mut categories = BTreeSet::new();
    for set in sets {
        validate_key("test_sets.category", &set.category)?;
        if !categories.insert(set.category.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "test_sets contains duplicate category: {}",
                set.category
            )));
        }
        if set.tests.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "test_sets.{} must define at least one test",
                set.category
            )));
        }
        if set.tests.len() > MAX_TESTS_PER_SET {
            return Err(ConfigError::Invalid(format!(
                "test_sets.{} exceeds max tests ({MAX_TESTS_PER_SET})",
                set.category
            )));
        }
        for test in &set.tests {
            validate_key("test_sets.tests.key", test.key.as_str())?;
        }
        set.build()?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a category or test key.
fn validate_key(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_KEY_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds {MAX_KEY_LENGTH} bytes")));
    }
    if value.contains(['=', ',']) || value.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!(
            "{field} must not contain '=', ',' or whitespace: {value}"
        )));
    }
    Ok(())
}

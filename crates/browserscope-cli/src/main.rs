// crates/browserscope-cli/src/main.rs
// ============================================================================
// Module: Browserscope CLI Entry Point
// Description: Command dispatcher for submissions, sweeps, and stats reads.
// Purpose: Drive the stats pipeline from configured stores and test sets.
// Dependencies: clap, browserscope-config, browserscope-core, serde, thiserror.
// ============================================================================

//! ## Overview
//! The Browserscope CLI wires a [`StatsPipeline`] from `browserscope.toml` and
//! runs one command against it. Submissions are reconciled in-process by
//! draining the work queue before the command returns, so a durable `SQLite`
//! store sees fully folded rankers between invocations. Command output is JSON
//! on stdout; failures are written to stderr with a non-zero exit code.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use browserscope_config::BrowserscopeConfig;
use browserscope_config::StoreType;
use browserscope_config::TelemetrySinkType;
use browserscope_core::BrowserLabel;
use browserscope_core::Category;
use browserscope_core::DrainReport;
use browserscope_core::EntityStore;
use browserscope_core::EventSink;
use browserscope_core::FileEventSink;
use browserscope_core::InMemoryCache;
use browserscope_core::InMemoryEntityStore;
use browserscope_core::InMemoryWorkQueue;
use browserscope_core::LevelSelector;
use browserscope_core::NoopEventSink;
use browserscope_core::OTHER_FAMILY;
use browserscope_core::ParamsString;
use browserscope_core::StatsPipeline;
use browserscope_core::StatsTable;
use browserscope_core::StderrEventSink;
use browserscope_core::SubmissionId;
use browserscope_core::SubmitRequest;
use browserscope_core::SweepReport;
use browserscope_core::Timestamp;
use browserscope_core::hash_ip;
use browserscope_store_sqlite::SqliteEntityStore;
use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "browserscope", version, disable_help_subcommand = true)]
struct Cli {
    /// Optional config file path (defaults to browserscope.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit one test run and reconcile it.
    Submit(SubmitCommand),
    /// Reconcile submissions that are still dirty.
    Sweep(SweepCommand),
    /// Print category stats for one version level.
    Stats(StatsCommand),
    /// Print the browser list for one version level.
    Browsers(BrowsersCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `submit` command.
#[derive(Args, Debug)]
struct SubmitCommand {
    /// Test category.
    #[arg(long)]
    category: String,
    /// Raw user agent string.
    #[arg(long, value_name = "UA")]
    user_agent: String,
    /// Results string (`key=value,key=value`).
    #[arg(long)]
    results: String,
    /// Submitter address; hashed before it is stored.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,
    /// Optional params string for parameterized test sets.
    #[arg(long)]
    params: Option<String>,
    /// Mark the submission as a bulk import.
    #[arg(long = "import", action = ArgAction::SetTrue)]
    is_import: bool,
    /// User agent reported by script.
    #[arg(long)]
    js_user_agent: Option<String>,
    /// Document mode reported by script.
    #[arg(long)]
    js_document_mode: Option<String>,
    /// Creation time in unix milliseconds (defaults to now).
    #[arg(long, value_name = "MILLIS")]
    created_ms: Option<i64>,
}

/// Arguments for the `sweep` command.
#[derive(Args, Debug)]
struct SweepCommand {
    /// Maximum submissions to reconcile (defaults to the configured batch size).
    #[arg(long)]
    limit: Option<usize>,
}

/// Arguments for the `stats` command.
#[derive(Args, Debug)]
struct StatsCommand {
    /// Test category.
    #[arg(long)]
    category: String,
    /// Version level: `top`, or 0-3 for family, major, minor, full.
    #[arg(long, default_value = "top", value_parser = parse_level)]
    level: LevelSelector,
    /// Optional params string for parameterized test sets.
    #[arg(long)]
    params: Option<String>,
}

/// Arguments for the `browsers` command.
#[derive(Args, Debug)]
struct BrowsersCommand {
    /// Test category.
    #[arg(long)]
    category: String,
    /// Version level: `top`, or 0-3 for family, major, minor, full.
    #[arg(long, default_value = "top", value_parser = parse_level)]
    level: LevelSelector,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Check,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Output of the `submit` command.
#[derive(Debug, Serialize)]
struct SubmitOutput {
    /// Stored submission id.
    submission_id: SubmissionId,
    /// Category of the submission.
    category: Category,
    /// Pretty browser label of the submitter.
    browser: BrowserLabel,
    /// Stored creation time in unix milliseconds.
    created_ms: Option<i64>,
    /// Number of stored scores.
    scores: usize,
    /// Queue drain summary.
    drain: DrainSummary,
}

/// Output of the `sweep` command.
#[derive(Debug, Serialize)]
struct SweepOutput {
    /// Submissions reconciled by the sweep.
    reconciled: usize,
    /// Submissions whose pass failed, with the error.
    errors: Vec<(SubmissionId, String)>,
    /// Queue drain summary.
    drain: DrainSummary,
}

/// Output of the `browsers` command.
#[derive(Debug, Serialize)]
struct BrowsersOutput {
    /// Queried category.
    category: Category,
    /// Queried selector.
    level: String,
    /// Browser labels in display order.
    browsers: Vec<BrowserLabel>,
}

/// Output of the `config check` command.
#[derive(Debug, Serialize)]
struct ConfigCheckOutput {
    /// Always `"ok"` when the config validated.
    status: &'static str,
    /// Configured test set categories.
    categories: Vec<String>,
}

/// Queue drain summary without per-job outcomes.
#[derive(Debug, Serialize)]
struct DrainSummary {
    /// Jobs that finished successfully.
    completed: usize,
    /// Extra attempts made for failing jobs.
    retries: usize,
    /// Jobs abandoned after the attempt limit.
    failed: usize,
}

impl From<&DrainReport> for DrainSummary {
    fn from(report: &DrainReport) -> Self {
        Self {
            completed: report.completed,
            retries: report.retries,
            failed: report.failed,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = BrowserscopeConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    match cli.command {
        Commands::Submit(command) => write_json(&command_submit(&config, command)?),
        Commands::Sweep(command) => write_json(&command_sweep(&config, &command)?),
        Commands::Stats(command) => write_json(&command_stats(&config, &command)?),
        Commands::Browsers(command) => write_json(&command_browsers(&config, &command)?),
        Commands::Config {
            command: ConfigCommand::Check,
        } => write_json(&command_config_check(&config)),
    }?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Pipeline Wiring
// ============================================================================

/// Pipeline plus the collaborators commands reach directly.
struct Wiring {
    /// Fully wired pipeline.
    pipeline: StatsPipeline,
    /// Drainable work queue.
    queue: Arc<InMemoryWorkQueue>,
    /// Entity store shared with the pipeline.
    store: Arc<dyn EntityStore>,
}

/// Builds the pipeline and its drainable queue from a validated config.
fn open_pipeline(config: &BrowserscopeConfig) -> CliResult<Wiring> {
    let store: Arc<dyn EntityStore> = match config.store.store_type {
        StoreType::Memory => Arc::new(InMemoryEntityStore::new()),
        StoreType::Sqlite => {
            let sqlite = config
                .store
                .sqlite_config()
                .ok_or_else(|| CliError::new("sqlite store requires path".to_string()))?;
            let store = SqliteEntityStore::new(sqlite)
                .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
            Arc::new(store)
        }
    };
    let events: Arc<dyn EventSink> = match (config.telemetry.sink, &config.telemetry.path) {
        (TelemetrySinkType::File, Some(path)) => Arc::new(
            FileEventSink::new(path)
                .map_err(|err| CliError::new(format!("failed to open telemetry sink: {err}")))?,
        ),
        (TelemetrySinkType::None, _) => Arc::new(NoopEventSink),
        _ => Arc::new(StderrEventSink),
    };
    let registry = config
        .test_set_registry()
        .map_err(|err| CliError::new(format!("failed to build test sets: {err}")))?;
    let cache = Arc::new(InMemoryCache::with_max_entries(config.cache.max_entries));
    let queue = Arc::new(InMemoryWorkQueue::with_capacity(config.queue.capacity));
    let pipeline = StatsPipeline::new(
        Arc::clone(&store),
        cache,
        queue.clone(),
        events,
        registry,
        config.pipeline_settings(),
    );
    Ok(Wiring {
        pipeline,
        queue,
        store,
    })
}

/// Drains every queued job.
fn drain(pipeline: &StatsPipeline, queue: &InMemoryWorkQueue) -> CliResult<DrainReport> {
    pipeline
        .runner()
        .drain(queue)
        .map_err(|err| CliError::new(format!("failed to drain queue: {err}")))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `submit` command.
fn command_submit(config: &BrowserscopeConfig, command: SubmitCommand) -> CliResult<SubmitOutput> {
    let wiring = open_pipeline(config)?;
    let category = Category::new(command.category);
    let created = match command.created_ms {
        Some(millis) => Timestamp::UnixMillis(millis),
        None => Timestamp::UnixMillis(now_millis()?),
    };
    let request = SubmitRequest {
        ip_hash: hash_ip(&command.ip),
        user_agent: command.user_agent,
        results: command.results,
        is_import: command.is_import,
        params: command.params,
        js_user_agent: command.js_user_agent,
        js_document_mode: command.js_document_mode,
        created,
    };
    let record = wiring
        .pipeline
        .submit(&category, request)
        .map_err(|err| CliError::new(format!("submission rejected: {err}")))?;
    let report = drain(&wiring.pipeline, &wiring.queue)?;
    let scores = wiring
        .store
        .load_scores(record.id)
        .map_err(|err| CliError::new(format!("failed to read scores: {err}")))?
        .len();
    let browser = wiring
        .store
        .load_user_agent(&record.user_agent_key)
        .map_err(|err| CliError::new(format!("failed to read user agent: {err}")))?
        .map_or_else(|| BrowserLabel::new(OTHER_FAMILY), |info| info.pretty());
    Ok(SubmitOutput {
        submission_id: record.id,
        category,
        browser,
        created_ms: record.created.as_unix_millis(),
        scores,
        drain: DrainSummary::from(&report),
    })
}

/// Executes the `sweep` command.
fn command_sweep(config: &BrowserscopeConfig, command: &SweepCommand) -> CliResult<SweepOutput> {
    let wiring = open_pipeline(config)?;
    let limit = command.limit.unwrap_or(wiring.pipeline.settings().sweep_batch_size);
    let sweep: SweepReport = wiring
        .pipeline
        .runner()
        .sweep_dirty(limit)
        .map_err(|err| CliError::new(format!("sweep failed: {err}")))?;
    let report = drain(&wiring.pipeline, &wiring.queue)?;
    Ok(SweepOutput {
        reconciled: sweep.reconciled.len(),
        errors: sweep.errors,
        drain: DrainSummary::from(&report),
    })
}

/// Executes the `stats` command.
fn command_stats(config: &BrowserscopeConfig, command: &StatsCommand) -> CliResult<StatsTable> {
    let wiring = open_pipeline(config)?;
    let params = ParamsString::parse(command.params.as_deref())
        .map_err(|err| CliError::new(format!("invalid params: {err}")))?;
    wiring
        .pipeline
        .category_stats(&Category::new(command.category.as_str()), command.level, params.as_ref())
        .map_err(|err| CliError::new(format!("failed to read stats: {err}")))
}

/// Executes the `browsers` command.
fn command_browsers(
    config: &BrowserscopeConfig,
    command: &BrowsersCommand,
) -> CliResult<BrowsersOutput> {
    let wiring = open_pipeline(config)?;
    let category = Category::new(command.category.as_str());
    let browsers = wiring
        .pipeline
        .index()
        .browsers(&category, command.level)
        .map_err(|err| CliError::new(format!("failed to read browsers: {err}")))?;
    Ok(BrowsersOutput {
        category,
        level: command.level.to_string(),
        browsers,
    })
}

/// Executes the `config check` command.
fn command_config_check(config: &BrowserscopeConfig) -> ConfigCheckOutput {
    ConfigCheckOutput {
        status: "ok",
        categories: config.test_sets.iter().map(|set| set.category.clone()).collect(),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a level selector argument.
fn parse_level(value: &str) -> Result<LevelSelector, String> {
    LevelSelector::from_str(value).map_err(|err| err.to_string())
}

/// Returns the current time in unix milliseconds.
fn now_millis() -> CliResult<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CliError::new(format!("system clock before unix epoch: {err}")))?;
    i64::try_from(elapsed.as_millis())
        .map_err(|_| CliError::new("system clock out of range".to_string()))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
    write_stdout_line(&output)
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

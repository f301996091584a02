// crates/browserscope-core/src/runtime/mod.rs
// ============================================================================
// Module: Browserscope Runtime
// Description: Pipeline services and in-memory collaborator implementations.
// Purpose: Ingest, reconcile, index, and serve aggregate browser stats.
// Dependencies: crate::{core, interfaces, telemetry}
// ============================================================================

//! ## Overview
//! Runtime modules implement the stats pipeline: ingestion, dirty
//! reconciliation, browser version indexing, the stats cache, and the job
//! runner that ties them together. In-memory store, cache, and queue
//! implementations back tests and local runs.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod browser_index;
pub mod cache;
pub mod ingest;
pub mod pipeline;
pub mod policy;
pub mod queue;
pub mod reconciler;
pub mod stats_cache;
pub mod store;
pub mod test_set;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use browser_index::BROWSER_LEVELS_NAMESPACE;
pub use browser_index::BrowserVersionIndex;
pub use browser_index::IndexError;
pub use browser_index::TOP_BROWSERS;
pub use browser_index::insort_browser;
pub use browser_index::key_name;
pub use browser_index::sort_browsers;
pub use browser_index::top_browsers;
pub use cache::InMemoryCache;
pub use ingest::IngestError;
pub use ingest::ResultStore;
pub use ingest::SubmitRequest;
pub use pipeline::DEFAULT_SWEEP_BATCH_SIZE;
pub use pipeline::PipelineSettings;
pub use pipeline::StatsPipeline;
pub use policy::DEFAULT_MAX_RESULTS_BYTES;
pub use policy::DEFAULT_MAX_TESTS_PER_SUBMISSION;
pub use policy::Environment;
pub use policy::IngestLimits;
pub use policy::ReconcilePolicy;
pub use queue::InMemoryWorkQueue;
pub use reconciler::DirtyReconciler;
pub use reconciler::FoldFailure;
pub use reconciler::ReconcileError;
pub use reconciler::ReconcileOutcome;
pub use reconciler::ReconcileReport;
pub use stats_cache::DEFAULT_STATS_TTL;
pub use stats_cache::STATS_NAMESPACE_PREFIX;
pub use stats_cache::StatsCache;
pub use stats_cache::StatsError;
pub use stats_cache::stats_namespace;
pub use store::InMemoryEntityStore;
pub use test_set::ScoreAdjustment;
pub use test_set::ScoreKind;
pub use test_set::StaticTestSet;
pub use test_set::TestDefinition;
pub use test_set::TestSetRegistry;
pub use worker::DEFAULT_MAX_ATTEMPTS;
pub use worker::DrainReport;
pub use worker::JobError;
pub use worker::JobOutcome;
pub use worker::JobRunner;
pub use worker::SweepReport;

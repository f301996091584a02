// crates/browserscope-core/src/lib.rs
// ============================================================================
// Module: Browserscope Core Library
// Description: Public API surface for the Browserscope stats pipeline.
// Purpose: Expose core types, collaborator interfaces, and runtime services.
// Dependencies: crate::{core, interfaces, runtime, telemetry}
// ============================================================================

//! ## Overview
//! Browserscope core ingests browser test results, folds them into per-browser
//! rankers through asynchronous reconciliation, groups browsers by version
//! level, and serves cached aggregate statistics. Storage, caching, and job
//! delivery are reached through explicit interfaces so hosts can plug in their
//! own backends; in-memory reference implementations ship in [`runtime`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CATEGORY_QUEUE;
pub use interfaces::CacheBackend;
pub use interfaces::CacheError;
pub use interfaces::CategoryUpdateJob;
pub use interfaces::DIRTY_QUEUE;
pub use interfaces::EntityStore;
pub use interfaces::FoldOutcome;
pub use interfaces::Job;
pub use interfaces::ParsedResults;
pub use interfaces::ParsedScore;
pub use interfaces::QueueError;
pub use interfaces::ReconcileJob;
pub use interfaces::StoreError;
pub use interfaces::TestSet;
pub use interfaces::TestSetError;
pub use interfaces::WorkQueue;
pub use runtime::BROWSER_LEVELS_NAMESPACE;
pub use runtime::BrowserVersionIndex;
pub use runtime::DEFAULT_MAX_ATTEMPTS;
pub use runtime::DEFAULT_MAX_RESULTS_BYTES;
pub use runtime::DEFAULT_MAX_TESTS_PER_SUBMISSION;
pub use runtime::DEFAULT_STATS_TTL;
pub use runtime::DEFAULT_SWEEP_BATCH_SIZE;
pub use runtime::DirtyReconciler;
pub use runtime::DrainReport;
pub use runtime::Environment;
pub use runtime::FoldFailure;
pub use runtime::InMemoryCache;
pub use runtime::InMemoryEntityStore;
pub use runtime::InMemoryWorkQueue;
pub use runtime::IndexError;
pub use runtime::IngestError;
pub use runtime::IngestLimits;
pub use runtime::JobError;
pub use runtime::JobOutcome;
pub use runtime::JobRunner;
pub use runtime::PipelineSettings;
pub use runtime::ReconcileError;
pub use runtime::ReconcileOutcome;
pub use runtime::ReconcilePolicy;
pub use runtime::ReconcileReport;
pub use runtime::ResultStore;
pub use runtime::ScoreAdjustment;
pub use runtime::ScoreKind;
pub use runtime::StaticTestSet;
pub use runtime::StatsCache;
pub use runtime::StatsError;
pub use runtime::StatsPipeline;
pub use runtime::SubmitRequest;
pub use runtime::SweepReport;
pub use runtime::TestDefinition;
pub use runtime::TOP_BROWSERS;
pub use runtime::TestSetRegistry;
pub use runtime::insort_browser;
pub use runtime::key_name;
pub use runtime::sort_browsers;
pub use runtime::stats_namespace;
pub use runtime::top_browsers;
pub use telemetry::EventLevel;
pub use telemetry::EventRecord;
pub use telemetry::EventSink;
pub use telemetry::FileEventSink;
pub use telemetry::MemoryEventSink;
pub use telemetry::NoopEventSink;
pub use telemetry::StatsEvent;
pub use telemetry::StderrEventSink;

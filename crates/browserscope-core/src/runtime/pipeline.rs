// crates/browserscope-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Browserscope Stats Pipeline
// Description: Wiring of the pipeline services over shared collaborators.
// Purpose: Build every service once and expose category-level entry points.
// Dependencies: crate::{core, interfaces, runtime, telemetry}, serde
// ============================================================================

//! ## Overview
//! [`StatsPipeline::new`] builds the result store, reconciler, browser index,
//! stats cache, and job runner over one set of collaborators. Services are
//! stateless apart from their `Arc` handles and are cheap to clone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::core::BrowserLabel;
use crate::core::Category;
use crate::core::LevelSelector;
use crate::core::ParamsString;
use crate::core::StatsTable;
use crate::core::SubmissionRecord;
use crate::interfaces::CacheBackend;
use crate::interfaces::EntityStore;
use crate::interfaces::WorkQueue;
use crate::runtime::browser_index::BrowserVersionIndex;
use crate::runtime::browser_index::IndexError;
use crate::runtime::ingest::IngestError;
use crate::runtime::ingest::ResultStore;
use crate::runtime::ingest::SubmitRequest;
use crate::runtime::policy::IngestLimits;
use crate::runtime::policy::ReconcilePolicy;
use crate::runtime::reconciler::DirtyReconciler;
use crate::runtime::stats_cache::DEFAULT_STATS_TTL;
use crate::runtime::stats_cache::StatsCache;
use crate::runtime::stats_cache::StatsError;
use crate::runtime::test_set::TestSetRegistry;
use crate::runtime::worker::DEFAULT_MAX_ATTEMPTS;
use crate::runtime::worker::JobRunner;
use crate::telemetry::EventSink;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Default number of submissions reconciled per sweep.
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;

/// Pipeline tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Stats gating policy.
    pub policy: ReconcilePolicy,
    /// Submission size limits.
    pub limits: IngestLimits,
    /// TTL applied to cached stats bundles.
    pub stats_ttl: Option<Duration>,
    /// Attempt limit per background job.
    pub max_attempts: u32,
    /// Submissions reconciled per sweep.
    pub sweep_batch_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            policy: ReconcilePolicy::default(),
            limits: IngestLimits::default(),
            stats_ttl: Some(DEFAULT_STATS_TTL),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Fully wired stats pipeline.
#[derive(Clone)]
pub struct StatsPipeline {
    /// Test sets by category.
    registry: Arc<TestSetRegistry>,
    /// Ingestion service.
    results: ResultStore,
    /// Reconciliation service.
    reconciler: DirtyReconciler,
    /// Browser index service.
    index: BrowserVersionIndex,
    /// Stats cache service.
    stats: StatsCache,
    /// Job runner.
    runner: JobRunner,
    /// Settings the pipeline was built with.
    settings: PipelineSettings,
}

impl StatsPipeline {
    /// Builds every pipeline service over shared collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn CacheBackend>,
        queue: Arc<dyn WorkQueue>,
        events: Arc<dyn EventSink>,
        registry: TestSetRegistry,
        settings: PipelineSettings,
    ) -> Self {
        let registry = Arc::new(registry);
        let results = ResultStore::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&events),
            settings.limits,
        );
        let stats = StatsCache::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&events),
            settings.stats_ttl,
        );
        let index = BrowserVersionIndex::new(Arc::clone(&store), cache, Arc::clone(&events));
        let reconciler = DirtyReconciler::new(
            Arc::clone(&store),
            queue,
            stats.clone(),
            Arc::clone(&registry),
            settings.policy.clone(),
            Arc::clone(&events),
        );
        let runner = JobRunner::new(
            store,
            reconciler.clone(),
            index.clone(),
            stats.clone(),
            Arc::clone(&registry),
            events,
            settings.max_attempts,
        );
        Self {
            registry,
            results,
            reconciler,
            index,
            stats,
            runner,
            settings,
        }
    }

    /// Submits results for a registered category.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidArgument`] for unregistered categories and
    /// any error of [`ResultStore::add_result`].
    pub fn submit(
        &self,
        category: &Category,
        request: SubmitRequest,
    ) -> Result<SubmissionRecord, IngestError> {
        let test_set = self
            .registry
            .get(category)
            .ok_or_else(|| IngestError::InvalidArgument(format!("unknown category: {category}")))?;
        self.results.add_result(test_set.as_ref(), request)
    }

    /// Returns stats for a category's browsers at one selector.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::UnknownCategory`] for unregistered categories and
    /// [`StatsError::Store`] for store failures.
    pub fn category_stats(
        &self,
        category: &Category,
        selector: LevelSelector,
        params: Option<&ParamsString>,
    ) -> Result<StatsTable, StatsError> {
        let test_set = self
            .registry
            .get(category)
            .ok_or_else(|| StatsError::UnknownCategory(category.to_string()))?;
        let browsers: Vec<BrowserLabel> = self
            .index
            .browsers(category, selector)
            .map_err(|err: IndexError| StatsError::Store(err.to_string()))?;
        self.stats.get_stats(test_set.as_ref(), &browsers, params, true)
    }

    /// Returns the test set registry.
    #[must_use]
    pub fn registry(&self) -> &TestSetRegistry {
        &self.registry
    }

    /// Returns the ingestion service.
    #[must_use]
    pub const fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Returns the reconciliation service.
    #[must_use]
    pub const fn reconciler(&self) -> &DirtyReconciler {
        &self.reconciler
    }

    /// Returns the browser index service.
    #[must_use]
    pub const fn index(&self) -> &BrowserVersionIndex {
        &self.index
    }

    /// Returns the stats cache service.
    #[must_use]
    pub const fn stats(&self) -> &StatsCache {
        &self.stats
    }

    /// Returns the job runner.
    #[must_use]
    pub const fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

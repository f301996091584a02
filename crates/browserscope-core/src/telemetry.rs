// crates/browserscope-core/src/telemetry.rs
// ============================================================================
// Module: Browserscope Telemetry
// Description: Structured pipeline events and JSON-line sinks.
// Purpose: Emit pipeline events without a hard logging dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Pipeline services report notable outcomes as [`StatsEvent`] values. Each
//! event is wrapped in an [`EventRecord`] carrying a wall-clock timestamp and
//! a severity, and handed to an [`EventSink`]. Sinks serialize records as JSON
//! lines so deployments can route them to their own log pipeline. Sink write
//! failures are dropped; telemetry never fails a pipeline operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Routine progress.
    Info,
    /// Degraded but recovered behavior.
    Warn,
    /// Failed operation.
    Error,
}

/// Pipeline event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatsEvent {
    /// A submission was written.
    SubmissionAccepted {
        /// Assigned submission id.
        submission_id: u64,
        /// Submission category.
        category: String,
        /// Number of stored scores.
        tests: usize,
        /// Unknown keys dropped from an import.
        dropped: usize,
    },
    /// A submission was rejected before any write.
    SubmissionRejected {
        /// Submission category.
        category: String,
        /// Rejection reason.
        reason: String,
    },
    /// A job could not be enqueued; the sweep recovers it.
    SchedulingFailed {
        /// Target queue.
        queue: String,
        /// Job category.
        category: String,
        /// Queue error.
        error: String,
    },
    /// A reconciliation pass finished.
    ReconcileCompleted {
        /// Reconciled submission id.
        submission_id: u64,
        /// Scores folded into rankers.
        folded: usize,
        /// Scores found already clean.
        already_clean: usize,
        /// Scores that failed to fold.
        failures: usize,
        /// Whether rankers were updated for the category.
        stats_updated: bool,
        /// Whether the submission has no dirty scores left.
        finished: bool,
    },
    /// A reconciliation request referenced a missing submission.
    ReconcileSkipped {
        /// Requested submission id.
        submission_id: u64,
        /// Skip reason.
        reason: String,
    },
    /// A dirty score referenced a test no longer in its test set.
    UnknownRankerTest {
        /// Score category.
        category: String,
        /// Test key.
        test: String,
    },
    /// Browser index rows changed.
    BrowserIndexUpdated {
        /// Index category.
        category: String,
        /// Level indexes whose rows changed.
        levels: Vec<usize>,
    },
    /// The cache failed and the operation fell back to the store.
    CacheFallback {
        /// Cache namespace.
        namespace: String,
        /// Cache error.
        error: String,
    },
    /// Cached stats could not be invalidated and may be stale until expiry.
    CacheInvalidationFailed {
        /// Cache namespace.
        namespace: String,
        /// Cache error.
        error: String,
    },
    /// Stats bundles were recomputed from rankers.
    StatsRecomputed {
        /// Stats category.
        category: String,
        /// Number of recomputed browsers.
        browsers: usize,
    },
    /// A background job failed and will not be retried further.
    JobFailed {
        /// Job queue.
        queue: String,
        /// Attempts made.
        attempts: u32,
        /// Last error.
        error: String,
    },
}

impl StatsEvent {
    /// Returns the severity of the event.
    #[must_use]
    pub const fn level(&self) -> EventLevel {
        match self {
            Self::SubmissionAccepted {
                ..
            }
            | Self::ReconcileCompleted {
                ..
            }
            | Self::BrowserIndexUpdated {
                ..
            }
            | Self::StatsRecomputed {
                ..
            } => EventLevel::Info,
            Self::SubmissionRejected {
                ..
            }
            | Self::ReconcileSkipped {
                ..
            }
            | Self::UnknownRankerTest {
                ..
            }
            | Self::CacheFallback {
                ..
            }
            | Self::CacheInvalidationFailed {
                ..
            } => EventLevel::Warn,
            Self::SchedulingFailed {
                ..
            }
            | Self::JobFailed {
                ..
            } => EventLevel::Error,
        }
    }
}

/// Timestamped event record written by sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event severity.
    pub level: EventLevel,
    /// Event payload.
    #[serde(flatten)]
    pub event: StatsEvent,
}

impl EventRecord {
    /// Wraps an event with the current timestamp and its severity.
    #[must_use]
    pub fn new(event: StatsEvent) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            level: event.level(),
            event,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Event sink for pipeline telemetry.
pub trait EventSink: Send + Sync {
    /// Records one event record.
    fn record(&self, record: &EventRecord);

    /// Wraps and records an event.
    fn emit(&self, event: StatsEvent) {
        self.record(&EventRecord::new(event));
    }
}

/// Event sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn record(&self, record: &EventRecord) {
        if let Ok(payload) = serde_json::to_string(record) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Event sink that appends JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileEventSink {
    fn record(&self, record: &EventRecord) {
        if let Ok(payload) = serde_json::to_string(record)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Event sink that drops all events.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _record: &EventRecord) {}
}

/// Event sink that keeps records in memory for inspection.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Captured records in emission order.
    records: Mutex<Vec<EventRecord>>,
}

impl MemoryEventSink {
    /// Creates an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns captured records in emission order.
    #[must_use]
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    /// Returns captured event payloads in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<StatsEvent> {
        self.records().into_iter().map(|record| record.event).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, record: &EventRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

// crates/browserscope-core/src/runtime/queue.rs
// ============================================================================
// Module: Browserscope In-Memory Work Queue
// Description: Bounded FIFO job queue for tests and local runs.
// Purpose: Deliver reconciliation and category update jobs in-process.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryWorkQueue`] keeps jobs for every queue name in one FIFO. A full
//! or offline queue rejects jobs with [`QueueError::SchedulingFailure`], the
//! same failure a hosted task queue reports; callers log it and rely on the
//! dirty sweep to recover.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::interfaces::Job;
use crate::interfaces::QueueError;
use crate::interfaces::WorkQueue;

// ============================================================================
// SECTION: In-Memory Queue
// ============================================================================

/// In-memory work queue.
///
/// # Invariants
/// - Never holds more than `capacity` jobs when a bound is set.
#[derive(Debug, Clone)]
pub struct InMemoryWorkQueue {
    /// Pending jobs in delivery order.
    jobs: Arc<Mutex<VecDeque<Job>>>,
    /// Optional job bound.
    capacity: Option<usize>,
    /// When false, enqueue fails.
    online: Arc<AtomicBool>,
}

impl Default for InMemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorkQueue {
    /// Creates an unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a queue with an optional job bound.
    #[must_use]
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Switches the queue online or offline.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Removes and returns the next job.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the queue lock is poisoned.
    pub fn pop(&self) -> Result<Option<Job>, QueueError> {
        Ok(self.lock()?.pop_front())
    }

    /// Returns a snapshot of pending jobs in delivery order.
    #[must_use]
    pub fn pending(&self) -> Vec<Job> {
        self.jobs.lock().map(|jobs| jobs.iter().cloned().collect()).unwrap_or_default()
    }

    /// Returns the number of pending jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or_default()
    }

    /// Returns true when no jobs are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks the pending jobs.
    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<Job>>, QueueError> {
        self.jobs
            .lock()
            .map_err(|_| QueueError::SchedulingFailure("work queue mutex poisoned".to_string()))
    }
}

impl WorkQueue for InMemoryWorkQueue {
    fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(QueueError::SchedulingFailure(format!(
                "queue {} offline",
                job.queue_name()
            )));
        }
        let mut jobs = self.lock()?;
        if let Some(capacity) = self.capacity
            && jobs.len() >= capacity
        {
            return Err(QueueError::SchedulingFailure(format!(
                "queue {} full (capacity {capacity})",
                job.queue_name()
            )));
        }
        jobs.push_back(job);
        drop(jobs);
        Ok(())
    }
}

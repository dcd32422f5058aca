//! Run-wide progress: completed / success / failure counters against a fixed total.
//!
//! Counters live behind one mutex so every snapshot is internally consistent
//! (`success + failure == completed`) even when many tasks settle at once.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Snapshot of run progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskProgress {
    pub completed: usize,
    pub total: usize,
    /// `round(completed / total * 100)`, or 0 when `total == 0`.
    pub percentage: u8,
    pub success: usize,
    pub failure: usize,
}

impl TaskProgress {
    fn new(total: usize, success: usize, failure: usize) -> Self {
        let completed = success + failure;
        Self {
            completed,
            total,
            percentage: percentage(completed as u64, total as u64),
            success,
            failure,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }
}

/// Rounded integer percentage; 0 when the total is unknown or zero.
pub fn percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (done as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[derive(Debug, Default)]
struct Counts {
    success: usize,
    failure: usize,
}

/// Aggregates settlements for one run. The total is fixed at construction.
#[derive(Debug)]
pub struct Aggregator {
    total: usize,
    counts: Mutex<Counts>,
}

impl Aggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            counts: Mutex::new(Counts::default()),
        }
    }

    /// Counts resources already done before the run started (skipped work).
    pub fn preload_done(&self, n: usize) -> TaskProgress {
        let mut c = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        c.success += n;
        TaskProgress::new(self.total, c.success, c.failure)
    }

    /// Records one non-aborted settlement and returns the resulting snapshot.
    pub fn record(&self, success: bool) -> TaskProgress {
        let mut c = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        if success {
            c.success += 1;
        } else {
            c.failure += 1;
        }
        TaskProgress::new(self.total, c.success, c.failure)
    }

    pub fn snapshot(&self) -> TaskProgress {
        let c = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        TaskProgress::new(self.total, c.success, c.failure)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

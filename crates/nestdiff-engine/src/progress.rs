//! Progress reporting for a comparison run.
//!
//! Work is counted in abstract units. Each container pairing opens a
//! [`ProgressScope`] announcing how many units it expects and steps through
//! them as members are paired; the shared [`Progress`] counter forwards every
//! step to a [`ProgressSink`]. Totals only grow, so a sink sees `done <= total`
//! at every callback, and `done == total` once the run completes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

/// Receives progress updates.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, done: u64, total: u64, message: &str);
}

/// A sink that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _done: u64, _total: u64, _message: &str) {}
}

/// A sink that logs each update at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, done: u64, total: u64, message: &str) {
        info!(done, total, message, "progress");
    }
}

/// Run-wide progress counter.
pub struct Progress {
    sink: Arc<dyn ProgressSink>,
    done: AtomicU64,
    total: AtomicU64,
}

impl Progress {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            done: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// A counter with no observer.
    pub fn silent() -> Self {
        Self::new(Arc::new(NoProgress))
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Announce `units` of upcoming work.
    pub fn scope(&self, units: u64) -> ProgressScope<'_> {
        self.total.fetch_add(units, Ordering::SeqCst);
        ProgressScope {
            progress: self,
            budget: units,
            used: 0,
        }
    }

    fn advance(&self, units: u64, message: &str) {
        let done = self.done.fetch_add(units, Ordering::SeqCst) + units;
        let total = self.total.load(Ordering::SeqCst).max(done);
        self.sink.on_progress(done, total, message);
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("done", &self.done())
            .field("total", &self.total())
            .finish()
    }
}

/// A block of announced work. Unused units are completed on drop.
#[derive(Debug)]
pub struct ProgressScope<'a> {
    progress: &'a Progress,
    budget: u64,
    used: u64,
}

impl ProgressScope<'_> {
    /// Complete `units` of work. Stepping past the announced budget grows the
    /// run total instead of overshooting it.
    pub fn step(&mut self, units: u64, message: &str) {
        let remaining = self.budget - self.used;
        if units > remaining {
            let extra = units - remaining;
            self.progress.total.fetch_add(extra, Ordering::SeqCst);
            self.budget += extra;
        }
        self.used += units;
        self.progress.advance(units, message);
    }
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        let remaining = self.budget - self.used;
        if remaining > 0 {
            self.used = self.budget;
            self.progress.advance(remaining, "");
        }
    }
}

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Returned when a [`ProgressMonitor`] observes cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cooperative cancellation and progress reporting for a refactoring run.
///
/// Cancellation is checked, never preemptive: stages call [`ProgressMonitor::check_cancelled`]
/// at well-defined points (stage starts, between composite change children). Progress is
/// reported through `tracing` trace events.
#[derive(Clone, Debug, Default)]
pub struct ProgressMonitor {
    token: CancellationToken,
    worked: Arc<AtomicU64>,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            worked: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// A monitor whose token is cancelled with (but does not cancel) this one.
    pub fn child(&self) -> Self {
        Self::with_token(self.token.child_token())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), Cancelled> {
        if self.token.is_cancelled() {
            tracing::debug!(target: "refract.progress", "cancellation observed");
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn begin_task(&self, name: &str, total_work: u64) {
        self.worked.store(0, Ordering::Relaxed);
        tracing::trace!(target: "refract.progress", task = name, total_work, "begin task");
    }

    pub fn subtask(&self, name: &str) {
        tracing::trace!(target: "refract.progress", subtask = name, "subtask");
    }

    pub fn worked(&self, units: u64) {
        let total = self.worked.fetch_add(units, Ordering::Relaxed) + units;
        tracing::trace!(target: "refract.progress", worked = total, "progress");
    }

    /// Units of work reported since the last [`ProgressMonitor::begin_task`].
    pub fn work_done(&self) -> u64 {
        self.worked.load(Ordering::Relaxed)
    }

    pub fn done(&self) {
        tracing::trace!(target: "refract.progress", worked = self.work_done(), "task done");
    }
}

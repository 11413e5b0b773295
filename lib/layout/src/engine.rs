use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Which layout strategy is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Fruchterman–Reingold, runs to convergence and stops.
    #[default]
    Static,
    /// ARF, runs until stopped.
    Dynamic,
}

/// Engine state. An engine is `Running` from a successful `start()` until
/// either `stop()` returns or the run ends by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    Stopped,
    Running,
}

/// A layout strategy that computes positions on its own thread.
///
/// `start` on a running engine is a no-op. `stop` blocks until the
/// background thread has exited, so once it returns the engine no longer
/// writes to the graph.
pub trait LayoutEngine: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn is_stopped(&self) -> bool;
    fn is_dynamic(&self) -> bool;
    fn kind(&self) -> LayoutKind;

    fn state(&self) -> LayoutState {
        if self.is_stopped() {
            LayoutState::Stopped
        } else {
            LayoutState::Running
        }
    }
}

/// Notifications from the layout threads to whoever frames the view.
#[derive(Debug, Default)]
pub struct LayoutSignals {
    reframe: AtomicBool,
    completed_runs: AtomicU64,
}

impl LayoutSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a run has converged and the view should be re-framed.
    pub fn request_reframe(&self) {
        self.completed_runs.fetch_add(1, Ordering::AcqRel);
        self.reframe.store(true, Ordering::Release);
    }

    /// Returns and clears the pending re-frame request.
    pub fn take_reframe_request(&self) -> bool {
        self.reframe.swap(false, Ordering::AcqRel)
    }

    /// Number of runs that finished on their own.
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::Acquire)
    }
}

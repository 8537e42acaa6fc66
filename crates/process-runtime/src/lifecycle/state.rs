//! Worker state cell.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Transitions kept for diagnostics.
const HISTORY_LIMIT: usize = 64;

/// Lifecycle state of a worker.
///
/// ```text
/// Stopped ─start→ Starting ─ok→ Running ─stop→ Stopping ─→ Stopped
///                    │
///                    └─fail→ Faulted ─unwind→ Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkerState {
    /// Nothing held; `start` is allowed.
    Stopped,
    /// Bootstrap in progress.
    Starting,
    /// Consuming envelopes.
    Running,
    /// Shutdown in progress.
    Stopping,
    /// Bootstrap failed; unwind in progress.
    Faulted,
}

struct Inner {
    current: WorkerState,
    history: VecDeque<WorkerState>,
}

/// The single mutable state of one worker.
pub struct WorkerStateCell {
    inner: Mutex<Inner>,
    watch_tx: watch::Sender<WorkerState>,
}

impl WorkerStateCell {
    /// Create a cell in `Stopped`.
    #[must_use]
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(WorkerState::Stopped);
        Self {
            inner: Mutex::new(Inner {
                current: WorkerState::Stopped,
                history: VecDeque::from([WorkerState::Stopped]),
            }),
            watch_tx,
        }
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> WorkerState {
        self.inner.lock().current
    }

    /// Move `Stopped → Starting`. On any other state, returns it unchanged.
    pub fn try_begin_start(&self) -> Result<(), WorkerState> {
        let mut inner = self.inner.lock();
        if inner.current != WorkerState::Stopped {
            return Err(inner.current);
        }
        Self::record(&mut inner, WorkerState::Starting);
        drop(inner);

        self.watch_tx.send_replace(WorkerState::Starting);
        Ok(())
    }

    pub(crate) fn set(&self, state: WorkerState) {
        let mut inner = self.inner.lock();
        let previous = inner.current;
        Self::record(&mut inner, state);
        drop(inner);

        debug!(from = ?previous, to = ?state, "Worker state changed");
        self.watch_tx.send_replace(state);
    }

    fn record(inner: &mut Inner, state: WorkerState) {
        inner.current = state;
        if inner.history.len() == HISTORY_LIMIT {
            inner.history.pop_front();
        }
        inner.history.push_back(state);
    }

    /// Recent states, oldest first, starting with the initial `Stopped`.
    #[must_use]
    pub fn history(&self) -> Vec<WorkerState> {
        self.inner.lock().history.iter().copied().collect()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.watch_tx.subscribe()
    }
}

impl Default for WorkerStateCell {
    fn default() -> Self {
        Self::new()
    }
}

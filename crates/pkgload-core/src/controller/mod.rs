//! Load controller: the run lifecycle state machine.
//!
//! ```text
//! Idle ──start──▶ Running ──drained──▶ Completed ──start──▶ Running
//!                    │  ▲
//!                  stop resume
//!                    ▼  │
//!                  Stopped
//! ```
//!
//! `start()` and `resume()` drive one whole run and resolve once it has
//! drained. `stop()` only signals the run's cancellation token; the run then
//! settles into `Stopped` as in-flight tasks observe it. A run that fails
//! before any work is scheduled (no manifest, manifest fetch failure, no
//! base location) returns the error and leaves the state as it was before
//! the call, unless the run was stopped meanwhile: then it settles into
//! `Stopped` with the checkpoint untouched. Dropping the `start()` /
//! `resume()` future cancels the run and leaves the controller `Stopped`
//! (or in its previous state if nothing was scheduled yet).

mod options;
mod run;
mod state;

pub use options::{Filter, LoadOptions};
pub use state::LoadState;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointHandle;
use crate::error::{LoadError, Operation};
use crate::observer::LoadObserver;
use crate::progress::{Aggregator, TaskProgress};
use crate::transport::Transport;

use run::RunClaim;

/// Outcome of one `start()` / `resume()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub state: LoadState,
    pub progress: TaskProgress,
}

#[derive(Default)]
struct Slot {
    state: LoadState,
    cancel: Option<CancellationToken>,
    aggregator: Option<Arc<Aggregator>>,
}

struct Shared {
    options: LoadOptions,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn LoadObserver>,
    slot: Mutex<Slot>,
}

/// Long-lived controller; clones share the same state, so `stop()` can be
/// called from another task (or an observer callback) while a run is active.
#[derive(Clone)]
pub struct LoadController {
    shared: Arc<Shared>,
}

impl LoadController {
    pub fn new(
        options: LoadOptions,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn LoadObserver>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                transport,
                observer,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> LoadState {
        self.slot().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoadState::Running
    }

    /// Progress of the current or most recent run.
    pub fn progress(&self) -> TaskProgress {
        self.slot()
            .aggregator
            .as_ref()
            .map(|a| a.snapshot())
            .unwrap_or_default()
    }

    pub fn checkpoint(&self) -> &CheckpointHandle {
        &self.shared.options.checkpoint
    }

    pub fn options(&self) -> &LoadOptions {
        &self.shared.options
    }

    /// Runs the working set, skipping resources the checkpoint marks done.
    /// Allowed in every state except `Running`.
    pub async fn start(&self) -> Result<RunSummary, LoadError> {
        let claim = self.claim(Operation::Start)?;
        self.run(claim).await
    }

    /// Continues a stopped run with the resources still pending.
    ///
    /// The precondition looks at the whole checkpoint; a pending entry that
    /// the current filter excludes still lets the call through, and such a
    /// run schedules nothing and ends `Completed`.
    pub async fn resume(&self) -> Result<RunSummary, LoadError> {
        let claim = self.claim(Operation::Resume)?;
        self.run(claim).await
    }

    /// Signals cancellation to the active run. Returns false (and does
    /// nothing) unless the controller is `Running`.
    pub fn stop(&self) -> bool {
        let slot = self.slot();
        if slot.state != LoadState::Running {
            return false;
        }
        if let Some(cancel) = &slot.cancel {
            tracing::info!("stop requested");
            cancel.cancel();
        }
        true
    }

    /// Checks the transition and marks the controller `Running` under one lock.
    fn claim(&self, operation: Operation) -> Result<RunClaim, LoadError> {
        let mut slot = self.slot();
        let state = slot.state;
        let allowed = match operation {
            Operation::Start => state != LoadState::Running,
            Operation::Resume => {
                state == LoadState::Stopped && self.shared.options.checkpoint.has_pending()
            }
        };
        if !allowed {
            return Err(LoadError::InvalidState { operation, state });
        }
        let cancel = self
            .shared
            .options
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_else(CancellationToken::new);
        slot.state = LoadState::Running;
        slot.cancel = Some(cancel.clone());
        tracing::debug!(%operation, from = %state, "run claimed");
        Ok(RunClaim::new(self.clone(), state, cancel))
    }

    fn revert(&self, previous: LoadState) {
        let mut slot = self.slot();
        slot.state = previous;
        slot.cancel = None;
    }

    /// Final transition of a run; returns the settled summary.
    fn settle_state(&self, state: LoadState, aggregator: &Aggregator) -> RunSummary {
        {
            let mut slot = self.slot();
            slot.state = state;
            slot.cancel = None;
        }
        RunSummary {
            state,
            progress: aggregator.snapshot(),
        }
    }

    fn install_aggregator(&self, aggregator: Arc<Aggregator>) {
        self.slot().aggregator = Some(aggregator);
    }
}

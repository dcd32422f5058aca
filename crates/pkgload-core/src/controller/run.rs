//! One run: resolve, partition by checkpoint, schedule, settle, finalize.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{LoadController, LoadState, RunSummary};
use crate::checkpoint::CheckpointStatus;
use crate::error::LoadError;
use crate::manifest::{resolve_base, resolve_manifest, resource_url, Descriptor};
use crate::observer::StateChange;
use crate::progress::Aggregator;
use crate::scheduler::BoundedScheduler;
use crate::task::{FetchTask, TaskOutcome, TaskResult};

/// Ownership of the `Running` state for one run.
///
/// If the run future is dropped before it settles, the guard cancels the run
/// and moves the controller out of `Running`: back to the previous state while
/// nothing has been scheduled, to `Stopped` afterwards.
pub(super) struct RunClaim {
    controller: LoadController,
    previous: LoadState,
    cancel: CancellationToken,
    on_drop: Option<LoadState>,
}

impl RunClaim {
    pub(super) fn new(
        controller: LoadController,
        previous: LoadState,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            controller,
            previous,
            cancel,
            on_drop: Some(previous),
        }
    }

    fn scheduled(&mut self) {
        self.on_drop = Some(LoadState::Stopped);
    }

    fn disarm(&mut self) {
        self.on_drop = None;
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        if let Some(state) = self.on_drop.take() {
            tracing::warn!(restored = %state, "run dropped before settling");
            self.cancel.cancel();
            self.controller.revert(state);
        }
    }
}

struct Work {
    descriptor: Descriptor,
    url: String,
}

struct RunPlan {
    package: String,
    total: usize,
    done: usize,
    backlog: Vec<Work>,
}

impl LoadController {
    pub(super) async fn run(&self, mut claim: RunClaim) -> Result<RunSummary, LoadError> {
        let plan = match self.prepare(&claim.cancel).await {
            Ok(plan) => plan,
            Err(e) if claim.cancel.is_cancelled() => {
                // Stopped during setup: the checkpoint was never touched.
                tracing::debug!(error = %e, "run stopped during setup");
                claim.disarm();
                let aggregator = Arc::new(Aggregator::new(0));
                self.install_aggregator(Arc::clone(&aggregator));
                return Ok(self.finish(LoadState::Stopped, &aggregator));
            }
            Err(e) => {
                tracing::warn!(error = %e, restored = %claim.previous, "run setup failed");
                claim.disarm();
                self.revert(claim.previous);
                return Err(e);
            }
        };
        claim.scheduled();

        let aggregator = Arc::new(Aggregator::new(plan.total));
        let initial = aggregator.preload_done(plan.done);
        self.install_aggregator(Arc::clone(&aggregator));
        tracing::info!(
            package = %plan.package,
            total = plan.total,
            done = plan.done,
            pending = plan.backlog.len(),
            "run started"
        );

        if plan.backlog.is_empty() {
            claim.disarm();
            return Ok(self.finish(LoadState::Completed, &aggregator));
        }
        self.shared
            .observer
            .on_state(&StateChange::new(LoadState::Running, initial));

        let opts = &self.shared.options;
        let mut scheduler = BoundedScheduler::new(opts.concurrency, claim.cancel.clone());
        for work in plan.backlog {
            let task = FetchTask::new(
                work.descriptor,
                work.url,
                opts.retry,
                opts.chunk_progress,
                Arc::clone(&self.shared.transport),
                Arc::clone(&self.shared.observer),
                claim.cancel.clone(),
            );
            scheduler.admit(task.run());
        }
        scheduler
            .drain(|settled| match settled {
                Ok(result) => self.record(result, &aggregator),
                Err(e) => tracing::error!(error = %e, "fetch task panicked"),
            })
            .await;

        let end = if claim.cancel.is_cancelled() {
            LoadState::Stopped
        } else {
            LoadState::Completed
        };
        claim.disarm();
        Ok(self.finish(end, &aggregator))
    }

    /// Everything fallible happens here, before the checkpoint is touched.
    async fn prepare(&self, cancel: &CancellationToken) -> Result<RunPlan, LoadError> {
        let opts = &self.shared.options;
        let source = opts.manifest.as_ref().ok_or_else(|| {
            LoadError::Configuration("no manifest source or value configured".to_string())
        })?;
        let manifest = resolve_manifest(source, &self.shared.transport, cancel).await?;
        let base = resolve_base(
            opts.base_url.as_deref(),
            source.source_url(),
            &manifest.base_prefix,
        )?;

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for descriptor in manifest.files {
            if let Some(filter) = &opts.filter {
                if !filter(&descriptor) {
                    continue;
                }
            }
            if !seen.insert(descriptor.path.clone()) {
                tracing::debug!(path = %descriptor.path, "duplicate manifest entry ignored");
                continue;
            }
            let url = resource_url(&base, &descriptor.path)?.to_string();
            selected.push(Work { descriptor, url });
        }

        let statuses = opts
            .checkpoint
            .seed(selected.iter().map(|w| w.descriptor.path.as_str()));
        let total = selected.len();
        let backlog: Vec<Work> = selected
            .into_iter()
            .zip(statuses)
            .filter(|(_, status)| *status == CheckpointStatus::Pending)
            .map(|(work, _)| work)
            .collect();

        Ok(RunPlan {
            package: manifest.package_name,
            total,
            done: total - backlog.len(),
            backlog,
        })
    }

    /// Checkpoint first, then counters, then notifications; aborted tasks are
    /// not recorded anywhere.
    fn record(&self, result: TaskResult, aggregator: &Aggregator) {
        let path = result.descriptor.path.as_str();
        let success = match &result.outcome {
            TaskOutcome::Succeeded(_) => true,
            TaskOutcome::Failed(_) => false,
            TaskOutcome::Aborted => return,
        };
        let checkpoint = &self.shared.options.checkpoint;
        if success {
            checkpoint.mark_done(path);
        } else {
            checkpoint.mark_pending(path);
        }
        let progress = aggregator.record(success);
        let observer = &self.shared.observer;
        observer.on_progress(&progress);
        observer.on_state(&StateChange::new(LoadState::Running, progress));
    }

    fn finish(&self, state: LoadState, aggregator: &Aggregator) -> RunSummary {
        let summary = self.settle_state(state, aggregator);
        let p = summary.progress;
        tracing::info!(
            state = %state,
            completed = p.completed,
            total = p.total,
            success = p.success,
            failure = p.failure,
            "run finished"
        );
        let observer = &self.shared.observer;
        observer.on_state(&StateChange::new(state, p));
        observer.on_finish(&self.shared.options.checkpoint.snapshot());
        summary
    }
}

//! Resource fetch task: one descriptor, bounded retry, optional chunk progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::manifest::Descriptor;
use crate::observer::LoadObserver;
use crate::progress::percentage;
use crate::retry::{run_with_retry, RetryOutcome, RetryPolicy};
use crate::transport::{self, ChunkFn, Response, Transport};

/// A successfully fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Artifact {
    fn from_response(descriptor: &Descriptor, url: &str, response: Response) -> Self {
        Self {
            path: descriptor.path.clone(),
            url: url.to_string(),
            content_type: response.content_type,
            bytes: response.body,
        }
    }
}

/// Streaming progress for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub loaded: u64,
    pub total: Option<u64>,
    /// `loaded / total` rounded, 0 when the total is unknown.
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded(Artifact),
    Failed(FetchError),
    /// Cancelled; neither success nor failure.
    Aborted,
}

/// Settlement of one resource for one run.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub descriptor: Descriptor,
    pub outcome: TaskOutcome,
    /// Network attempts made, including the aborted one if any.
    pub attempts: u32,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Succeeded(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Aborted)
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match &self.outcome {
            TaskOutcome::Succeeded(a) => Some(a),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.outcome {
            TaskOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Everything needed to fetch one resource within a run.
pub struct FetchTask {
    descriptor: Descriptor,
    url: String,
    policy: RetryPolicy,
    chunk_progress: bool,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn LoadObserver>,
    cancel: CancellationToken,
}

impl FetchTask {
    pub fn new(
        descriptor: Descriptor,
        url: String,
        policy: RetryPolicy,
        chunk_progress: bool,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn LoadObserver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            descriptor,
            url,
            policy,
            chunk_progress,
            transport,
            observer,
            cancel,
        }
    }

    /// Runs the retry sequence. Success/error/completion notifications fire at
    /// most once for the whole sequence, never per attempt.
    pub async fn run(self) -> TaskResult {
        // Shared across attempts so a retry never reports fewer bytes.
        let high_water = Arc::new(AtomicU64::new(0));
        let outcome = run_with_retry(&self.policy, &self.cancel, |attempt| {
            let client = Arc::clone(&self.transport);
            let url = self.url.clone();
            let cancel = self.cancel.clone();
            let on_chunk = self.chunk_callback(&high_water);
            tracing::trace!(path = %self.descriptor.path, attempt, "attempt");
            async move {
                let response = transport::fetch(client, url, cancel, on_chunk).await?;
                if !response.is_success() {
                    return Err(FetchError::Http(response.status));
                }
                Ok(response)
            }
        })
        .await;

        let (outcome, attempts) = match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                let artifact = Artifact::from_response(&self.descriptor, &self.url, value);
                tracing::debug!(path = %self.descriptor.path, attempts, bytes = artifact.bytes.len(), "fetched");
                self.observer.on_success(&artifact, &self.descriptor);
                self.observer.on_complete(&artifact, &self.descriptor);
                (TaskOutcome::Succeeded(artifact), attempts)
            }
            RetryOutcome::Exhausted { error, attempts } => {
                tracing::warn!(path = %self.descriptor.path, attempts, error = %error, "giving up");
                self.observer.on_error(&error, &self.descriptor);
                (TaskOutcome::Failed(error), attempts)
            }
            RetryOutcome::Aborted { attempts } => {
                tracing::debug!(path = %self.descriptor.path, attempts, "aborted");
                (TaskOutcome::Aborted, attempts)
            }
        };
        TaskResult {
            descriptor: self.descriptor,
            outcome,
            attempts,
        }
    }

    fn chunk_callback(&self, high_water: &Arc<AtomicU64>) -> Option<Box<ChunkFn>> {
        if !self.chunk_progress {
            return None;
        }
        let observer = Arc::clone(&self.observer);
        let descriptor = self.descriptor.clone();
        let high_water = Arc::clone(high_water);
        let fallback_total = (descriptor.size > 0).then_some(descriptor.size);
        Some(Box::new(move |loaded: u64, total: Option<u64>| {
            if high_water.fetch_max(loaded, Ordering::Relaxed) >= loaded {
                return;
            }
            let total = total.or(fallback_total);
            let progress = ChunkProgress {
                loaded,
                total,
                percentage: total.map_or(0, |t| percentage(loaded, t)),
            };
            observer.on_chunk(&progress, &descriptor);
        }))
    }
}

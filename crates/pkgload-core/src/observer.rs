//! Run notifications.
//!
//! Every callback has a no-op default so callers implement only what they
//! need. Callbacks run on the controller's tasks (chunk progress on the
//! blocking transfer thread) and must not block for long.

use tokio::sync::mpsc::UnboundedSender;

use crate::checkpoint::Checkpoint;
use crate::controller::LoadState;
use crate::error::FetchError;
use crate::manifest::Descriptor;
use crate::progress::TaskProgress;
use crate::task::{Artifact, ChunkProgress};

/// Payload of a state notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub state: LoadState,
    pub progress: TaskProgress,
    pub is_running: bool,
    pub completed: usize,
    pub total: usize,
}

impl StateChange {
    pub fn new(state: LoadState, progress: TaskProgress) -> Self {
        Self {
            state,
            progress,
            is_running: state == LoadState::Running,
            completed: progress.completed,
            total: progress.total,
        }
    }
}

pub trait LoadObserver: Send + Sync {
    fn on_chunk(&self, _progress: &ChunkProgress, _descriptor: &Descriptor) {}
    fn on_success(&self, _artifact: &Artifact, _descriptor: &Descriptor) {}
    fn on_error(&self, _error: &FetchError, _descriptor: &Descriptor) {}
    fn on_complete(&self, _artifact: &Artifact, _descriptor: &Descriptor) {}
    fn on_progress(&self, _progress: &TaskProgress) {}
    fn on_state(&self, _change: &StateChange) {}
    fn on_finish(&self, _checkpoint: &Checkpoint) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LoadObserver for NoopObserver {}

/// Owned form of every notification, for consumers on another task.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Chunk {
        path: String,
        progress: ChunkProgress,
    },
    Success {
        artifact: Artifact,
        descriptor: Descriptor,
    },
    Error {
        error: FetchError,
        descriptor: Descriptor,
    },
    Complete {
        path: String,
    },
    Progress(TaskProgress),
    State(StateChange),
    Finish(Checkpoint),
}

/// Forwards notifications into an unbounded channel, preserving order.
///
/// The artifact body is sent once, with `Success`; `Complete` carries only the
/// path. Send errors (receiver dropped) are ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<LoadEvent>,
    chunks: bool,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<LoadEvent>) -> Self {
        Self { tx, chunks: false }
    }

    /// Also forward per-chunk progress (noisy).
    pub fn with_chunks(mut self) -> Self {
        self.chunks = true;
        self
    }
}

impl LoadObserver for ChannelObserver {
    fn on_chunk(&self, progress: &ChunkProgress, descriptor: &Descriptor) {
        if self.chunks {
            let _ = self.tx.send(LoadEvent::Chunk {
                path: descriptor.path.clone(),
                progress: *progress,
            });
        }
    }

    fn on_success(&self, artifact: &Artifact, descriptor: &Descriptor) {
        let _ = self.tx.send(LoadEvent::Success {
            artifact: artifact.clone(),
            descriptor: descriptor.clone(),
        });
    }

    fn on_error(&self, error: &FetchError, descriptor: &Descriptor) {
        let _ = self.tx.send(LoadEvent::Error {
            error: error.clone(),
            descriptor: descriptor.clone(),
        });
    }

    fn on_complete(&self, _artifact: &Artifact, descriptor: &Descriptor) {
        let _ = self.tx.send(LoadEvent::Complete {
            path: descriptor.path.clone(),
        });
    }

    fn on_progress(&self, progress: &TaskProgress) {
        let _ = self.tx.send(LoadEvent::Progress(*progress));
    }

    fn on_state(&self, change: &StateChange) {
        let _ = self.tx.send(LoadEvent::State(*change));
    }

    fn on_finish(&self, checkpoint: &Checkpoint) {
        let _ = self.tx.send(LoadEvent::Finish(checkpoint.clone()));
    }
}

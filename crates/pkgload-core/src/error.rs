//! Error taxonomy for runs and individual fetch attempts.

use crate::controller::LoadState;

/// Failure of a single network attempt for one resource.
///
/// Cloneable so the same value can be handed to the error notification and
/// kept in the task result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Response arrived with a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Connection, DNS, timeout or other transport-level failure.
    #[error("transport: {0}")]
    Transport(String),
    /// The run was cancelled while the attempt was in flight.
    #[error("transfer aborted")]
    Aborted,
}

impl FetchError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}

/// Operation rejected by the controller's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Resume,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Start => write!(f, "start"),
            Operation::Resume => write!(f, "resume"),
        }
    }
}

/// Run-level errors surfaced from `start()` / `resume()`.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Missing manifest source, no resolvable base location, or a resource
    /// path that cannot be joined onto the base.
    #[error("configuration: {0}")]
    Configuration(String),
    /// The operation is not allowed in the controller's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: Operation,
        state: LoadState,
    },
    /// The single manifest request failed.
    #[error("manifest fetch failed: {0}")]
    ManifestFetch(#[source] FetchError),
    /// The manifest document was not valid JSON of the expected shape.
    #[error("manifest parse failed: {0}")]
    ManifestParse(#[from] serde_json::Error),
}

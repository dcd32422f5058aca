pub mod config;
pub mod logging;

pub mod checkpoint;
pub mod controller;
pub mod error;
pub mod manifest;
pub mod observer;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod task;
pub mod transport;

pub use checkpoint::{Checkpoint, CheckpointHandle, CheckpointStatus};
pub use controller::{LoadController, LoadOptions, LoadState, RunSummary};
pub use error::{FetchError, LoadError};
pub use manifest::{Descriptor, Manifest, ManifestSource};
pub use observer::{ChannelObserver, LoadEvent, LoadObserver, NoopObserver, StateChange};
pub use progress::TaskProgress;
pub use retry::RetryPolicy;
pub use task::{Artifact, ChunkProgress};
pub use transport::{CurlOptions, CurlTransport, Transport};

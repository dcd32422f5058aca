use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointHandle;
use crate::config::LoaderConfig;
use crate::manifest::{Descriptor, ManifestSource};
use crate::retry::RetryPolicy;

/// Inclusion predicate over descriptors; files it rejects are not part of the run.
pub type Filter = Arc<dyn Fn(&Descriptor) -> bool + Send + Sync>;

/// Everything a controller needs besides the transport and observer.
#[derive(Clone)]
pub struct LoadOptions {
    pub manifest: Option<ManifestSource>,
    /// Explicit base location; wins over the manifest URL and prefix.
    pub base_url: Option<String>,
    /// Maximum files in flight; clamped to at least 1.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub chunk_progress: bool,
    pub filter: Option<Filter>,
    pub checkpoint: CheckpointHandle,
    /// Parent of every run's cancellation token.
    pub cancel: Option<CancellationToken>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from_config(&LoaderConfig::default())
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("manifest", &self.manifest)
            .field("base_url", &self.base_url)
            .field("concurrency", &self.concurrency)
            .field("retry", &self.retry)
            .field("chunk_progress", &self.chunk_progress)
            .field("filter", &self.filter.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl LoadOptions {
    pub fn from_config(cfg: &LoaderConfig) -> Self {
        Self {
            manifest: None,
            base_url: cfg.base_url.clone(),
            concurrency: cfg.concurrency.max(1),
            retry: cfg.retry.policy(),
            chunk_progress: cfg.chunk_progress,
            filter: None,
            checkpoint: CheckpointHandle::default(),
            cancel: None,
        }
    }

    pub fn with_manifest(mut self, source: ManifestSource) -> Self {
        self.manifest = Some(source);
        self
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = Some(base.into());
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chunk_progress(mut self, enabled: bool) -> Self {
        self.chunk_progress = enabled;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Descriptor) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointHandle) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

//! Network seam: one blocking, cancellable GET per call.
//!
//! Implementations run on the tokio blocking pool (see [`fetch`]), the same
//! way libcurl transfers are driven elsewhere in the crate. Cancellation must
//! be honoured both before the response arrives and while the body streams.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::{CurlOptions, CurlTransport};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Chunk callback: `(loaded_bytes, total_bytes_if_known)`, loaded is monotonic.
pub type ChunkFn = dyn FnMut(u64, Option<u64>) + Send;

/// Response of a completed transfer (any status).
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u32,
    /// `Content-Length` of the final response, if the server sent one.
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs GET requests. Called from a blocking thread.
pub trait Transport: Send + Sync + 'static {
    /// Fetches `url`. When `on_chunk` is set, it is invoked as body bytes of a
    /// 2xx response arrive. Returns `FetchError::Aborted` if `cancel` fires
    /// during the transfer.
    fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_chunk: Option<&mut ChunkFn>,
    ) -> Result<Response, FetchError>;
}

/// Runs one transfer on the blocking pool, racing it against cancellation so
/// the caller is released as soon as the run is stopped.
pub async fn fetch(
    transport: Arc<dyn Transport>,
    url: String,
    cancel: CancellationToken,
    on_chunk: Option<Box<ChunkFn>>,
) -> Result<Response, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Aborted);
    }
    let token = cancel.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let mut on_chunk = on_chunk;
        transport.get(&url, &token, on_chunk.as_deref_mut())
    });
    tokio::select! {
        joined = worker => joined
            .unwrap_or_else(|e| Err(FetchError::Transport(format!("fetch worker: {e}")))),
        _ = cancel.cancelled() => Err(FetchError::Aborted),
    }
}

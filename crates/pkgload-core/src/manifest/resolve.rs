//! Manifest resolution: inline value or a single fetch through the transport.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, LoadError};
use crate::transport::Transport;

use super::{Manifest, ManifestSource};

/// Returns the manifest for this run. A remote source is fetched exactly once
/// (no retry) and any failure is surfaced to the caller.
pub async fn resolve_manifest(
    source: &ManifestSource,
    transport: &Arc<dyn Transport>,
    cancel: &CancellationToken,
) -> Result<Manifest, LoadError> {
    let url = match source {
        ManifestSource::Inline(m) => return Ok(m.clone()),
        ManifestSource::Remote(url) => url.clone(),
    };
    tracing::debug!(%url, "fetching manifest");
    let response = crate::transport::fetch(Arc::clone(transport), url.clone(), cancel.clone(), None)
        .await
        .map_err(LoadError::ManifestFetch)?;
    if !response.is_success() {
        return Err(LoadError::ManifestFetch(FetchError::Http(response.status)));
    }
    let manifest = Manifest::from_json(&response.body)?;
    tracing::info!(
        package = %manifest.package_name,
        version = %manifest.version,
        files = manifest.files.len(),
        "manifest resolved"
    );
    Ok(manifest)
}

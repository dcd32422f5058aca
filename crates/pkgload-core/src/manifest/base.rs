//! Base location resolution: explicit override > manifest source URL > embedded prefix.

use url::Url;

use crate::error::LoadError;

/// Picks the base location for resource URLs.
///
/// The returned URL always ends with `/` so relative resource paths are
/// appended rather than replacing the last segment.
pub fn resolve_base(
    override_url: Option<&str>,
    source_url: Option<&str>,
    prefix: &str,
) -> Result<Url, LoadError> {
    if let Some(raw) = override_url.filter(|s| !s.trim().is_empty()) {
        let url = Url::parse(raw.trim())
            .map_err(|e| LoadError::Configuration(format!("invalid base override {raw:?}: {e}")))?;
        return Ok(as_directory(url));
    }
    if let Some(url) = source_url.and_then(derive_base_from_source) {
        return Ok(url);
    }
    let prefix = prefix.trim();
    if !prefix.is_empty() {
        if let Ok(url) = Url::parse(prefix) {
            return Ok(as_directory(url));
        }
        return Err(LoadError::Configuration(format!(
            "manifest prefix {prefix:?} is not an absolute URL"
        )));
    }
    Err(LoadError::Configuration(
        "no base location: set a base override, fetch the manifest from a URL, or embed a prefix"
            .to_string(),
    ))
}

/// Directory containing the manifest document: `https://h/pkg@1/files.json` → `https://h/pkg@1/`.
///
/// Returns `None` for values that are not absolute http(s) URLs.
pub fn derive_base_from_source(source: &str) -> Option<Url> {
    let mut url = Url::parse(source.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    url.join("./").ok()
}

/// Joins a descriptor path onto the base. Leading slashes are treated as
/// relative to the base, not the host root.
pub fn resource_url(base: &Url, path: &str) -> Result<Url, LoadError> {
    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        return Err(LoadError::Configuration(format!("empty resource path {path:?}")));
    }
    base.join(relative)
        .map_err(|e| LoadError::Configuration(format!("cannot join {path:?} onto {base}: {e}")))
}

fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

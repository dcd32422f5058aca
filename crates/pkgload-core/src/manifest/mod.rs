//! Package manifest: the file list a load run works from.
//!
//! The manifest document is the JSON shape served by package CDNs:
//! `{package, version, prefix, files: [{path, size, type, integrity?}]}`.
//! It is either handed to the controller directly or fetched once per run.

mod base;
mod resolve;

pub use base::{derive_base_from_source, resolve_base, resource_url};
pub use resolve::resolve_manifest;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// One remote file in a manifest. `path` is the unique resource key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

impl Descriptor {
    pub fn new(path: impl Into<String>, size: u64, content_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size,
            content_type: content_type.into(),
            integrity: None,
        }
    }
}

/// Resolved description of a package's remote files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "package")]
    pub package_name: String,
    pub version: String,
    /// Base prefix embedded in the document; used when neither an explicit
    /// override nor a source URL is available.
    #[serde(rename = "prefix", default)]
    pub base_prefix: String,
    pub files: Vec<Descriptor>,
}

impl Manifest {
    /// Parses a manifest document.
    pub fn from_json(data: &[u8]) -> Result<Self, LoadError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Where a run gets its manifest from.
#[derive(Debug, Clone)]
pub enum ManifestSource {
    /// Use this value as-is; no network request.
    Inline(Manifest),
    /// Fetch and parse the document at this URL (one request per run).
    Remote(String),
}

impl ManifestSource {
    /// Source identifier used to derive the base location, if any.
    pub fn source_url(&self) -> Option<&str> {
        match self {
            ManifestSource::Inline(_) => None,
            ManifestSource::Remote(url) => Some(url),
        }
    }
}

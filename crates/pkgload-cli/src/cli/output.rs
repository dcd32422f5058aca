//! Output directory layout: artifact files and the persisted checkpoint.
//!
//! Every write goes to a temp file in the destination directory and is then
//! renamed into place, so an interrupted run never leaves a truncated file.

use anyhow::{bail, Context, Result};
use pkgload_core::Checkpoint;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CHECKPOINT_FILE: &str = ".pkgload-checkpoint.json";

const NAME_MAX: usize = 255;

/// Sanitizes one path component for use on Linux.
///
/// - Replaces NUL, `\` and control characters with `_`
/// - Trims surrounding whitespace
/// - Limits length to 255 bytes (Linux NAME_MAX)
fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c == '\0' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    let trimmed = replaced.trim();
    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Maps a manifest path onto a relative filesystem path.
///
/// Empty and `.` components are dropped; `..` is rejected so a manifest can
/// never write outside the output directory. Returns None when nothing is left.
pub fn relative_path(manifest_path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for part in manifest_path.split('/') {
        let part = sanitize_component(part);
        match part.as_str() {
            "" | "." => continue,
            ".." => return None,
            _ => out.push(part),
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .with_context(|| format!("no parent directory for {}", target.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", target.display()))?;
    tmp.persist(target)
        .map_err(|e| e.error)
        .with_context(|| format!("rename into {}", target.display()))?;
    Ok(())
}

/// Writes one fetched file under `out`. Returns the final path.
pub fn write_artifact(out: &Path, manifest_path: &str, bytes: &[u8]) -> Result<PathBuf> {
    let Some(rel) = relative_path(manifest_path) else {
        bail!("refusing to write unsafe path {:?}", manifest_path);
    };
    let target = out.join(rel);
    write_atomic(&target, bytes)?;
    Ok(target)
}

/// Loads `out/.pkgload-checkpoint.json`; a missing file is an empty checkpoint.
pub fn load_checkpoint(out: &Path) -> Result<Checkpoint> {
    let path = out.join(CHECKPOINT_FILE);
    if !path.exists() {
        return Ok(Checkpoint::default());
    }
    let data = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parse {}", path.display()))
}

pub fn save_checkpoint(out: &Path, checkpoint: &Checkpoint) -> Result<()> {
    let data = serde_json::to_vec_pretty(checkpoint).context("serialize checkpoint")?;
    write_atomic(&out.join(CHECKPOINT_FILE), &data)
}

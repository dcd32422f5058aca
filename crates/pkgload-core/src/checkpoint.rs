//! Caller-owned checkpoint: per-resource completion status across runs.
//!
//! Serialized as a JSON object mapping resource path to a boolean marker:
//! `true` = pending (fetch on the next run), `false` = done (skip). The
//! controller mutates it in place through a [`CheckpointHandle`]; persisting
//! it between processes is up to the caller.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Status of one resource key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum CheckpointStatus {
    Done,
    Pending,
}

impl From<bool> for CheckpointStatus {
    fn from(pending: bool) -> Self {
        if pending {
            CheckpointStatus::Pending
        } else {
            CheckpointStatus::Done
        }
    }
}

impl From<CheckpointStatus> for bool {
    fn from(status: CheckpointStatus) -> Self {
        status == CheckpointStatus::Pending
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
    entries: BTreeMap<String, CheckpointStatus>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<CheckpointStatus> {
        self.entries.get(path).copied()
    }

    pub fn set(&mut self, path: impl Into<String>, status: CheckpointStatus) {
        self.entries.insert(path.into(), status);
    }

    /// Absent keys count as done.
    pub fn is_done(&self, path: &str) -> bool {
        self.get(path) != Some(CheckpointStatus::Pending)
    }

    pub fn has_pending(&self) -> bool {
        self.entries.values().any(|s| *s == CheckpointStatus::Pending)
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, s)| **s == CheckpointStatus::Pending)
            .map(|(k, _)| k.as_str())
    }

    pub fn done_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| **s == CheckpointStatus::Done)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CheckpointStatus)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), *s))
    }
}

/// Shared handle to a checkpoint. Clones refer to the same map; the caller
/// keeps one to read or persist it after a run.
#[derive(Debug, Clone, Default)]
pub struct CheckpointHandle {
    inner: Arc<Mutex<Checkpoint>>,
}

impl CheckpointHandle {
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            inner: Arc::new(Mutex::new(checkpoint)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Checkpoint> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Checkpoint {
        self.lock().clone()
    }

    pub fn status(&self, path: &str) -> Option<CheckpointStatus> {
        self.lock().get(path)
    }

    pub fn has_pending(&self) -> bool {
        self.lock().has_pending()
    }

    pub fn mark_done(&self, path: &str) {
        self.lock().set(path, CheckpointStatus::Done);
    }

    pub fn mark_pending(&self, path: &str) {
        self.lock().set(path, CheckpointStatus::Pending);
    }

    /// Inserts `Pending` for every key not yet present and returns each key's
    /// status, in input order, under one lock.
    pub(crate) fn seed<'a, I>(&self, paths: I) -> Vec<CheckpointStatus>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut cp = self.lock();
        paths
            .into_iter()
            .map(|path| {
                *cp.entries
                    .entry(path.to_string())
                    .or_insert(CheckpointStatus::Pending)
            })
            .collect()
    }
}

impl From<Checkpoint> for CheckpointHandle {
    fn from(checkpoint: Checkpoint) -> Self {
        Self::new(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_wire_format() {
        let mut cp = Checkpoint::new();
        cp.set("/a.js", CheckpointStatus::Done);
        cp.set("/b.js", CheckpointStatus::Pending);
        let json = serde_json::to_string(&cp).unwrap();
        assert_eq!(json, r#"{"/a.js":false,"/b.js":true}"#);
        let parsed: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cp);
    }

    #[test]
    fn absent_counts_as_done() {
        let cp = Checkpoint::new();
        assert!(cp.is_done("/missing"));
        assert!(!cp.has_pending());
    }

    #[test]
    fn seed_inserts_pending_and_keeps_existing() {
        let mut cp = Checkpoint::new();
        cp.set("/done.js", CheckpointStatus::Done);
        cp.set("/other.js", CheckpointStatus::Pending);
        let handle = CheckpointHandle::new(cp);
        let statuses = handle.seed(["/done.js", "/new.js"]);
        assert_eq!(
            statuses,
            vec![CheckpointStatus::Done, CheckpointStatus::Pending]
        );
        let snap = handle.snapshot();
        assert_eq!(snap.get("/new.js"), Some(CheckpointStatus::Pending));
        assert_eq!(snap.get("/other.js"), Some(CheckpointStatus::Pending));
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn clones_share_state() {
        let handle = CheckpointHandle::default();
        let other = handle.clone();
        other.mark_pending("/x");
        assert!(handle.has_pending());
        handle.mark_done("/x");
        assert_eq!(other.status("/x"), Some(CheckpointStatus::Done));
    }
}

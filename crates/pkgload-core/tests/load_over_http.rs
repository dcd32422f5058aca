//! Integration test: local HTTP server, real curl transport, full controller runs.
//!
//! Starts a file server, loads a package through `LoadController`, and checks
//! artifacts, counters and the checkpoint against what the server saw.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::file_server::{self, Files};
use pkgload_core::{
    ChannelObserver, Checkpoint, CheckpointStatus, CurlTransport, Descriptor, FetchError,
    LoadController, LoadError, LoadEvent, LoadOptions, LoadState, Manifest, ManifestSource,
    RetryPolicy,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

fn manifest(paths: &[&str]) -> Manifest {
    Manifest {
        package_name: "demo".to_string(),
        version: "0.1.0".to_string(),
        base_prefix: String::new(),
        files: paths
            .iter()
            .map(|p| Descriptor::new(*p, 0, "application/octet-stream"))
            .collect(),
    }
}

fn controller(opts: LoadOptions) -> (LoadController, UnboundedReceiver<LoadEvent>) {
    let (tx, rx) = unbounded_channel();
    let c = LoadController::new(
        opts,
        Arc::new(CurlTransport::default()),
        Arc::new(ChannelObserver::new(tx).with_chunks()),
    );
    (c, rx)
}

fn drain(rx: &mut UnboundedReceiver<LoadEvent>) -> Vec<LoadEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

fn fast_retry(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::from_millis(10))
}

#[tokio::test]
async fn loads_package_and_records_failures() {
    let server = file_server::start(
        Files::new()
            .file("/1.js", "one")
            .file("/3.js", "three"),
    );
    let opts = LoadOptions::default()
        .with_manifest(ManifestSource::Inline(manifest(&[
            "/1.js", "/2.js", "/3.js", "/4.js",
        ])))
        .with_base_url(server.base())
        .with_concurrency(2)
        .with_retry(fast_retry(0));
    let (c, mut rx) = controller(opts);

    let summary = c.start().await.expect("start");
    assert_eq!(summary.state, LoadState::Completed);
    assert_eq!(summary.progress.completed, 4);
    assert_eq!(summary.progress.success, 2);
    assert_eq!(summary.progress.failure, 2);
    assert_eq!(summary.progress.percentage, 100);

    let mut bodies = Vec::new();
    let mut errors = Vec::new();
    for ev in drain(&mut rx) {
        match ev {
            LoadEvent::Success { artifact, .. } => {
                assert_eq!(artifact.url, server.url(&artifact.path));
                bodies.push((artifact.path, artifact.bytes));
            }
            LoadEvent::Error { error, descriptor } => {
                assert_eq!(error, FetchError::Http(404));
                errors.push(descriptor.path);
            }
            LoadEvent::Chunk { progress, .. } => assert!(progress.loaded <= 5),
            _ => {}
        }
    }
    bodies.sort();
    errors.sort();
    assert_eq!(
        bodies,
        vec![
            ("/1.js".to_string(), b"one".to_vec()),
            ("/3.js".to_string(), b"three".to_vec())
        ]
    );
    assert_eq!(errors, vec!["/2.js", "/4.js"]);

    let cp = c.checkpoint().snapshot();
    assert_eq!(cp.get("/1.js"), Some(CheckpointStatus::Done));
    assert_eq!(cp.get("/2.js"), Some(CheckpointStatus::Pending));
    assert_eq!(server.total_hits(), 4);
}

#[tokio::test]
async fn remote_manifest_resolves_files_next_to_it() {
    let doc = serde_json::json!({
        "package": "demo",
        "version": "0.1.0",
        "files": [
            { "path": "/lib/a.js", "size": 5, "type": "application/javascript" },
            { "path": "/lib/b.js", "size": 5, "type": "application/javascript" }
        ]
    });
    let server = file_server::start(
        Files::new()
            .file("/demo@0.1.0/files.json", doc.to_string())
            .file("/demo@0.1.0/lib/a.js", "aaaaa")
            .file("/demo@0.1.0/lib/b.js", "bbbbb"),
    );
    let opts = LoadOptions::default()
        .with_manifest(ManifestSource::Remote(
            server.url("/demo@0.1.0/files.json?v=1"),
        ))
        .with_retry(fast_retry(0));
    let (c, _rx) = controller(opts);

    let summary = c.start().await.expect("start");
    assert_eq!(summary.progress.success, 2);
    assert_eq!(server.hits("/demo@0.1.0/files.json"), 1);
    assert_eq!(server.hits("/demo@0.1.0/lib/a.js"), 1);
    assert_eq!(server.hits("/demo@0.1.0/lib/b.js"), 1);
}

#[tokio::test]
async fn missing_remote_manifest_is_a_fetch_error() {
    let server = file_server::start(Files::new());
    let opts = LoadOptions::default()
        .with_manifest(ManifestSource::Remote(server.url("/nope/files.json")));
    let (c, _rx) = controller(opts);
    let err = c.start().await.unwrap_err();
    assert!(matches!(err, LoadError::ManifestFetch(FetchError::Http(404))));
    assert_eq!(c.state(), LoadState::Idle);
}

#[tokio::test]
async fn server_errors_are_retried_up_to_the_limit() {
    let server = file_server::start(Files::new().failing("/flaky.bin"));
    let opts = LoadOptions::default()
        .with_manifest(ManifestSource::Inline(manifest(&["/flaky.bin"])))
        .with_base_url(server.base())
        .with_retry(fast_retry(2));
    let (c, mut rx) = controller(opts);

    let summary = c.start().await.expect("start");
    assert_eq!(summary.progress.failure, 1);
    assert_eq!(server.hits("/flaky.bin"), 3);
    let errors = drain(&mut rx)
        .into_iter()
        .filter(|ev| matches!(ev, LoadEvent::Error { .. }))
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn persisted_checkpoint_skips_finished_files_after_restart() {
    let files = ["/a.bin", "/b.bin", "/c.bin"];
    let first = file_server::start(
        Files::new()
            .file("/a.bin", "a")
            .file("/b.bin", "b")
            .failing("/c.bin"),
    );
    let opts = LoadOptions::default()
        .with_manifest(ManifestSource::Inline(manifest(&files)))
        .with_base_url(first.base())
        .with_retry(fast_retry(0));
    let (c, _rx) = controller(opts);
    c.start().await.expect("first run");
    let saved = serde_json::to_string(&c.checkpoint().snapshot()).unwrap();
    drop(c);

    let restored: Checkpoint = serde_json::from_str(&saved).unwrap();
    assert_eq!(restored.pending().collect::<Vec<_>>(), vec!["/c.bin"]);

    let second = file_server::start(
        Files::new()
            .file("/a.bin", "a")
            .file("/b.bin", "b")
            .file("/c.bin", "c"),
    );
    let opts = LoadOptions::default()
        .with_manifest(ManifestSource::Inline(manifest(&files)))
        .with_base_url(second.base())
        .with_retry(fast_retry(0))
        .with_checkpoint(restored.into());
    let (c, _rx) = controller(opts);
    let summary = c.start().await.expect("second run");
    assert_eq!(summary.state, LoadState::Completed);
    assert_eq!(summary.progress.completed, 3);
    assert_eq!(second.total_hits(), 1);
    assert_eq!(second.hits("/c.bin"), 1);
    assert!(!c.checkpoint().has_pending());
}

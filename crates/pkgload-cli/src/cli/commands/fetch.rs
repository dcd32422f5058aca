//! `pkgload fetch` – load every file of a manifest into an output directory.

use anyhow::{bail, Context, Result};
use pkgload_core::config::LoaderConfig;
use pkgload_core::{
    ChannelObserver, CheckpointHandle, CurlTransport, LoadController, LoadEvent, LoadOptions,
    LoadState, ManifestSource, TaskProgress,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::cli::output;

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub manifest_url: String,
    pub out: PathBuf,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub base_url: Option<String>,
    pub ext: Vec<String>,
}

/// Applies command-line overrides on top of the config file.
fn apply_overrides(mut cfg: LoaderConfig, args: &FetchArgs) -> LoaderConfig {
    if let Some(n) = args.concurrency {
        cfg.concurrency = n;
    }
    if let Some(n) = args.retries {
        cfg.retry.max_retries = n;
    }
    if let Some(ms) = args.retry_delay_ms {
        cfg.retry.retry_delay_ms = ms;
    }
    if let Some(base) = &args.base_url {
        cfg.base_url = Some(base.clone());
    }
    cfg
}

/// Normalizes `--ext` values to lowercase suffixes with a leading dot.
fn extension_suffixes(ext: &[String]) -> Vec<String> {
    ext.iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
        .collect()
}

fn format_progress(p: &TaskProgress) -> String {
    format!(
        "  {}/{} files ({}%)  ok {}  failed {}",
        p.completed, p.total, p.percentage, p.success, p.failure
    )
}

pub async fn run_fetch(cfg: LoaderConfig, args: FetchArgs) -> Result<()> {
    let cfg = apply_overrides(cfg, &args);
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output directory {}", args.out.display()))?;

    let checkpoint = CheckpointHandle::new(output::load_checkpoint(&args.out)?);
    let interrupt = CancellationToken::new();
    let mut opts = LoadOptions::from_config(&cfg)
        .with_manifest(ManifestSource::Remote(args.manifest_url.clone()))
        .with_checkpoint(checkpoint.clone())
        .with_cancel(interrupt.clone());
    let suffixes = extension_suffixes(&args.ext);
    if !suffixes.is_empty() {
        opts = opts.with_filter(move |d| {
            let path = d.path.to_ascii_lowercase();
            suffixes.iter().any(|s| path.ends_with(s.as_str()))
        });
    }

    let (tx, rx) = unbounded_channel();
    let controller = LoadController::new(
        opts,
        Arc::new(CurlTransport::new(cfg.http.curl_options())),
        Arc::new(ChannelObserver::new(tx)),
    );

    let writer = tokio::spawn(consume_events(rx, args.out.clone()));
    let signal_token = interrupt.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted; stopping after in-flight files settle");
            signal_token.cancel();
        }
    });

    let result = controller.start().await;
    signal.abort();
    drop(controller);
    let unwritten = writer.await.context("artifact writer task")?;
    reopen_unwritten(&checkpoint, &unwritten);
    let write_failures = unwritten.len();

    // Persisted before any setup error is surfaced.
    output::save_checkpoint(&args.out, &checkpoint.snapshot())?;
    let summary = result?;

    println!("{}", format_progress(&summary.progress));
    match summary.state {
        LoadState::Stopped => {
            println!("Stopped. Run the same command again to continue.");
        }
        _ if summary.progress.failure > 0 || write_failures > 0 => {
            bail!(
                "{} file(s) failed to load, {} could not be written; run again to retry",
                summary.progress.failure,
                write_failures
            );
        }
        _ => println!("All files loaded into {}.", args.out.display()),
    }
    Ok(())
}

/// Writes artifacts as they arrive and prints progress. Returns the paths
/// that could not be written.
async fn consume_events(mut rx: UnboundedReceiver<LoadEvent>, out: PathBuf) -> Vec<String> {
    let mut unwritten = Vec::new();
    let mut announced = false;
    while let Some(event) = rx.recv().await {
        match event {
            LoadEvent::Success { artifact, .. } => {
                if let Err(e) = store(&out, &artifact.path, &artifact.bytes) {
                    tracing::warn!(path = %artifact.path, "write failed: {:#}", e);
                    eprintln!("  cannot write {}: {:#}", artifact.path, e);
                    unwritten.push(artifact.path);
                }
            }
            LoadEvent::Error { error, descriptor } => {
                eprintln!("  failed {}: {}", descriptor.path, error);
            }
            LoadEvent::Progress(p) => println!("{}", format_progress(&p)),
            LoadEvent::State(change) if change.state == LoadState::Running && !announced => {
                announced = true;
                if change.completed > 0 {
                    println!("  {} file(s) already loaded, skipping", change.completed);
                }
            }
            _ => {}
        }
    }
    unwritten
}

/// Marks unwritten files pending so the next run fetches them again. Must run
/// after the load has settled, or a later success record would overwrite it.
fn reopen_unwritten(checkpoint: &CheckpointHandle, unwritten: &[String]) {
    for path in unwritten {
        checkpoint.mark_pending(path);
    }
}

fn store(out: &Path, manifest_path: &str, bytes: &[u8]) -> Result<()> {
    let path = output::write_artifact(out, manifest_path, bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}

//! `pkgload status` – show the persisted checkpoint of an output directory.

use anyhow::Result;
use std::path::Path;

use crate::cli::output;

pub fn run_status(out: &Path) -> Result<()> {
    let checkpoint = output::load_checkpoint(out)?;
    if checkpoint.is_empty() {
        println!("No checkpoint in {}.", out.display());
        return Ok(());
    }
    let done = checkpoint.done_count();
    let pending = checkpoint.len() - done;
    println!("{:<8} {}", "DONE", done);
    println!("{:<8} {}", "PENDING", pending);
    for path in checkpoint.pending() {
        println!("  {}", path);
    }
    Ok(())
}

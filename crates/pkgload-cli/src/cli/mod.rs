//! CLI for the pkgload package file loader.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pkgload_core::config;
use std::path::PathBuf;

use commands::{run_fetch, run_status, FetchArgs};

/// Top-level CLI for pkgload.
#[derive(Debug, Parser)]
#[command(name = "pkgload")]
#[command(about = "pkgload: fetch every file of a package manifest with bounded concurrency", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch the files listed in a remote manifest into a directory.
    Fetch {
        /// URL of the package manifest (JSON).
        manifest_url: String,

        /// Output directory; also holds the resume checkpoint.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,

        /// Files fetched at once (default from config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Retries per file after the first attempt (default from config).
        #[arg(long, value_name = "N")]
        retries: Option<u32>,

        /// Delay between attempts in milliseconds (default from config).
        #[arg(long, value_name = "MS")]
        retry_delay_ms: Option<u64>,

        /// Base URL for file paths; overrides the manifest location and prefix.
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Only fetch files with this extension (repeatable).
        #[arg(long = "ext", value_name = "EXT")]
        ext: Vec<String>,
    },

    /// Show checkpoint state of an output directory.
    Status {
        /// Output directory used by a previous fetch.
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch {
                manifest_url,
                out,
                concurrency,
                retries,
                retry_delay_ms,
                base_url,
                ext,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let args = FetchArgs {
                    manifest_url,
                    out,
                    concurrency,
                    retries,
                    retry_delay_ms,
                    base_url,
                    ext,
                };
                run_fetch(cfg, args).await?;
            }
            CliCommand::Status { out } => run_status(&out)?,
        }

        Ok(())
    }
}

//! CLI for haul.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use haul_core::config;
use haul_core::store::SessionStore;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use commands::{run_checksum, run_fetch, run_forget, run_plan, run_sessions, run_upload};

/// Top-level CLI for haul.
#[derive(Debug, Parser)]
#[command(name = "haul")]
#[command(about = "haul: resumable chunked uploads and throttled downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload a file in parts, resuming a previous session for the same content.
    Upload {
        /// Path to the file to upload.
        path: String,
        /// Upload service base URL (overrides `upload_endpoint` in config).
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Session key sent to the server (default: SHA-256 of the file).
        #[arg(long, value_name = "N")]
        nonce: Option<String>,
    },

    /// Download a URL to a file through the throttled writer.
    Fetch {
        /// Direct HTTP/HTTPS URL.
        url: String,
        /// Destination file; data lands in `<dest>.part` until complete.
        dest: String,
        /// Continue from an existing `<dest>.part`.
        #[arg(long)]
        resume: bool,
        /// Jump ahead of queued normal-priority writes.
        #[arg(long)]
        high_priority: bool,
    },

    /// List recorded upload sessions.
    Sessions,

    /// Forget a recorded upload session (the server copy is untouched).
    Forget {
        /// Server session identifier.
        id: String,
    },

    /// Print how a file would be split into parts.
    Plan {
        /// Path to the file.
        path: String,
        /// Part size in bytes (default: `max_part_size_bytes` from config).
        #[arg(long, value_name = "BYTES")]
        part_size: Option<u64>,
    },

    /// Compute SHA-256 of a file.
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub async fn run_from_args(cancel: &CancellationToken) -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Upload {
                path,
                endpoint,
                nonce,
            } => {
                let store = SessionStore::open_default().await?;
                run_upload(
                    &cfg,
                    &store,
                    Path::new(&path),
                    endpoint.as_deref(),
                    nonce.as_deref(),
                    cancel,
                )
                .await?;
            }
            CliCommand::Fetch {
                url,
                dest,
                resume,
                high_priority,
            } => run_fetch(&cfg, &url, Path::new(&dest), resume, high_priority, cancel).await?,
            CliCommand::Sessions => run_sessions(&SessionStore::open_default().await?).await?,
            CliCommand::Forget { id } => {
                run_forget(&SessionStore::open_default().await?, &id).await?;
            }
            CliCommand::Plan { path, part_size } => run_plan(&cfg, Path::new(&path), part_size)?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

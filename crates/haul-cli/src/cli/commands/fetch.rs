//! `haul fetch <url> <dest>` – download through the stream bridge and throttled writer.

use anyhow::Result;
use haul_core::config::HaulConfig;
use haul_core::fetch::{fetch_to_path, FetchOptions};
use haul_core::throttle::{ThrottledWriter, WritePriority};
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::progress;

pub async fn run_fetch(
    cfg: &HaulConfig,
    url: &str,
    dest: &Path,
    resume: bool,
    high_priority: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let writer = ThrottledWriter::new(cfg.throttle_settings(), cfg.write_arbiter());
    let (progress_tx, progress_rx) = mpsc::channel(16);
    let printer = progress::spawn_printer(progress_rx);
    let options = FetchOptions {
        resume,
        priority: if high_priority {
            WritePriority::High
        } else {
            WritePriority::Normal
        },
        progress_tx: Some(progress_tx),
        ..FetchOptions::from_config(cfg)
    };

    let result = fetch_to_path(url, dest, &options, &writer, cancel).await;
    drop(options);
    progress::finish_printer(printer, "fetch").await;
    let outcome = result?;
    if outcome.resumed_from > 0 {
        println!(
            "Saved {} ({} bytes, {} resumed)",
            outcome.path.display(),
            outcome.total_bytes(),
            outcome.resumed_from
        );
    } else {
        println!("Saved {} ({} bytes)", outcome.path.display(), outcome.total_bytes());
    }
    Ok(())
}

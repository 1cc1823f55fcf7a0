//! Terminal progress line shared by upload and fetch.

use haul_core::progress::TransferProgress;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PRINT_INTERVAL: Duration = Duration::from_millis(500);

pub(super) fn format_line(stats: &TransferProgress) -> String {
    let done_mib = stats.bytes_done as f64 / 1_048_576.0;
    let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    let mut line = if stats.total_bytes > 0 {
        format!(
            "{:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}",
            done_mib,
            stats.total_bytes as f64 / 1_048_576.0,
            stats.fraction() * 100.0,
            rate_mib,
            eta
        )
    } else {
        format!("{:.1} MiB  {:.2} MiB/s", done_mib, rate_mib)
    };
    if stats.part_count > 0 {
        line.push_str(&format!("  part {}/{}", stats.parts_done, stats.part_count));
    }
    line
}

/// Print snapshots at most every half second until every sender is dropped.
pub(super) fn spawn_printer(mut rx: mpsc::Receiver<TransferProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        let mut printed = false;
        while let Some(stats) = rx.recv().await {
            let due = last_print.map_or(true, |t| t.elapsed() >= PRINT_INTERVAL);
            let finished = stats.total_bytes > 0 && stats.bytes_done >= stats.total_bytes;
            if due || finished {
                println!("  {}", format_line(&stats));
                last_print = Some(Instant::now());
                printed = true;
            }
        }
        if printed {
            println!();
        }
    })
}

/// Wait for the printer to drain. A printer failure is logged, never fatal to
/// the transfer. Returns false if the printer task failed.
pub(super) async fn finish_printer(printer: JoinHandle<()>, what: &str) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(transfer = what, "progress printer failed: {}", e);
            false
        }
    }
}

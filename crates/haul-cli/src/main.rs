use haul_core::logging;
use tokio_util::sync::CancellationToken;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Fall back to stderr when the state dir is not writable.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", e);
    }

    // First Ctrl-C cancels cooperatively; transfers record progress and return.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, stopping after the current write...");
            on_signal.cancel();
        }
    });

    if let Err(err) = CliCommand::run_from_args(&cancel).await {
        eprintln!("haul error: {:#}", err);
        std::process::exit(1);
    }
}

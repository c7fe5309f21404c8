use anyhow::Result;
use clap::Parser;
use tokio::signal;

use estate_indexer::cli::commands::{handle_config, handle_run, handle_status};
use estate_indexer::cli::{Cli, Commands};
use estate_indexer::logging::init_tracing;
use estate_indexer::models::{Config, OutputFormat};
use estate_indexer::services::CancelFlag;

/// Exit status after a second interrupt.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let loaded = Config::load(cli.config.as_deref());

    let json_logs = loaded
        .as_ref()
        .map(|r| r.config.logging.json)
        .unwrap_or(false);
    init_tracing(cli.verbose, json_logs);

    let format = cli.format.unwrap_or(OutputFormat::Text);

    match cli.command {
        Commands::Config(cmd) => handle_config(cmd, loaded, format),
        Commands::Status => {
            let resolved = loaded?;
            handle_status(&resolved.config, format).await
        }
        Commands::Run(args) => {
            let resolved = loaded?;
            tracing::info!(source = %resolved.source, "configuration loaded");

            let cancel = CancelFlag::new();
            tokio::spawn(watch_interrupts(cancel.clone()));
            handle_run(args, &resolved.config, format, cancel).await
        }
    }
}

/// The first signal lets the current stage finish and still reports a
/// summary. A second one exits immediately.
async fn watch_interrupts(cancel: CancelFlag) {
    shutdown_signal().await;
    eprintln!("\nReceived shutdown signal, finishing current stage...");
    cancel.cancel();

    shutdown_signal().await;
    eprintln!("Interrupted again, exiting");
    std::process::exit(INTERRUPTED_EXIT_CODE);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

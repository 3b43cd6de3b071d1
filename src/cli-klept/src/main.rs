mod commands;
mod config;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::config::{Cli, Command};
use crate::logging::{DEFAULT_LOG_SETTINGS, setup_logging};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables from .env file, if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(DEFAULT_LOG_SETTINGS, cli.log_format);

    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Command::Batch(args) => commands::batch(args, cancel).await,
        Command::Extract(args) => commands::extract(args, cancel).await,
        Command::Sitemap(args) => commands::list_sitemap(args).await,
    }
}

/// Returns a token that is cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Received Ctrl-C: cancelling outstanding work");
                cancel.cancel();
            }
            Err(error) => tracing::error!("[SKIP] Unable to listen for Ctrl-C: {}", error),
        }
    });
    token
}

// NT Management update notifier - main.rs
// Boots logging, parses the command line and hands off to the CLI dispatcher

use clap::Parser;
use ntm_updater::cli::{dispatch, Cli};
use std::process::exit;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("❌ {e:#}");
        exit(1);
    }
}

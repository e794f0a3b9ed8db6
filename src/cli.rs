use crate::build_info;
use crate::config::{AppConfig, RuntimeMode};
use crate::config_loader::load_config;
use crate::debug_console;
use crate::errors::UpdateResult;
use crate::storage::FileVersionStore;
use crate::update_detector::{CheckOutcome, UpdateDetector};
use crate::version_client::HttpVersionFetcher;
use crate::version_source::VersionSource;
use crate::versionweb;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Top-level CLI interface
#[derive(Parser)]
#[command(
    name = "ntm_updater",
    version,
    about = "NT Management version endpoint and update notifier"
)]
pub struct Cli {
    /// Configuration file (defaults to $NTM_CONFIG or ntm.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve GET /api/version
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single update check and print the outcome
    Check {
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Poll for updates until interrupted
    Watch {
        #[arg(long)]
        endpoint: Option<String>,
        /// Seconds between checks
        #[arg(long)]
        interval: Option<u64>,
        /// Run in development mode (no prompts, debug console on stdin)
        #[arg(long)]
        dev: bool,
    },

    /// Accept the currently deployed version as the new baseline
    Acknowledge {
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Forget the persisted version
    Reset,

    /// Write the next build-metadata record
    Stamp {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

type HttpDetector = UpdateDetector<FileVersionStore, HttpVersionFetcher>;

fn build_detector(
    cfg: &AppConfig,
    endpoint: Option<String>,
    mode: RuntimeMode,
) -> UpdateResult<HttpDetector> {
    let endpoint = endpoint.unwrap_or_else(|| cfg.detector.endpoint.clone());
    let store = FileVersionStore::new(cfg.detector.state_path());
    info!(
        endpoint = %endpoint,
        state = %store.path().display(),
        ?mode,
        "Update detector configured"
    );
    let fetcher = HttpVersionFetcher::new(endpoint, cfg.detector.fetch_timeout())?;
    Ok(UpdateDetector::new(store, fetcher, mode))
}

fn describe(outcome: &CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Baseline { version } => format!("baseline established: {version}"),
        CheckOutcome::UpToDate { version } => format!("up to date: {version}"),
        CheckOutcome::UpdateAvailable { known, deployed } => {
            format!("update available: {known} -> {deployed}")
        }
        CheckOutcome::Suppressed { known, deployed } => {
            format!("version changed ({known} -> {deployed}), not prompting in development mode")
        }
        CheckOutcome::Skipped => "version endpoint unreachable, nothing changed".to_string(),
    }
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| cfg.server.host.clone());
            let port = port.unwrap_or(cfg.server.port);
            let source = Arc::new(VersionSource::from_config(&cfg.version));
            versionweb::serve(&format!("{host}:{port}"), source).await?;
        }
        Commands::Check { endpoint } => {
            let detector = build_detector(&cfg, endpoint, cfg.detector.mode)?;
            let outcome = detector.check().await;
            println!("{}", describe(&outcome));
        }
        Commands::Watch {
            endpoint,
            interval,
            dev,
        } => {
            let mode = if dev {
                RuntimeMode::Development
            } else {
                cfg.detector.mode
            };
            let every = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| cfg.detector.poll_interval());
            if every.is_zero() {
                anyhow::bail!("--interval must be positive");
            }

            let detector = Arc::new(build_detector(&cfg, endpoint, mode)?);
            let mut updates = detector.subscribe();
            let poller = detector.spawn(every);
            let console = debug_console::attach(&detector);

            let mut announced: Option<String> = None;
            let shutdown = versionweb::shutdown_signal();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let status = updates.borrow_and_update().clone();
                        if status.update_available && announced != status.current_version {
                            println!(
                                "A new version is available: {}",
                                status.current_version.as_deref().unwrap_or("unknown")
                            );
                            announced = status.current_version.clone();
                        } else if !status.update_available {
                            announced = None;
                        }
                    }
                }
            }

            if let Some(console) = console {
                console.abort();
            }
            poller.shutdown().await;
        }
        Commands::Acknowledge { endpoint } => {
            let detector = build_detector(&cfg, endpoint, cfg.detector.mode)?;
            let outcome = detector.check().await;
            if outcome == CheckOutcome::Skipped {
                anyhow::bail!("version endpoint unreachable, nothing acknowledged");
            }
            match detector.acknowledge()? {
                Some(version) => println!("acknowledged {version}"),
                None => println!("nothing to acknowledge"),
            }
        }
        Commands::Reset => {
            let detector = build_detector(&cfg, None, cfg.detector.mode)?;
            detector.reset()?;
            println!("update state cleared");
        }
        Commands::Stamp { file } => {
            let path = file.unwrap_or_else(|| cfg.version.file.clone());
            let meta = build_info::stamp(&path)?;
            println!("{} (build {})", meta.version, meta.build_number);
        }
    }

    Ok(())
}

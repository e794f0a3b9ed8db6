//! Line-oriented debug console for the update detector.
//!
//! Only attached in development mode, where it replaces poking at global
//! state: `reset` clears the persisted version, `status` prints what the
//! detector currently believes.

use crate::config::RuntimeMode;
use crate::errors::{UpdateError, UpdateResult};
use crate::storage::VersionStore;
use crate::update_detector::UpdateDetector;
use crate::version_client::VersionFetcher;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Reset,
    Status,
    Check,
    Acknowledge,
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reset" => Ok(ConsoleCommand::Reset),
            "status" => Ok(ConsoleCommand::Status),
            "check" => Ok(ConsoleCommand::Check),
            "ack" | "acknowledge" => Ok(ConsoleCommand::Acknowledge),
            "help" | "?" => Ok(ConsoleCommand::Help),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

const HELP: &str = "commands: reset | status | check | ack | help";

/// Execute one command and return the text to print.
pub async fn execute<S, F>(detector: &UpdateDetector<S, F>, command: ConsoleCommand) -> String
where
    S: VersionStore,
    F: VersionFetcher,
{
    match command {
        ConsoleCommand::Reset => match detector.reset() {
            Ok(()) => "update state cleared; next check establishes a new baseline".to_string(),
            Err(e) => format!("reset failed: {e}"),
        },
        ConsoleCommand::Status => {
            let status = detector.status();
            let stored = match detector.store().load() {
                Ok(v) => v.unwrap_or_else(|| "<none>".to_string()),
                Err(e) => format!("<unavailable: {e}>"),
            };
            format!(
                "deployed={} stored={} update_available={}",
                status.current_version.as_deref().unwrap_or("<unknown>"),
                stored,
                status.update_available
            )
        }
        ConsoleCommand::Check => format!("{:?}", detector.check().await),
        ConsoleCommand::Acknowledge => match detector.acknowledge() {
            Ok(Some(v)) => format!("acknowledged {v}"),
            Ok(None) => "nothing fetched yet".to_string(),
            Err(e) => format!("acknowledge failed: {e}"),
        },
        ConsoleCommand::Help => HELP.to_string(),
    }
}

async fn respond<S, F, W>(detector: &UpdateDetector<S, F>, line: &str, output: &mut W) -> UpdateResult<()>
where
    S: VersionStore,
    F: VersionFetcher,
    W: AsyncWrite + Unpin,
{
    let reply = match line.parse::<ConsoleCommand>() {
        Ok(command) => execute(detector, command).await,
        Err(e) => e,
    };
    output
        .write_all(format!("{reply}\n").as_bytes())
        .await
        .map_err(|e| UpdateError::io("writing console output", e))?;
    output
        .flush()
        .await
        .map_err(|e| UpdateError::io("flushing console output", e))
}

/// Read commands from `input` until EOF, writing replies to `output`.
pub async fn run<S, F, R, W>(
    detector: Arc<UpdateDetector<S, F>>,
    input: R,
    mut output: W,
) -> UpdateResult<()>
where
    S: VersionStore,
    F: VersionFetcher,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| UpdateError::io("reading console input", e))?
    {
        if !line.trim().is_empty() {
            respond(&detector, &line, &mut output).await?;
        }
    }
    debug!("Debug console input closed");
    Ok(())
}

/// Like [`run`], but fed from a channel; ends when every sender is gone.
pub async fn run_lines<S, F, W>(
    detector: Arc<UpdateDetector<S, F>>,
    mut lines: mpsc::Receiver<String>,
    mut output: W,
) -> UpdateResult<()>
where
    S: VersionStore,
    F: VersionFetcher,
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        if !line.trim().is_empty() {
            respond(&detector, &line, &mut output).await?;
        }
    }
    debug!("Debug console input closed");
    Ok(())
}

/// Attach the console to stdin/stdout, but only in development mode.
///
/// Stdin is read on a detached OS thread: a pending read there never holds
/// up runtime shutdown, and aborting the returned task ends the console.
pub fn attach<S, F>(detector: &Arc<UpdateDetector<S, F>>) -> Option<JoinHandle<UpdateResult<()>>>
where
    S: VersionStore + 'static,
    F: VersionFetcher + 'static,
{
    if detector.mode() != RuntimeMode::Development {
        return None;
    }

    let (tx, rx) = mpsc::channel::<String>(16);
    let reader = std::thread::Builder::new()
        .name("ntm-debug-console".to_string())
        .spawn(move || {
            use std::io::BufRead;
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Debug console stopped reading stdin: {e}");
                        break;
                    }
                }
            }
        });
    if let Err(e) = reader {
        warn!("Debug console unavailable: {e}");
        return None;
    }

    let detector = Arc::clone(detector);
    Some(tokio::spawn(run_lines(detector, rx, tokio::io::stdout())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!("RESET".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Reset));
        assert_eq!(" ack ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Acknowledge));
        assert!("reload".parse::<ConsoleCommand>().is_err());
    }
}

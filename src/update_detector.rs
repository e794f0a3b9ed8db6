//! Update detector
//!
//! Periodically asks the version source which build is deployed and compares
//! it with the version this client last acknowledged. The persisted value is
//! only ever written on first run, on [`UpdateDetector::acknowledge`], or
//! removed by [`UpdateDetector::reset`]; a check alone never moves it.

use crate::config::RuntimeMode;
use crate::storage::VersionStore;
use crate::version_client::VersionFetcher;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::errors::UpdateResult;

/// What consumers of the detector observe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStatus {
    /// Version most recently reported by the server in this session.
    pub current_version: Option<String>,
    pub update_available: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Nothing was persisted; the deployed version became the baseline.
    Baseline { version: String },
    UpToDate { version: String },
    UpdateAvailable { known: String, deployed: String },
    /// Versions differ but development mode never prompts.
    Suppressed { known: String, deployed: String },
    /// The fetch failed; nothing changed.
    Skipped,
}

impl CheckOutcome {
    pub fn update_available(&self) -> bool {
        matches!(self, CheckOutcome::UpdateAvailable { .. })
    }
}

pub struct UpdateDetector<S, F> {
    store: S,
    fetcher: F,
    mode: RuntimeMode,
    status: watch::Sender<UpdateStatus>,
}

impl<S, F> UpdateDetector<S, F>
where
    S: VersionStore,
    F: VersionFetcher,
{
    pub fn new(store: S, fetcher: F, mode: RuntimeMode) -> Self {
        let (status, _) = watch::channel(UpdateStatus::default());
        Self {
            store,
            fetcher,
            mode,
            status,
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn status(&self) -> UpdateStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdateStatus> {
        self.status.subscribe()
    }

    /// Run one fetch-and-compare cycle.
    pub async fn check(&self) -> CheckOutcome {
        let deployed = match self.fetcher.fetch().await {
            Ok(info) => info.version,
            Err(e) => {
                warn!("Version check skipped: {e}");
                return CheckOutcome::Skipped;
            }
        };

        let known = match self.store.load() {
            Ok(known) => known,
            Err(e) => {
                warn!("Version store unreadable, treating as first run: {e}");
                None
            }
        };

        let outcome = match known {
            None => {
                if let Err(e) = self.store.save(&deployed) {
                    warn!("Failed to persist baseline version: {e}");
                }
                info!(version = %deployed, "Established baseline version");
                CheckOutcome::Baseline { version: deployed.clone() }
            }
            Some(known) if known == deployed => {
                debug!(version = %deployed, "Client is up to date");
                CheckOutcome::UpToDate { version: deployed.clone() }
            }
            Some(known) if self.mode.is_development() => {
                debug!(%known, %deployed, "Version changed in development mode, not prompting");
                CheckOutcome::Suppressed {
                    known,
                    deployed: deployed.clone(),
                }
            }
            Some(known) => {
                info!(%known, %deployed, "New version available");
                CheckOutcome::UpdateAvailable {
                    known,
                    deployed: deployed.clone(),
                }
            }
        };

        let flagged = outcome.update_available();
        self.status.send_modify(|status| {
            status.current_version = Some(deployed);
            status.update_available = flagged;
            status.last_checked = Some(Utc::now());
        });

        outcome
    }

    /// Accept the version most recently fetched as the new baseline.
    ///
    /// Returns the acknowledged version, or `None` when nothing was fetched yet.
    pub fn acknowledge(&self) -> UpdateResult<Option<String>> {
        let Some(deployed) = self.status.borrow().current_version.clone() else {
            return Ok(None);
        };

        self.store.save(&deployed)?;
        self.status.send_modify(|status| status.update_available = false);
        info!(version = %deployed, "Acknowledged version");
        Ok(Some(deployed))
    }

    /// Forget the persisted version so the next check behaves as a first run.
    pub fn reset(&self) -> UpdateResult<()> {
        self.store.clear()?;
        self.status.send_modify(|status| status.update_available = false);
        info!("Update state reset");
        Ok(())
    }
}

impl<S, F> UpdateDetector<S, F>
where
    S: VersionStore + 'static,
    F: VersionFetcher + 'static,
{
    /// Start the background poller. The first check runs immediately.
    ///
    /// A check still pending when its interval elapses is dropped and counts
    /// as a skipped cycle.
    ///
    /// In development mode only that first diagnostic check runs.
    pub fn spawn(self: &Arc<Self>, every: Duration) -> PollerHandle {
        let detector = Arc::clone(self);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            if detector.mode.is_development() {
                if tokio::time::timeout(every, detector.check()).await.is_err() {
                    warn!("Diagnostic version check exceeded {every:?}");
                }
                debug!("Development mode: periodic version checks disabled");
                let _ = stop_rx.await;
                return;
            }

            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        // a hung check must not hold back the next tick
                        if tokio::time::timeout(every, detector.check()).await.is_err() {
                            warn!("Version check exceeded {every:?}, abandoned until next tick");
                        }
                    }
                }
            }
            debug!("Version poller stopped");
        });

        PollerHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Owns the poller task; dropping it cancels the timer.
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling and wait for an in-flight check to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Version poller ended abnormally: {e}");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

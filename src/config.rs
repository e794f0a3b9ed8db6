// Runtime configuration for the NT Management update notifier
// Purpose: typed settings shared by the version endpoint and the update detector

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes local development builds from deployed ones.
///
/// Development builds regenerate their version identifier on every restart,
/// so the detector never raises the update flag while in this mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[serde(alias = "dev")]
    Development,
    #[default]
    #[serde(alias = "prod")]
    Production,
}

impl RuntimeMode {
    pub fn is_development(&self) -> bool {
        matches!(self, RuntimeMode::Development)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub version: VersionConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Settings for the server-side version source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConfig {
    /// Build-metadata record written by the build step.
    pub file: PathBuf,
    /// Prefix of the synthesized identifier when the record is unusable.
    pub default_version: String,
    /// Label reported as `environment` in the endpoint payload.
    pub environment: String,
    /// Name of the environment variable carrying the hosting provider's commit hash.
    pub commit_env: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("public/version.json"),
            default_version: "1.0.0".to_string(),
            environment: "production".to_string(),
            commit_env: "VERCEL_GIT_COMMIT_SHA".to_string(),
        }
    }
}

/// Settings for the client-side update detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub endpoint: String,
    pub poll_interval_secs: u64,
    /// Upper bound on a single version request.
    pub fetch_timeout_secs: u64,
    pub state_file: Option<PathBuf>,
    pub mode: RuntimeMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/version".to_string(),
            poll_interval_secs: 300,
            fetch_timeout_secs: 30,
            state_file: None,
            mode: RuntimeMode::Production,
        }
    }
}

impl DetectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Where the last acknowledged version lives when no path is configured.
    pub fn state_path(&self) -> PathBuf {
        match &self.state_file {
            Some(path) => path.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ntm_updater")
                .join("last_known_version"),
        }
    }
}

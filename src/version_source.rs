//! Version source
//!
//! Answers "which build is deployed right now?". The strategy is picked once
//! at startup: a hosting-provider commit hash when the platform injects one,
//! otherwise the build-metadata record on disk.

use crate::build_info::BuildMetadata;
use crate::config::VersionConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Which mechanism produced a version identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionOrigin {
    VercelGit,
    VersionFile,
}

/// Payload of `GET /api/version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
    pub environment: String,
    pub source: VersionOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionStrategy {
    /// Commit hash supplied by the hosting platform, used verbatim.
    HostedCommit { commit: String },
    /// Build-metadata record, with a synthesized identifier when it is unusable.
    VersionFile {
        path: PathBuf,
        default_version: String,
    },
}

impl VersionStrategy {
    /// Pick the strategy from configuration and the process environment.
    pub fn select(cfg: &VersionConfig) -> Self {
        let commit = std::env::var(&cfg.commit_env)
            .ok()
            .filter(|v| !v.is_empty());
        Self::select_with(cfg, commit)
    }

    pub fn select_with(cfg: &VersionConfig, commit: Option<String>) -> Self {
        match commit {
            Some(commit) => VersionStrategy::HostedCommit { commit },
            None => VersionStrategy::VersionFile {
                path: cfg.file.clone(),
                default_version: cfg.default_version.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionSource {
    strategy: VersionStrategy,
    environment: String,
}

impl VersionSource {
    pub fn new(strategy: VersionStrategy, environment: impl Into<String>) -> Self {
        Self {
            strategy,
            environment: environment.into(),
        }
    }

    pub fn from_config(cfg: &VersionConfig) -> Self {
        let source = Self::new(VersionStrategy::select(cfg), cfg.environment.clone());
        match &source.strategy {
            VersionStrategy::HostedCommit { .. } => {
                info!("Version source: hosting commit from {}", cfg.commit_env)
            }
            VersionStrategy::VersionFile { path, .. } => {
                info!("Version source: build metadata at {}", path.display())
            }
        }
        source
    }

    pub fn strategy(&self) -> &VersionStrategy {
        &self.strategy
    }

    pub fn current(&self) -> VersionInfo {
        self.current_at(Utc::now())
    }

    /// Resolve the deployed version as of `now`. Never fails.
    pub fn current_at(&self, now: DateTime<Utc>) -> VersionInfo {
        let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        match &self.strategy {
            VersionStrategy::HostedCommit { commit } => VersionInfo {
                version: commit.clone(),
                timestamp: stamp,
                build_number: None,
                environment: self.environment.clone(),
                source: VersionOrigin::VercelGit,
            },
            VersionStrategy::VersionFile {
                path,
                default_version,
            } => match BuildMetadata::read(path) {
                Ok(meta) => {
                    debug!(version = %meta.version, "Read build metadata");
                    VersionInfo {
                        version: meta.version,
                        timestamp: meta.timestamp,
                        build_number: Some(meta.build_number),
                        environment: self.environment.clone(),
                        source: VersionOrigin::VersionFile,
                    }
                }
                Err(e) => {
                    warn!("Build metadata unavailable, using fallback version: {e}");
                    VersionInfo {
                        version: format!("{default_version}-{}", now.timestamp_millis()),
                        timestamp: stamp,
                        build_number: None,
                        environment: self.environment.clone(),
                        source: VersionOrigin::VersionFile,
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn file_source(path: PathBuf) -> VersionSource {
        VersionSource::new(
            VersionStrategy::VersionFile {
                path,
                default_version: "1.0.0".into(),
            },
            "production",
        )
    }

    #[test]
    fn hosted_commit_takes_precedence() {
        let cfg = VersionConfig::default();
        let strategy = VersionStrategy::select_with(&cfg, Some("abc123".into()));
        let info = VersionSource::new(strategy, "production").current();

        assert_eq!(info.version, "abc123");
        assert_eq!(info.source, VersionOrigin::VercelGit);
        assert_eq!(info.build_number, None);
    }

    #[test]
    fn select_reads_commit_from_environment() {
        figment::Jail::expect_with(|jail| {
            let cfg = VersionConfig::default();

            jail.set_env("VERCEL_GIT_COMMIT_SHA", " 4f2a9c1\n");
            assert_eq!(
                VersionStrategy::select(&cfg),
                VersionStrategy::HostedCommit {
                    commit: " 4f2a9c1\n".into()
                }
            );

            jail.set_env("VERCEL_GIT_COMMIT_SHA", "");
            assert!(matches!(
                VersionStrategy::select(&cfg),
                VersionStrategy::VersionFile { .. }
            ));
            Ok(())
        });
    }

    #[test]
    fn select_without_commit_uses_version_file() {
        figment::Jail::expect_with(|jail| {
            let cfg = VersionConfig {
                commit_env: "NTM_TEST_UNSET_COMMIT".into(),
                ..VersionConfig::default()
            };
            jail.set_env("VERCEL_GIT_COMMIT_SHA", "ignored");

            assert_eq!(
                VersionStrategy::select(&cfg),
                VersionStrategy::VersionFile {
                    path: cfg.file.clone(),
                    default_version: "1.0.0".into(),
                }
            );
            Ok(())
        });
    }

    #[test]
    fn reads_build_metadata_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.json");
        fs::write(
            &path,
            r#"{"version":"build-2000","timestamp":"2025-02-02T10:00:00.000Z","buildNumber":2000}"#,
        )
        .unwrap();

        let info = file_source(path).current();
        assert_eq!(info.version, "build-2000");
        assert_eq!(info.timestamp, "2025-02-02T10:00:00.000Z");
        assert_eq!(info.build_number, Some(2000));
        assert_eq!(info.source, VersionOrigin::VersionFile);
    }

    #[test]
    fn missing_metadata_synthesizes_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();

        let info = file_source(dir.path().join("absent.json")).current_at(now);
        assert_eq!(info.version, format!("1.0.0-{}", now.timestamp_millis()));
        assert_eq!(info.timestamp, "2025-06-01T08:30:00.000Z");
        assert_eq!(info.source, VersionOrigin::VersionFile);
    }

    #[test]
    fn malformed_metadata_falls_back_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.json");
        fs::write(&path, "{\"version\": 42").unwrap();

        let info = file_source(path).current();
        assert!(info.version.starts_with("1.0.0-"));
    }

    #[test]
    fn payload_serializes_with_wire_names() {
        let info = VersionInfo {
            version: "abc".into(),
            timestamp: "2025-01-01T00:00:00.000Z".into(),
            build_number: None,
            environment: "production".into(),
            source: VersionOrigin::VercelGit,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["source"], "vercel-git");
        assert!(json.get("buildNumber").is_none());
    }
}

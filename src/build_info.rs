//! Build-metadata record
//!
//! The build step writes a small JSON document describing the build it just
//! produced. The version source reads it on every request; the `stamp`
//! command produces a fresh one.

use crate::errors::{UpdateError, UpdateResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// First build number handed out when no previous record exists.
pub const FIRST_BUILD_NUMBER: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetadata {
    pub version: String,
    pub timestamp: String,
    pub build_number: u64,
}

impl BuildMetadata {
    /// Metadata for the build following `previous`, stamped at `now`.
    pub fn next(previous: Option<&BuildMetadata>, now: DateTime<Utc>) -> Self {
        let build_number = previous
            .map(|p| p.build_number + 1)
            .unwrap_or(FIRST_BUILD_NUMBER);

        Self {
            version: format!("build-{build_number}-{}", now.timestamp_millis()),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            build_number,
        }
    }

    pub fn read(path: &Path) -> UpdateResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| UpdateError::io(format!("reading {}", path.display()), e))?;
        serde_json::from_str(&content)
            .map_err(|e| UpdateError::serialization(format!("parsing {}", path.display()), e))
    }

    /// Write the record through a sibling temp file so readers never see half a document.
    pub fn write(&self, path: &Path) -> UpdateResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| UpdateError::io(format!("creating {}", parent.display()), e))?;
            }
        }

        let body = serde_json::to_string_pretty(self)
            .map_err(|e| UpdateError::serialization("encoding build metadata", e))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .map_err(|e| UpdateError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, path)
            .map_err(|e| UpdateError::io(format!("replacing {}", path.display()), e))?;
        Ok(())
    }
}

/// Generate the next build-metadata record at `path`.
///
/// An unreadable previous record restarts numbering rather than failing the build.
pub fn stamp(path: &Path) -> UpdateResult<BuildMetadata> {
    let previous = BuildMetadata::read(path).ok();
    let meta = BuildMetadata::next(previous.as_ref(), Utc::now());
    meta.write(path)?;

    info!(
        version = %meta.version,
        build_number = meta.build_number,
        "Stamped build metadata at {}",
        path.display()
    );
    Ok(meta)
}

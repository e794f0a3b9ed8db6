//! Library root for the `ntm_updater` crate
//! Version endpoint and client-side update detection for NT Management

// Core error handling
pub mod errors;

// Configuration & CLI
pub mod cli;
pub mod config;
pub mod config_loader;

// Version source (server side)
pub mod build_info;
pub mod version_source;

// Web server interface
pub mod versionweb;

// Update detection (client side)
pub mod debug_console;
pub mod storage;
pub mod update_detector;
pub mod version_client;

pub use errors::{UpdateError, UpdateResult};
pub use update_detector::{CheckOutcome, PollerHandle, UpdateDetector, UpdateStatus};
pub use version_source::{VersionInfo, VersionOrigin, VersionSource, VersionStrategy};

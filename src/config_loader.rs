use crate::config::AppConfig;
use crate::errors::{UpdateError, UpdateResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

/// Default configuration file, overridable with `NTM_CONFIG`.
pub const DEFAULT_CONFIG_FILE: &str = "ntm.toml";

/// Layered configuration: built-in defaults, then the TOML file, then `NTM_*` env.
///
/// Nested keys use a double underscore, e.g. `NTM_DETECTOR__POLL_INTERVAL_SECS=60`.
pub fn build_figment(path: Option<&str>) -> Figment {
    let path = path
        .map(str::to_string)
        .or_else(|| std::env::var("NTM_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NTM_").ignore(&["config"]).split("__"))
}

pub fn load_config(path: Option<&str>) -> UpdateResult<AppConfig> {
    let config: AppConfig = build_figment(path).extract()?;

    if config.detector.poll_interval_secs == 0 {
        return Err(UpdateError::config("detector.poll_interval_secs must be positive"));
    }

    if config.detector.fetch_timeout_secs == 0 {
        return Err(UpdateError::config("detector.fetch_timeout_secs must be positive"));
    }

    if config.detector.endpoint.trim().is_empty() {
        return Err(UpdateError::config("detector.endpoint cannot be empty"));
    }

    Ok(config)
}

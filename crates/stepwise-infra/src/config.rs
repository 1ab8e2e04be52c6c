//! Engine configuration loader for stepwise.
//!
//! Reads a TOML file (conventionally `stepwise.toml`) into [`EngineConfig`],
//! then applies environment overrides. Falls back to defaults when the file
//! is missing or malformed.

use std::path::Path;

use stepwise_types::config::EngineConfig;

/// Base URL of the OCR / forecast microservice.
pub const ENV_DL_SERVICE_URL: &str = "DL_SERVICE_URL";
/// Request timeout (seconds) for the OCR / forecast microservice.
pub const ENV_DL_SERVICE_TIMEOUT: &str = "DL_SERVICE_TIMEOUT";
/// Fail-fast policy (`true`/`false`, `1`/`0`).
pub const ENV_HALT_ON_ERROR: &str = "STEPWISE_HALT_ON_ERROR";

/// Load the engine configuration from `path`, then apply env overrides.
///
/// - If `path` is `None` or the file does not exist, starts from [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and starts from the default.
pub async fn load_engine_config(path: Option<&Path>) -> EngineConfig {
    let config = match path {
        Some(path) => read_config_file(path).await,
        None => EngineConfig::default(),
    };
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

async fn read_config_file(path: &Path) -> EngineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            EngineConfig::default()
        }
    }
}

/// Apply overrides looked up through `lookup` (normally the process env).
///
/// Unparsable values are ignored with a warning.
pub fn apply_env_overrides<F>(mut config: EngineConfig, lookup: F) -> EngineConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_DL_SERVICE_URL).filter(|v| !v.trim().is_empty()) {
        config.connectors.dl_service_url = url.trim().trim_end_matches('/').to_string();
    }

    if let Some(raw) = lookup(ENV_DL_SERVICE_TIMEOUT) {
        match raw.trim().parse::<u64>() {
            Ok(secs) => config.connectors.dl_service_timeout_secs = secs,
            Err(_) => tracing::warn!("Ignoring {ENV_DL_SERVICE_TIMEOUT}={raw:?}: not a number of seconds"),
        }
    }

    if let Some(raw) = lookup(ENV_HALT_ON_ERROR) {
        match parse_bool(&raw) {
            Some(halt) => config.halt_on_error = halt,
            None => tracing::warn!("Ignoring {ENV_HALT_ON_ERROR}={raw:?}: expected true or false"),
        }
    }

    config
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

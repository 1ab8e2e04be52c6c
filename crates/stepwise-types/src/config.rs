//! Engine configuration types for stepwise.
//!
//! `EngineConfig` represents the `stepwise.toml` that controls the failure
//! policy, graph validation strictness, step limits, and connector endpoints.
//! All fields have sensible defaults, so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Maximum size of a single step output (1 MB).
pub const DEFAULT_MAX_STEP_OUTPUT_BYTES: usize = 1_048_576;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Halt the whole run on the first step error (fail-fast). When false,
    /// independent branches keep running and only descendants are skipped.
    #[serde(default = "default_halt_on_error")]
    pub halt_on_error: bool,

    /// Reject transitions that reference unknown step ids instead of
    /// silently dropping them.
    #[serde(default)]
    pub strict_edges: bool,

    /// Per-step timeout in seconds. `None` means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,

    /// Outputs larger than this (serialized) are replaced by a truncation marker.
    #[serde(default = "default_max_step_output_bytes")]
    pub max_step_output_bytes: usize,

    /// Connector endpoint settings.
    #[serde(default)]
    pub connectors: ConnectorSettings,
}

fn default_halt_on_error() -> bool {
    true
}

fn default_max_step_output_bytes() -> usize {
    DEFAULT_MAX_STEP_OUTPUT_BYTES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            halt_on_error: default_halt_on_error(),
            strict_edges: false,
            step_timeout_secs: None,
            max_step_output_bytes: default_max_step_output_bytes(),
            connectors: ConnectorSettings::default(),
        }
    }
}

/// Endpoints and timeouts for the HTTP-backed connectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSettings {
    /// Base URL of the OCR / demand-forecast microservice.
    #[serde(default = "default_dl_service_url")]
    pub dl_service_url: String,

    /// Request timeout for the OCR / forecast microservice, in seconds.
    #[serde(default = "default_dl_service_timeout_secs")]
    pub dl_service_timeout_secs: u64,

    /// Request timeout for outgoing webhooks, in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

fn default_dl_service_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_dl_service_timeout_secs() -> u64 {
    30
}

fn default_webhook_timeout_secs() -> u64 {
    5
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            dl_service_url: default_dl_service_url(),
            dl_service_timeout_secs: default_dl_service_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

//! Connector backends.
//!
//! - [`webhook`]: outgoing HTTP webhooks via `reqwest`
//! - [`dl_service`]: OCR detection and demand forecasting microservice
//! - [`offline`]: in-memory spreadsheet, document, and mail simulation
//!
//! [`build_connectors`] wires them into the `Connectors` set the built-in
//! step handlers consume.

pub mod dl_service;
pub mod offline;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use stepwise_core::workflow::connector::{ConnectorError, Connectors};
use stepwise_types::config::EngineConfig;

use self::dl_service::DlServiceClient;
use self::offline::OfflineWorkspace;
use self::webhook::HttpWebhookBackend;

/// User agent sent by every outgoing connector request.
pub const USER_AGENT: &str = concat!("stepwise/", env!("CARGO_PKG_VERSION"));

/// Build a `reqwest` client with the shared user agent and a request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ConnectorError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ConnectorError::Unavailable(format!("failed to build HTTP client: {e}")))
}

/// Assemble the default connector set from the engine config.
///
/// Webhooks and inference go over HTTP; spreadsheets, documents, and mail use
/// the offline workspace.
pub fn build_connectors(config: &EngineConfig) -> Result<Connectors, ConnectorError> {
    let settings = &config.connectors;
    let webhooks = Arc::new(HttpWebhookBackend::new(settings.webhook_timeout_secs)?);
    let inference = Arc::new(DlServiceClient::new(
        &settings.dl_service_url,
        settings.dl_service_timeout_secs,
    )?);
    let workspace = Arc::new(OfflineWorkspace::new());

    tracing::debug!(
        dl_service_url = %settings.dl_service_url,
        webhook_timeout_secs = settings.webhook_timeout_secs,
        "connectors initialized"
    );

    Ok(Connectors {
        sheets: workspace.clone(),
        documents: workspace.clone(),
        mail: workspace,
        webhooks,
        inference,
    })
}

/// Local HTTP server fixture for connector tests.
#[cfg(test)]
pub(crate) mod test_server {
    /// Serve `app` on an ephemeral port and return its base URL.
    pub async fn spawn(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_connectors_uses_offline_workspace() {
        let connectors = build_connectors(&EngineConfig::default()).unwrap();
        let rows = connectors.sheets.read_range("any", "A1:C4", None).await.unwrap();
        assert_eq!(rows[1][0], "Alice");
        let text = connectors.documents.read_document("doc", None).await.unwrap();
        assert_eq!(text, "This is the content of the Google Doc.");
    }
}

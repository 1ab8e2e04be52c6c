//! Outgoing HTTP webhooks.
//!
//! `POST` sends the payload as a JSON body; `GET` sends an object payload as
//! query parameters. The response body is decoded as JSON when possible and
//! kept as text otherwise.

use serde_json::{json, Value};
use stepwise_core::workflow::connector::{
    ConnectorError, ConnectorFuture, WebhookBackend, WebhookMethod, WebhookRequest,
};
use stepwise_core::workflow::expression::value_to_string;

use super::http_client;

/// [`WebhookBackend`] over a shared `reqwest::Client`.
pub struct HttpWebhookBackend {
    client: reqwest::Client,
}

impl HttpWebhookBackend {
    pub fn new(timeout_secs: u64) -> Result<Self, ConnectorError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
        })
    }

    async fn call(&self, request: WebhookRequest) -> Result<Value, ConnectorError> {
        let builder = match request.method {
            WebhookMethod::Post => self.client.post(&request.url).json(&request.payload),
            WebhookMethod::Get => self.client.get(&request.url).query(&query_pairs(&request.payload)),
        };

        let response = builder.send().await.map_err(|e| {
            ConnectorError::Request(format!("{} {} failed: {e}", request.method, request.url))
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ConnectorError::Decode(format!("failed to read webhook response: {e}")))?;

        tracing::info!(
            url = request.url.as_str(),
            method = %request.method,
            status,
            body_len = text.len(),
            "webhook call completed"
        );

        if status >= 400 {
            return Err(ConnectorError::Status { status, body: text });
        }

        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Ok(json!({
            "status": "success",
            "status_code": status,
            "response": body,
        }))
    }
}

impl WebhookBackend for HttpWebhookBackend {
    fn send<'a>(&'a self, request: WebhookRequest) -> ConnectorFuture<'a, Value> {
        Box::pin(self.call(request))
    }
}

/// Query parameters for a `GET` payload. Only object payloads contribute.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        _ => Vec::new(),
    }
}

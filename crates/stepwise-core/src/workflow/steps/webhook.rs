//! Webhook steps: generic HTTP calls and chat-style notifications.
//!
//! - **Generic**: `url`, `method` (`POST` default, or `GET`), `body` template
//!   (default `{}`). A URL that does not start with `http` is not called; the
//!   step succeeds with `{"status":"skipped","reason":"Invalid URL"}`.
//! - **Slack**: posts `{"text": message}`.
//! - **Discord**: posts `{"content": message}`.
//!
//! Chat flavors do not call a non-http URL either; the step succeeds with
//! `{"status":"error","message":"Invalid <flavor> Webhook URL"}`. They fall
//! back to the first parent's output when `message` is blank.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::workflow::connector::{WebhookBackend, WebhookMethod, WebhookRequest};
use crate::workflow::registry::{
    AutoPass, StepError, StepFuture, StepHandler, StepInput, StepOutput,
};

/// Payload shape of a webhook step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookFlavor {
    Generic,
    Slack,
    Discord,
}

impl WebhookFlavor {
    /// Parse the `flavor` config value of `webhook_notify`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "make" | "" => Some(WebhookFlavor::Generic),
            "slack" => Some(WebhookFlavor::Slack),
            "discord" => Some(WebhookFlavor::Discord),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WebhookFlavor::Generic => "Webhook",
            WebhookFlavor::Slack => "Slack Webhook",
            WebhookFlavor::Discord => "Discord Webhook",
        }
    }
}

pub struct WebhookHandler {
    backend: Arc<dyn WebhookBackend>,
    /// Fixed flavor, or `None` to read it from the step's `flavor` field.
    flavor: Option<WebhookFlavor>,
}

impl WebhookHandler {
    pub fn new(backend: Arc<dyn WebhookBackend>, flavor: WebhookFlavor) -> Self {
        Self {
            backend,
            flavor: Some(flavor),
        }
    }

    /// Flavor chosen per step by `config.flavor` (default generic).
    pub fn configurable(backend: Arc<dyn WebhookBackend>) -> Self {
        Self {
            backend,
            flavor: None,
        }
    }

    fn flavor_for(&self, config: &Map<String, Value>) -> Result<WebhookFlavor, StepError> {
        if let Some(fixed) = self.flavor {
            return Ok(fixed);
        }
        match config.get("flavor") {
            None | Some(Value::Null) => Ok(WebhookFlavor::Generic),
            Some(Value::String(s)) => WebhookFlavor::parse(s).ok_or_else(|| {
                StepError::InvalidConfig(format!("unknown webhook flavor '{}'", s))
            }),
            Some(other) => Err(StepError::InvalidConfig(format!(
                "webhook flavor must be a string, got {}",
                other
            ))),
        }
    }
}

impl StepHandler for WebhookHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["url", "body", "message"]
    }

    fn auto_pass(&self, config: &Map<String, Value>) -> Option<AutoPass> {
        match self.flavor_for(config) {
            Ok(WebhookFlavor::Slack | WebhookFlavor::Discord) => Some(AutoPass::field("message")),
            _ => None,
        }
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let flavor = self.flavor_for(input.config.as_map())?;
            let url = input.config.text("url").unwrap_or_default();

            let request = match flavor {
                WebhookFlavor::Generic => {
                    if !url.starts_with("http") {
                        return Ok(StepOutput::Value(
                            json!({ "status": "skipped", "reason": "Invalid URL" }),
                        ));
                    }
                    let method_name = input.config.text_or("method", "POST");
                    let method = WebhookMethod::parse(&method_name).ok_or_else(|| {
                        StepError::InvalidConfig(format!("unsupported method '{}'", method_name))
                    })?;
                    let payload = match input.config.get("body") {
                        None | Some(Value::Null) => json!({}),
                        Some(Value::String(s)) if s.is_empty() => json!({}),
                        Some(body) => body.clone(),
                    };
                    WebhookRequest {
                        url,
                        method,
                        payload,
                    }
                }
                WebhookFlavor::Slack | WebhookFlavor::Discord => {
                    if !url.starts_with("http") {
                        return Ok(StepOutput::Value(json!({
                            "status": "error",
                            "message": format!("Invalid {} URL", flavor.label()),
                        })));
                    }
                    let message = input.config.text("message").unwrap_or_default();
                    let payload = if flavor == WebhookFlavor::Slack {
                        json!({ "text": message })
                    } else {
                        json!({ "content": message })
                    };
                    WebhookRequest {
                        url,
                        method: WebhookMethod::Post,
                        payload,
                    }
                }
            };

            tracing::debug!(
                step_id = input.step_id,
                url = %request.url,
                method = %request.method,
                "calling webhook"
            );
            let summary = self.backend.send(request).await?;
            Ok(StepOutput::Value(summary))
        })
    }
}

//! Email send step.
//!
//! A non-empty `title` is prepended to the body, separated by a blank line.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::workflow::connector::{MailBackend, MailMessage};
use crate::workflow::registry::{AutoPass, StepFuture, StepHandler, StepInput, StepOutput};

const DEFAULT_SUBJECT: &str = "Workflow Notification";

pub struct EmailSendHandler {
    backend: Arc<dyn MailBackend>,
}

impl EmailSendHandler {
    pub fn new(backend: Arc<dyn MailBackend>) -> Self {
        Self { backend }
    }
}

impl StepHandler for EmailSendHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["to", "subject", "title", "body"]
    }

    fn auto_pass(&self, _config: &Map<String, Value>) -> Option<AutoPass> {
        Some(AutoPass::field("body"))
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let to = input.config.require_text("to")?;
            let subject = input.config.text_or("subject", DEFAULT_SUBJECT);
            let body = compose_body(
                input.config.text("title").as_deref(),
                &input.config.text("body").unwrap_or_default(),
            );

            tracing::debug!(step_id = input.step_id, to = %to, "sending email");
            let ack = self
                .backend
                .send_mail(MailMessage { to, subject, body }, input.credentials)
                .await?;
            Ok(StepOutput::Value(ack))
        })
    }
}

/// Prepend the title (when present) to the body.
pub fn compose_body(title: Option<&str>, body: &str) -> String {
    match title {
        Some(title) if !title.is_empty() => format!("{title}\n\n{body}"),
        _ => body.to_string(),
    }
}

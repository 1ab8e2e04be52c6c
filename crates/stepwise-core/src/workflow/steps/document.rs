//! Document read and write steps.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::workflow::connector::DocumentBackend;
use crate::workflow::registry::{AutoPass, StepFuture, StepHandler, StepInput, StepOutput};

/// Outputs the plain text of a document.
pub struct DocReadHandler {
    backend: Arc<dyn DocumentBackend>,
}

impl DocReadHandler {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }
}

impl StepHandler for DocReadHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["docId"]
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let doc_id = input.config.require_text("docId")?;
            let text = self.backend.read_document(&doc_id, input.credentials).await?;
            Ok(StepOutput::Value(Value::String(text)))
        })
    }
}

/// Appends templated text to a document.
pub struct DocWriteHandler {
    backend: Arc<dyn DocumentBackend>,
}

impl DocWriteHandler {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }
}

impl StepHandler for DocWriteHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["docId", "body"]
    }

    fn auto_pass(&self, _config: &Map<String, Value>) -> Option<AutoPass> {
        Some(AutoPass::field("body"))
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let doc_id = input.config.require_text("docId")?;
            let body = input.config.text("body").unwrap_or_default();
            let ack = self
                .backend
                .write_document(&doc_id, body, input.credentials)
                .await?;
            Ok(StepOutput::Value(ack))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::context::ExecutionContext;
    use crate::workflow::registry::StepRegistry;
    use crate::workflow::steps::testing::{connectors, step, RecordingBackend};
    use serde_json::json;

    #[tokio::test]
    async fn test_doc_read_outputs_text() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend));
        let out = registry
            .dispatch(
                &step("1", "google_doc_read", json!({ "docId": "doc-9" })),
                &[],
                &ExecutionContext::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(out, StepOutput::Value(json!("contents of doc-9")));
    }

    #[tokio::test]
    async fn test_doc_write_stringifies_parent_output() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend.clone()));
        let mut ctx = ExecutionContext::default();
        ctx.insert("1", json!({ "total": 3 })).unwrap();

        registry
            .dispatch(
                &step("2", "doc_write", json!({ "docId": "log" })),
                &["1".to_string()],
                &ctx,
                None,
            )
            .await
            .unwrap();
        assert_eq!(backend.calls()[0]["body"], json!(r#"{"total":3}"#));
    }
}

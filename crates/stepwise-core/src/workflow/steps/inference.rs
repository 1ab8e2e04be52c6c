//! OCR detection and demand-forecast steps, backed by the inference service.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::workflow::connector::InferenceBackend;
use crate::workflow::registry::{
    AutoPass, StepError, StepFuture, StepHandler, StepInput, StepOutput,
};

// ---------------------------------------------------------------------------
// ocr_detect
// ---------------------------------------------------------------------------

/// Runs OCR on `file` (a local path or URL). When `file` is blank, the first
/// parent output that looks like a file reference is used.
pub struct OcrDetectHandler {
    backend: Arc<dyn InferenceBackend>,
}

impl OcrDetectHandler {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

impl StepHandler for OcrDetectHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["file"]
    }

    fn auto_pass(&self, _config: &Map<String, Value>) -> Option<AutoPass> {
        Some(AutoPass::when("file", looks_like_file_reference))
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let file = input.config.require_text("file")?;
            if !looks_like_file_reference(&Value::String(file.clone())) {
                return Err(StepError::InvalidConfig(format!(
                    "'{}' is not a file path or URL",
                    file
                )));
            }
            let detection = self.backend.detect(&file).await?;
            Ok(StepOutput::Value(detection))
        })
    }
}

/// A single-line string that is a URL or has a path separator or extension.
pub fn looks_like_file_reference(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let s = s.trim();
    if s.is_empty() || s.contains('\n') {
        return false;
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        return true;
    }
    let has_extension = s
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty() && (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });
    s.contains('/') || s.contains('\\') || has_extension
}

// ---------------------------------------------------------------------------
// forecast_predict
// ---------------------------------------------------------------------------

/// Sends structured `data` (or the first parent's output) to the forecaster.
pub struct ForecastPredictHandler {
    backend: Arc<dyn InferenceBackend>,
}

impl ForecastPredictHandler {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

impl StepHandler for ForecastPredictHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["data"]
    }

    fn auto_pass(&self, _config: &Map<String, Value>) -> Option<AutoPass> {
        Some(AutoPass::field("data"))
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let data = match input.config.get("data") {
                None | Some(Value::Null) => {
                    return Err(StepError::InvalidConfig("missing 'data'".to_string()));
                }
                Some(v) => v.clone(),
            };
            let prediction = self.backend.forecast(data).await?;
            Ok(StepOutput::Value(prediction))
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

    #[test]
    fn test_file_reference_heuristic() {
        assert!(looks_like_file_reference(&json!("/tmp/receipt.png")));
        assert!(looks_like_file_reference(&json!("receipt.jpg")));
        assert!(looks_like_file_reference(&json!("https://cdn.example.com/r")));
        assert!(looks_like_file_reference(&json!("C:\\scans\\r1")));
        assert!(!looks_like_file_reference(&json!("just some words")));
        assert!(!looks_like_file_reference(&json!("line one\nline/two")));
        assert!(!looks_like_file_reference(&json!(["a.png"])));
    }

    #[tokio::test]
    async fn test_ocr_auto_passes_path_from_parent() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend.clone()));
        let mut ctx = ExecutionContext::default();
        ctx.insert("a", json!({ "not": "a path" })).unwrap();
        ctx.insert("b", json!("uploads/invoice.pdf")).unwrap();
        let parents = vec!["a".to_string(), "b".to_string()];

        let s = step("c", "ocr_detect", json!({}));
        let prepared = registry.prepare(&s, &parents, &ctx, None);
        assert_eq!(prepared.auto_passed_from(), Some("b"));
        prepared.run().await.unwrap();
        assert_eq!(backend.calls()[0]["file"], json!("uploads/invoice.pdf"));
    }

    #[tokio::test]
    async fn test_ocr_without_file_fails() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend));
        let err = registry
            .dispatch(&step("1", "ocr_detect", json!({})), &[], &ExecutionContext::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_forecast_uses_template_data() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend.clone()));
        let mut ctx = ExecutionContext::default();
        ctx.insert("sales", json!({ "history": [5, 6, 7] })).unwrap();

        let out = registry
            .dispatch(
                &step("f", "forecast_predict", json!({ "data": "{{sales.history}}" })),
                &["sales".to_string()],
                &ctx,
                None,
            )
            .await
            .unwrap();
        assert_eq!(out, StepOutput::Value(json!({ "forecast": [10, 12, 14] })));
        assert_eq!(backend.calls()[0]["input"], json!([5, 6, 7]));
    }
}

//! Keyword filter gate.
//!
//! Passes when the keyword occurs (case-insensitively) in the string form of
//! any direct parent's output, or when the keyword is empty. Otherwise the
//! step stops and its descendants are skipped.

use serde_json::json;

use crate::workflow::expression::value_to_string;
use crate::workflow::registry::{StepFuture, StepHandler, StepInput, StepOutput};

pub const FILTER_FAILED_REASON: &str = "Filter condition failed";

pub struct FilterGateHandler;

impl StepHandler for FilterGateHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["keyword"]
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let keyword = input.config.text("keyword").unwrap_or_default();
            if keyword_matches(&keyword, &input.parent_outputs) {
                Ok(StepOutput::Value(
                    json!({ "filtered": false, "message": "Condition met" }),
                ))
            } else {
                tracing::debug!(step_id = input.step_id, keyword = %keyword, "filter condition failed");
                Ok(StepOutput::Stopped {
                    reason: FILTER_FAILED_REASON.to_string(),
                })
            }
        })
    }
}

fn keyword_matches(keyword: &str, parent_outputs: &[serde_json::Value]) -> bool {
    if keyword.is_empty() {
        return true;
    }
    let needle = keyword.to_lowercase();
    parent_outputs
        .iter()
        .any(|output| value_to_string(output).to_lowercase().contains(&needle))
}

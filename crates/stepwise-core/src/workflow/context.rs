//! Per-run execution context: the write-once store of step outputs.
//!
//! `ExecutionContext` is owned by the executor for the lifetime of one run.
//! Handlers and the expression resolver only ever see it by shared reference.

use std::collections::HashMap;

use serde_json::{json, Value};
use stepwise_types::config::DEFAULT_MAX_STEP_OUTPUT_BYTES;

use super::definition::WorkflowError;

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Step outputs keyed by step id, accumulated as a run progresses.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    outputs: HashMap<String, Value>,
    max_output_bytes: usize,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEP_OUTPUT_BYTES)
    }
}

impl ExecutionContext {
    /// Create an empty context with the given per-output size limit.
    pub fn new(max_output_bytes: usize) -> Self {
        Self {
            outputs: HashMap::new(),
            max_output_bytes,
        }
    }

    /// Record the output of a finished step and return the stored value.
    ///
    /// Each step id may be written once per run. Outputs whose serialized
    /// form exceeds the size limit are replaced by a truncation marker.
    pub fn insert(&mut self, step_id: &str, output: Value) -> Result<Value, WorkflowError> {
        if self.outputs.contains_key(step_id) {
            return Err(WorkflowError::ExecutionError(format!(
                "output for step '{}' already recorded",
                step_id
            )));
        }

        let serialized = serde_json::to_string(&output)
            .map_err(|e| WorkflowError::ExecutionError(e.to_string()))?;

        let stored = if serialized.len() > self.max_output_bytes {
            tracing::warn!(
                step_id,
                size = serialized.len(),
                max = self.max_output_bytes,
                "step output exceeds size limit, truncating"
            );
            json!({
                "_truncated": true,
                "_original_size": serialized.len(),
                "_message": format!(
                    "output exceeded {} byte limit and was truncated",
                    self.max_output_bytes
                )
            })
        } else {
            output
        };

        self.outputs.insert(step_id.to_string(), stored.clone());
        Ok(stored)
    }

    /// Output of a finished step, if it produced one.
    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.outputs.get(step_id)
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.outputs.contains_key(step_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Outputs of the given steps, in the given order, skipping any that
    /// have not produced output.
    pub fn outputs_of(&self, step_ids: &[String]) -> Vec<Value> {
        step_ids
            .iter()
            .filter_map(|id| self.outputs.get(id).cloned())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

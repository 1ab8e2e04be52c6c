//! Workflow definition parsing, validation, and file loading.
//!
//! Converts JSON or YAML documents into the canonical `WorkflowDefinition`
//! and validates the structural constraints that must hold before any step
//! runs (unique step ids, and in strict mode, no dangling transitions).

use std::collections::HashSet;
use std::path::Path;

use stepwise_types::workflow::WorkflowDefinition;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that reject a workflow definition before execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// JSON/YAML parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The transitions form at least one cycle. Holds the ids of the steps
    /// that sit on a cycle, in declaration order.
    #[error("Cycle detected in workflow! (steps: {})", .0.join(", "))]
    CycleDetected(Vec<String>),

    /// A transition references a step id that is not defined (strict mode).
    #[error("unknown step: {0}")]
    UnknownDependency(String),

    /// Runtime bookkeeping failure inside the engine.
    #[error("execution error: {0}")]
    ExecutionError(String),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a JSON document into a `WorkflowDefinition`.
///
/// Only deserializes; structural checks happen in `validate_definition`,
/// which the executor runs at the start of every run.
pub fn parse_workflow_json(json: &str) -> Result<WorkflowDefinition, WorkflowError> {
    serde_json::from_str(json).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Parse a YAML document into a `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    serde_yaml_ng::from_str(yaml).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Load a workflow definition from disk.
///
/// `.yaml` / `.yml` files are parsed as YAML, everything else as JSON.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => parse_workflow_yaml(&content),
        _ => parse_workflow_json(&content),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - All step ids are non-empty and unique
/// - All step types are non-empty
/// - With `strict_edges`, every transition endpoint names a defined step
///
/// Cycles are detected by the graph builder, not here.
pub fn validate_definition(
    def: &WorkflowDefinition,
    strict_edges: bool,
) -> Result<(), WorkflowError> {
    let mut seen_ids = HashSet::new();
    for step in &def.nodes {
        if step.id.is_empty() {
            return Err(WorkflowError::ValidationError(
                "step id must not be empty".to_string(),
            ));
        }
        if step.step_type.is_empty() {
            return Err(WorkflowError::ValidationError(format!(
                "step '{}' has no type",
                step.id
            )));
        }
        if !seen_ids.insert(step.id.as_str()) {
            return Err(WorkflowError::ValidationError(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }
    }

    if strict_edges {
        for edge in &def.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !seen_ids.contains(endpoint.as_str()) {
                    return Err(WorkflowError::UnknownDependency(format!(
                        "transition '{}' -> '{}' references unknown step '{}'",
                        edge.from, edge.to, endpoint
                    )));
                }
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

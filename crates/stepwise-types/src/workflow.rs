//! Workflow domain types for stepwise.
//!
//! Defines the node/edge workflow definition authored in the visual builder,
//! the per-step outcome (`StepResult`), and the whole-run summary
//! (`RunReport`) returned to callers that do not consume the progress stream.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// A user-authored automation graph.
///
/// Supplied whole to the engine for every run; the engine never mutates it.
/// Steps keep their declaration order, which drives the deterministic
/// tie-break between independent steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Steps in declaration order.
    #[serde(default)]
    pub nodes: Vec<StepDefinition>,
    /// Dependency edges in declaration order.
    #[serde(default)]
    pub edges: Vec<Transition>,
}

impl WorkflowDefinition {
    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.nodes.iter().find(|s| s.id == id)
    }
}

/// A single automation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step id. Numeric ids are accepted and normalized to strings.
    #[serde(deserialize_with = "deserialize_step_id")]
    pub id: String,
    /// Registry key of the connector that runs this step (e.g. `sheet_read`).
    #[serde(rename = "type")]
    pub step_type: String,
    /// Type-specific configuration.
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,
    /// Optional display label from the builder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A directed dependency: `to` runs after `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(deserialize_with = "deserialize_step_id")]
    pub from: String,
    #[serde(deserialize_with = "deserialize_step_id")]
    pub to: String,
}

/// Accept string or numeric step ids, comparing them as strings.
fn deserialize_step_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Uint(n) => n.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Step status and result
// ---------------------------------------------------------------------------

/// Lifecycle state of a step within one run.
///
/// `pending -> running -> {success | skipped | stopped | error}`. Terminal
/// states are final; there is no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Skipped,
    Stopped,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Skipped => "skipped",
            StepStatus::Stopped => "stopped",
            StepStatus::Error => "error",
        }
    }

    /// Whether the step has finished (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Skipped | StepStatus::Stopped | StepStatus::Error
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one finished step.
///
/// `output` is present iff `status == success`, `error` iff `status == error`,
/// and `reason` iff the step was skipped or stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StepResult {
    pub fn success(output: Value) -> Self {
        Self {
            status: StepStatus::Success,
            output: Some(output),
            error: None,
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            output: None,
            error: None,
            reason: Some(reason.into()),
        }
    }

    pub fn stopped(reason: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Stopped,
            output: None,
            error: None,
            reason: Some(reason.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Error,
            output: None,
            error: Some(message.into()),
            reason: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Overall status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-run summary for callers that do not want streaming semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// UUIDv7 run ID.
    pub run_id: Uuid,
    /// Final run status.
    pub status: RunStatus,
    /// Final result of every step that reached a terminal state, keyed by step id.
    pub node_results: BTreeMap<String, StepResult>,
    /// Human-readable run log, in emission order.
    pub logs: Vec<String>,
    /// Step whose error ended the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_node: Option<String>,
    /// Top-level error message (validation failure or the failing step's error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Result for a single step, if it finished.
    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.node_results.get(step_id)
    }

    /// Final status for a step, if it finished.
    pub fn step_status(&self, step_id: &str) -> Option<StepStatus> {
        self.node_results.get(step_id).map(|r| r.status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_parses_builder_json() {
        let raw = json!({
            "nodes": [
                { "id": "1", "type": "sheet_read", "config": { "sheetId": "abc", "range": "A1:Z" } },
                { "id": 2, "type": "filter_gate", "config": { "keyword": "Active" } },
                { "id": "3", "type": "email_send" }
            ],
            "edges": [ { "from": 1, "to": "2" }, { "from": "2", "to": 3 } ]
        });

        let def: WorkflowDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(def.nodes.len(), 3);
        assert_eq!(def.nodes[1].id, "2");
        assert_eq!(def.nodes[0].config["sheetId"], json!("abc"));
        assert!(def.nodes[2].config.is_empty());
        assert_eq!(
            def.edges[0],
            Transition {
                from: "1".to_string(),
                to: "2".to_string()
            }
        );
        assert_eq!(def.step("3").unwrap().step_type, "email_send");
    }

    #[test]
    fn test_definition_ignores_builder_layout_fields() {
        let raw = json!({
            "nodes": [ { "id": "a", "type": "doc_read", "x": 120, "y": 40 } ]
        });
        let def: WorkflowDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(def.nodes[0].id, "a");
        assert!(def.edges.is_empty());
    }

    #[test]
    fn test_definition_from_yaml() {
        let yaml = r#"
nodes:
  - id: 1
    type: sheet_read
    config:
      sheetId: abc
edges: []
"#;
        let def: WorkflowDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(def.nodes[0].id, "1");
    }

    #[test]
    fn test_step_result_serialization_omits_absent_fields() {
        let ok = serde_json::to_value(StepResult::success(json!([1, 2]))).unwrap();
        assert_eq!(ok, json!({ "status": "success", "output": [1, 2] }));

        let skipped = serde_json::to_value(StepResult::skipped("Parent failed or skipped")).unwrap();
        assert_eq!(
            skipped,
            json!({ "status": "skipped", "reason": "Parent failed or skipped" })
        );

        let err = serde_json::to_value(StepResult::error("boom")).unwrap();
        assert_eq!(err, json!({ "status": "error", "error": "boom" }));
    }

    #[test]
    fn test_status_display_and_terminal() {
        assert_eq!(StepStatus::Stopped.to_string(), "stopped");
        assert!(!StepStatus::Running.is_terminal());
        assert!(StepStatus::Error.is_terminal());
        assert_eq!(RunStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_run_report_step_lookup() {
        let mut node_results = BTreeMap::new();
        node_results.insert("1".to_string(), StepResult::success(json!("ok")));
        let report = RunReport {
            run_id: Uuid::nil(),
            status: RunStatus::Completed,
            node_results,
            logs: vec![],
            error_node: None,
            error: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert_eq!(report.step_status("1"), Some(StepStatus::Success));
        assert!(report.step("2").is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], json!("completed"));
        assert!(json.get("error_node").is_none());
    }
}

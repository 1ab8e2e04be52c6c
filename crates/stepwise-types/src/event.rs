//! Progress events for live observation of a workflow run.
//!
//! `RunEvent` is the item type of the executor's event stream. Each variant
//! serializes to one JSON object tagged by `type`, which is the wire format
//! consumed by the builder UI (SSE or NDJSON, one event per item).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::{RunStatus, StepResult, StepStatus};

/// Events emitted while a workflow run progresses, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A human-readable run log line.
    Log { message: String },

    /// A step changed status.
    NodeUpdate {
        node_id: String,
        status: StepStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// The definition was rejected before any step ran (e.g. cycle detected).
    Error { message: String },

    /// The run is over. Always the last event of a stream.
    WorkflowFinish {
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_node: Option<String>,
    },
}

impl RunEvent {
    pub fn log(message: impl Into<String>) -> Self {
        RunEvent::Log {
            message: message.into(),
        }
    }

    /// A step entered the `running` state.
    pub fn running(node_id: impl Into<String>) -> Self {
        RunEvent::NodeUpdate {
            node_id: node_id.into(),
            status: StepStatus::Running,
            output: None,
            error: None,
            reason: None,
        }
    }

    /// A step reached a terminal state.
    pub fn finished(node_id: impl Into<String>, result: &StepResult) -> Self {
        RunEvent::NodeUpdate {
            node_id: node_id.into(),
            status: result.status,
            output: result.output.clone(),
            error: result.error.clone(),
            reason: result.reason.clone(),
        }
    }

    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::Log { .. } => "log",
            RunEvent::NodeUpdate { .. } => "node_update",
            RunEvent::Error { .. } => "error",
            RunEvent::WorkflowFinish { .. } => "workflow_finish",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_finish(&self) -> bool {
        matches!(self, RunEvent::WorkflowFinish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_matches_protocol() {
        assert_eq!(
            serde_json::to_value(RunEvent::log("hello")).unwrap(),
            json!({ "type": "log", "message": "hello" })
        );
        assert_eq!(
            serde_json::to_value(RunEvent::running("7")).unwrap(),
            json!({ "type": "node_update", "node_id": "7", "status": "running" })
        );
        assert_eq!(
            serde_json::to_value(RunEvent::Error {
                message: "Cycle detected in workflow!".to_string()
            })
            .unwrap(),
            json!({ "type": "error", "message": "Cycle detected in workflow!" })
        );
        assert_eq!(
            serde_json::to_value(RunEvent::WorkflowFinish {
                status: RunStatus::Completed,
                error_node: None
            })
            .unwrap(),
            json!({ "type": "workflow_finish", "status": "completed" })
        );
    }

    #[test]
    fn test_finished_event_carries_result_fields() {
        let event = RunEvent::finished("2", &StepResult::stopped("Filter condition failed"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], json!("stopped"));
        assert_eq!(value["reason"], json!("Filter condition failed"));
        assert!(value.get("output").is_none());

        let parsed: RunEvent = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_is_finish() {
        assert!(
            RunEvent::WorkflowFinish {
                status: RunStatus::Failed,
                error_node: Some("1".to_string())
            }
            .is_finish()
        );
        assert!(!RunEvent::log("x").is_finish());
    }

    #[test]
    fn test_kind_matches_type_tag() {
        let events = [
            RunEvent::log("x"),
            RunEvent::running("1"),
            RunEvent::Error { message: "bad".to_string() },
            RunEvent::WorkflowFinish { status: RunStatus::Cancelled, error_node: None },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], json!(event.kind()));
        }
    }
}

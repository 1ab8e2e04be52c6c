//! Run reporter: drains the executor's event stream into a `RunReport`.
//!
//! Holds no run semantics of its own. Every field of the report is derived
//! from the events, so the synchronous and streaming views of a run can
//! never disagree.

use std::collections::BTreeMap;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use stepwise_types::event::RunEvent;
use stepwise_types::workflow::{RunReport, RunStatus, StepResult, WorkflowDefinition};
use uuid::Uuid;

use super::executor::{RunOptions, WorkflowExecutor};

/// Folds `RunEvent`s into the pieces of a `RunReport`.
#[derive(Debug)]
pub struct ReportCollector {
    run_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    node_results: BTreeMap<String, StepResult>,
    logs: Vec<String>,
    status: Option<RunStatus>,
    error_node: Option<String>,
    error: Option<String>,
}

impl ReportCollector {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            node_results: BTreeMap::new(),
            logs: Vec::new(),
            status: None,
            error_node: None,
            error: None,
        }
    }

    /// Apply one event.
    pub fn observe(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Log { message } => self.logs.push(message.clone()),
            RunEvent::NodeUpdate {
                node_id,
                status,
                output,
                error,
                reason,
            } => {
                if status.is_terminal() {
                    self.node_results.insert(
                        node_id.clone(),
                        StepResult {
                            status: *status,
                            output: output.clone(),
                            error: error.clone(),
                            reason: reason.clone(),
                        },
                    );
                }
            }
            RunEvent::Error { message } => {
                self.error = Some(message.clone());
            }
            RunEvent::WorkflowFinish { status, error_node } => {
                self.status = Some(*status);
                self.error_node = error_node.clone();
            }
        }
    }

    /// Build the final report.
    pub fn finish(self) -> RunReport {
        let (status, mut error) = match self.status {
            Some(status) => (status, self.error),
            None => (
                RunStatus::Failed,
                self.error
                    .or_else(|| Some("run ended without a finish event".to_string())),
            ),
        };

        if error.is_none() {
            error = self
                .error_node
                .as_ref()
                .and_then(|id| self.node_results.get(id))
                .and_then(|r| r.error.clone());
        }

        RunReport {
            run_id: self.run_id,
            status,
            node_results: self.node_results,
            logs: self.logs,
            error_node: self.error_node,
            error,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Drain an event stream into a report.
pub async fn collect_report<S>(run_id: Uuid, events: S) -> RunReport
where
    S: Stream<Item = RunEvent>,
{
    let mut collector = ReportCollector::new(run_id);
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        collector.observe(&event);
    }
    collector.finish()
}

impl WorkflowExecutor {
    /// Run a workflow to completion and return the summary.
    pub async fn execute(&self, definition: WorkflowDefinition, options: RunOptions) -> RunReport {
        let run_id = options.run_id;
        collect_report(run_id, self.run_stream(definition, options)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::registry::StepRegistry;
    use crate::workflow::steps::testing::{connectors, step, RecordingBackend};
    use serde_json::json;
    use std::sync::Arc;
    use stepwise_types::config::EngineConfig;
    use stepwise_types::workflow::{StepStatus, Transition};

    fn executor() -> WorkflowExecutor {
        let backend = RecordingBackend::with_sheet(json!([
            ["Name", "Status"],
            ["Alice", "Active"]
        ]));
        WorkflowExecutor::new(
            Arc::new(StepRegistry::with_builtin(&connectors(backend))),
            EngineConfig::default(),
        )
    }

    fn edge(from: &str, to: &str) -> Transition {
        Transition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[test]
    fn test_collector_folds_events() {
        let mut collector = ReportCollector::new(Uuid::nil());
        let events = vec![
            RunEvent::log("Executing workflow with 2 nodes and 1 edges."),
            RunEvent::running("1"),
            RunEvent::finished("1", &StepResult::error("boom")),
            RunEvent::WorkflowFinish {
                status: RunStatus::Failed,
                error_node: Some("1".to_string()),
            },
        ];
        for event in &events {
            collector.observe(event);
        }
        let report = collector.finish();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.logs.len(), 1);
        assert_eq!(report.node_results.len(), 1);
        assert_eq!(report.step_status("1"), Some(StepStatus::Error));
        assert_eq!(report.error_node.as_deref(), Some("1"));
        assert_eq!(report.error.as_deref(), Some("boom"));
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_missing_finish_is_failure() {
        let report = ReportCollector::new(Uuid::nil()).finish();
        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn test_execute_scenario_report() {
        let def = WorkflowDefinition {
            nodes: vec![
                step("1", "google_sheet_read", json!({ "sheetId": "abc" })),
                step("2", "filter", json!({ "keyword": "inactive" })),
                step("3", "gmail_send", json!({ "to": "ops@example.com" })),
            ],
            edges: vec![edge("1", "2"), edge("2", "3")],
        };
        let options = RunOptions::default();
        let run_id = options.run_id;
        let report = executor().execute(def, options).await;

        assert_eq!(report.run_id, run_id);
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.step_status("1"), Some(StepStatus::Success));
        assert_eq!(report.step_status("2"), Some(StepStatus::Stopped));
        assert_eq!(
            report.step("2").unwrap().reason.as_deref(),
            Some("Filter condition failed")
        );
        assert_eq!(report.step_status("3"), Some(StepStatus::Skipped));
        assert_eq!(
            report.logs,
            vec![
                "Executing workflow with 3 nodes and 2 edges.",
                "--- Running Node 1 (google_sheet_read) ---",
                "--- Running Node 2 (filter) ---",
                "Node 2 stopped: Filter condition failed",
                "Skipping Node 3 because parent failed/skipped.",
            ]
        );
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_execute_cycle_report_has_no_results() {
        let def = WorkflowDefinition {
            nodes: vec![step("1", "doc_read", json!({})), step("2", "doc_read", json!({}))],
            edges: vec![edge("1", "2"), edge("2", "1")],
        };
        let report = executor().execute(def, RunOptions::default()).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.node_results.is_empty());
        assert!(report.error.unwrap().starts_with("Cycle detected in workflow!"));
        assert!(report.error_node.is_none());
    }

    #[tokio::test]
    async fn test_execute_passes_native_types_downstream() {
        let def = WorkflowDefinition {
            nodes: vec![
                step("1", "sheet_read", json!({ "sheetId": "abc" })),
                step("2", "forecast_predict", json!({ "data": "{{1}}" })),
            ],
            edges: vec![edge("1", "2")],
        };
        let report = executor().execute(def, RunOptions::default()).await;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(
            report.step("2").unwrap().output,
            Some(json!({ "forecast": [10, 12, 14] }))
        );
    }
}

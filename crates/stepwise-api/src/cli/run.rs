//! `stepwise run` and `stepwise validate`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use futures_util::StreamExt;
use serde_json::{json, Value};

use stepwise_core::workflow::definition::load_workflow_file;
use stepwise_core::workflow::executor::RunOptions;
use stepwise_core::workflow::expression::value_to_string;
use stepwise_core::workflow::report::ReportCollector;
use stepwise_types::workflow::{RunReport, RunStatus, StepResult, StepStatus, WorkflowDefinition};

use crate::state::AppState;

/// Longest output preview shown in the summary table.
const PREVIEW_CHARS: usize = 60;

/// Flags of `stepwise run`.
pub struct RunArgs<'a> {
    pub file: &'a Path,
    pub stream: bool,
    pub credentials: Option<&'a Path>,
    pub continue_on_error: bool,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run a workflow file and print the outcome. Returns the final run status.
///
/// Ctrl+C cancels the run; the step in flight is reported as skipped.
pub async fn handle_run(state: &AppState, args: RunArgs<'_>, json: bool, quiet: bool) -> Result<RunStatus> {
    let definition = load_definition(args.file)?;

    let mut options = RunOptions::default();
    if let Some(path) = args.credentials {
        options = options.with_credentials(read_credentials(path).await?);
    }
    if args.continue_on_error {
        options = options.with_halt_on_error(false);
    }

    let cancel = options.cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let order = state
        .executor
        .plan(&definition)
        .map(|graph| graph.order)
        .unwrap_or_default();
    let step_types: HashMap<String, String> = definition
        .nodes
        .iter()
        .map(|s| (s.id.clone(), s.step_type.clone()))
        .collect();

    let report = if args.stream {
        let mut collector = ReportCollector::new(options.run_id);
        let events = state.executor.run_stream(definition, options);
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            println!("{}", serde_json::to_string(&event)?);
            collector.observe(&event);
        }
        collector.finish()
    } else {
        state.executor.execute(definition, options).await
    };
    ctrl_c.abort();

    if args.stream || quiet {
        // events already printed, or nothing wanted
    } else if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &order, &step_types);
    }

    Ok(report.status)
}

fn load_definition(file: &Path) -> Result<WorkflowDefinition> {
    load_workflow_file(file).with_context(|| format!("Failed to load workflow from {}", file.display()))
}

async fn read_credentials(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read credentials from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Credentials file {} is not valid JSON", path.display()))
}

fn print_report(report: &RunReport, order: &[String], step_types: &HashMap<String, String>) {
    let elapsed = (report.finished_at - report.started_at).num_milliseconds();

    println!();
    println!(
        "  {} Run {} ({} ms)",
        style("Workflow:").bold(),
        style(report.run_id.to_string().chars().take(8).collect::<String>()).cyan(),
        elapsed
    );
    println!();
    for line in &report.logs {
        println!("  {}", style(line).dim());
    }

    // Execution order first, then anything the plan did not cover.
    let mut ids: Vec<&String> = order.iter().filter(|id| report.node_results.contains_key(*id)).collect();
    ids.extend(report.node_results.keys().filter(|id| !order.contains(*id)));

    if !ids.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Step").fg(Color::Cyan),
                Cell::new("Type"),
                Cell::new("Status"),
                Cell::new("Detail"),
            ]);

        for id in ids {
            let Some(result) = report.node_results.get(id) else {
                continue;
            };
            table.add_row(vec![
                Cell::new(id),
                Cell::new(step_types.get(id).map(String::as_str).unwrap_or("-")),
                format_status(result.status),
                Cell::new(detail_of(result)),
            ]);
        }
        println!();
        println!("{table}");
    }

    println!();
    match report.status {
        RunStatus::Completed => println!("  {} Workflow completed", style("✓").green().bold()),
        RunStatus::Cancelled => println!("  {} Workflow cancelled", style("■").yellow().bold()),
        RunStatus::Failed => {
            let at = report
                .error_node
                .as_deref()
                .map(|id| format!(" at step {id}"))
                .unwrap_or_default();
            let error = report.error.as_deref().unwrap_or("unknown error");
            println!(
                "  {} Workflow failed{}: {}",
                style("✗").red().bold(),
                at,
                style(error).red()
            );
        }
    }
    println!();
}

/// One-line summary of a step result for the table.
fn detail_of(result: &StepResult) -> String {
    if let Some(error) = &result.error {
        return truncate(error);
    }
    if let Some(reason) = &result.reason {
        return truncate(reason);
    }
    result
        .output
        .as_ref()
        .map(|output| truncate(&value_to_string(output)))
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > PREVIEW_CHARS || line.len() < text.len() {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}

fn format_status(status: StepStatus) -> Cell {
    match status {
        StepStatus::Pending => Cell::new("pending").fg(Color::DarkGrey),
        StepStatus::Running => Cell::new("running").fg(Color::Blue),
        StepStatus::Success => Cell::new("success").fg(Color::Green),
        StepStatus::Skipped => Cell::new("skipped").fg(Color::DarkYellow),
        StepStatus::Stopped => Cell::new("stopped").fg(Color::Yellow),
        StepStatus::Error => Cell::new("error").fg(Color::Red),
    }
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

/// Validate a workflow file. Returns whether it is runnable.
pub fn handle_validate(state: &AppState, file: &Path, json: bool) -> Result<bool> {
    let definition = load_definition(file)?;
    let registry = state.executor.registry();
    let unknown_types: Vec<&str> = definition
        .nodes
        .iter()
        .filter(|s| !registry.contains(&s.step_type))
        .map(|s| s.step_type.as_str())
        .collect();

    match state.executor.plan(&definition) {
        Ok(graph) => {
            if json {
                let dropped: Vec<Value> = graph
                    .dropped_edges
                    .iter()
                    .map(|e| json!({ "from": e.from, "to": e.to }))
                    .collect();
                let out = json!({
                    "valid": true,
                    "order": graph.order,
                    "dropped_edges": dropped,
                    "unknown_types": unknown_types,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(true);
            }

            println!();
            println!(
                "  {} Workflow is valid ({} steps, {} transitions)",
                style("✓").green().bold(),
                definition.nodes.len(),
                definition.edges.len() - graph.dropped_edges.len()
            );
            println!("  Order: {}", style(graph.order.join(" → ")).cyan());
            for edge in &graph.dropped_edges {
                println!(
                    "  {} transition {} -> {} references an unknown step and will be ignored",
                    style("!").yellow(),
                    edge.from,
                    edge.to
                );
            }
            for step_type in &unknown_types {
                println!(
                    "  {} step type '{}' is not registered; it will pass through",
                    style("!").yellow(),
                    step_type
                );
            }
            println!();
            Ok(true)
        }
        Err(e) => {
            if json {
                let out = json!({ "valid": false, "error": e.to_string() });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!();
                println!("  {} {}", style("✗").red().bold(), style(e.to_string()).red());
                println!();
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_types::config::EngineConfig;
    use tempfile::TempDir;

    fn state() -> AppState {
        AppState::from_config(EngineConfig::default()).unwrap()
    }

    const SCENARIO: &str = r#"
nodes:
  - id: 1
    type: sheet_read
    config:
      sheetId: abc
  - id: 2
    type: filter_gate
    config:
      keyword: Active
  - id: 3
    type: email_send
    config:
      to: ops@example.com
      body: "{{1[1][0]}} is active"
edges:
  - from: 1
    to: 2
  - from: 2
    to: 3
"#;

    #[tokio::test]
    async fn run_yaml_file_completes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("flow.yaml");
        tokio::fs::write(&path, SCENARIO).await.unwrap();

        let status = handle_run(
            &state(),
            RunArgs {
                file: &path,
                stream: false,
                credentials: None,
                continue_on_error: false,
            },
            false,
            true,
        )
        .await
        .unwrap();
        assert_eq!(status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn run_with_bad_credentials_file_fails() {
        let tmp = TempDir::new().unwrap();
        let flow = tmp.path().join("flow.yaml");
        let creds = tmp.path().join("creds.json");
        tokio::fs::write(&flow, SCENARIO).await.unwrap();
        tokio::fs::write(&creds, "not json").await.unwrap();

        let err = handle_run(
            &state(),
            RunArgs {
                file: &flow,
                stream: false,
                credentials: Some(&creds),
                continue_on_error: false,
            },
            false,
            true,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn validate_reports_cycle() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cycle.json");
        tokio::fs::write(
            &path,
            r#"{"nodes":[{"id":"a","type":"doc_read"},{"id":"b","type":"doc_read"}],
                "edges":[{"from":"a","to":"b"},{"from":"b","to":"a"}]}"#,
        )
        .await
        .unwrap();

        assert!(!handle_validate(&state(), &path, true).unwrap());
    }

    #[tokio::test]
    async fn validate_accepts_scenario() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("flow.yml");
        tokio::fs::write(&path, SCENARIO).await.unwrap();
        assert!(handle_validate(&state(), &path, true).unwrap());
    }

    #[test]
    fn detail_prefers_error_then_reason_then_output() {
        assert_eq!(detail_of(&StepResult::error("boom")), "boom");
        assert_eq!(detail_of(&StepResult::stopped("Filter condition failed")), "Filter condition failed");
        assert_eq!(detail_of(&StepResult::success(json!({ "a": 1 }))), r#"{"a":1}"#);
        assert_eq!(detail_of(&StepResult::skipped("Parent failed or skipped")), "Parent failed or skipped");
    }

    #[test]
    fn truncate_long_and_multiline() {
        let long = "x".repeat(100);
        assert_eq!(truncate(&long).chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(truncate("first\nsecond"), "first…");
        assert_eq!(truncate("short"), "short");
    }
}

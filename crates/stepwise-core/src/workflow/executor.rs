//! Workflow executor: sequential, streaming, topological execution.
//!
//! `WorkflowExecutor::run_stream` is the single source of truth for run
//! semantics. It yields a `RunEvent` for every log line and every step status
//! transition, and always ends with exactly one `workflow_finish` event.
//! Callers that want a summary drain the stream with `WorkflowExecutor::execute`
//! (see `report`).
//!
//! # Execution flow
//!
//! 1. Validate the definition and compute the execution order. A rejected
//!    definition yields an `error` event and a failed finish; nothing runs.
//! 2. Walk the order one step at a time. A step whose direct parents did not
//!    all succeed is `skipped` without invoking its connector.
//! 3. Otherwise the step goes `running`, its config is resolved against the
//!    accumulated context, and its handler is awaited (bounded by the optional
//!    step timeout and the run's cancellation token).
//! 4. Output is written once into the context and the step is `success`; a
//!    filter gate that fails is `stopped`; a handler error is `error`, which
//!    halts the run unless `halt_on_error` is off. On halt, every descendant
//!    of the failed step is reported `skipped`; unrelated steps never start.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::Stream;
use serde_json::Value;
use stepwise_types::config::EngineConfig;
use stepwise_types::event::RunEvent;
use stepwise_types::workflow::{
    RunStatus, StepDefinition, StepResult, StepStatus, WorkflowDefinition,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::context::ExecutionContext;
use super::definition::WorkflowError;
use super::graph::ExecutionGraph;
use super::registry::{PreparedStep, StepError, StepOutput, StepRegistry};

/// Reason recorded for steps whose parents did not succeed.
pub const PARENT_NOT_SUCCESSFUL_REASON: &str = "Parent failed or skipped";

/// Reason recorded for the step in flight when a run is cancelled.
pub const CANCELLED_REASON: &str = "Run cancelled";

// ---------------------------------------------------------------------------
// RunOptions
// ---------------------------------------------------------------------------

/// Per-run parameters supplied by the caller.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run ID (UUIDv7 unless the caller picks one).
    pub run_id: Uuid,
    /// Opaque credential blob forwarded to every connector call.
    pub credentials: Option<Value>,
    /// Cooperative cancellation, checked between steps and while a step runs.
    pub cancel: CancellationToken,
    /// Overrides `EngineConfig::halt_on_error` for this run.
    pub halt_on_error: Option<bool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            credentials: None,
            cancel: CancellationToken::new(),
            halt_on_error: None,
        }
    }
}

impl RunOptions {
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_credentials(mut self, credentials: Value) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_halt_on_error(mut self, halt: bool) -> Self {
        self.halt_on_error = Some(halt);
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Drives workflow runs against a step registry.
///
/// Cheap to clone; the registry is shared.
#[derive(Clone)]
pub struct WorkflowExecutor {
    registry: Arc<StepRegistry>,
    config: EngineConfig,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<StepRegistry>, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Validate a definition and return its execution plan without running it.
    pub fn plan(&self, definition: &WorkflowDefinition) -> Result<ExecutionGraph, WorkflowError> {
        ExecutionGraph::build(definition, self.config.strict_edges)
    }

    /// Run a workflow, yielding progress events as they happen.
    ///
    /// The stream owns everything it needs, so it can be handed to an HTTP
    /// response or spawned onto another task. Dropping it abandons the run
    /// at the next await point.
    pub fn run_stream(
        &self,
        definition: WorkflowDefinition,
        options: RunOptions,
    ) -> impl Stream<Item = RunEvent> + Send + 'static + use<> {
        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();

        async_stream::stream! {
            let run_id = options.run_id;
            let halt_on_error = options.halt_on_error.unwrap_or(config.halt_on_error);
            let step_timeout = config.step_timeout_secs;

            tracing::info!(
                run_id = %run_id,
                nodes = definition.nodes.len(),
                edges = definition.edges.len(),
                halt_on_error,
                "workflow run started"
            );
            yield RunEvent::log(format!(
                "Executing workflow with {} nodes and {} edges.",
                definition.nodes.len(),
                definition.edges.len()
            ));

            let graph = match ExecutionGraph::build(&definition, config.strict_edges) {
                Ok(graph) => graph,
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "workflow definition rejected");
                    yield RunEvent::Error { message: e.to_string() };
                    yield RunEvent::WorkflowFinish { status: RunStatus::Failed, error_node: None };
                    return;
                }
            };

            for edge in &graph.dropped_edges {
                yield RunEvent::log(format!(
                    "Ignoring transition {} -> {}: unknown step.",
                    edge.from, edge.to
                ));
            }

            let steps: HashMap<&str, &StepDefinition> =
                definition.nodes.iter().map(|s| (s.id.as_str(), s)).collect();
            let mut ctx = ExecutionContext::new(config.max_step_output_bytes);
            let mut statuses: HashMap<&str, StepStatus> = HashMap::new();
            let mut error_node: Option<String> = None;
            let mut cancelled = false;

            for step_id in &graph.order {
                if options.cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                let Some(step) = steps.get(step_id.as_str()).copied() else {
                    continue;
                };
                let parents = graph.parents_of(step_id);

                // Flow control: every direct parent must have succeeded
                let blocked = parents
                    .iter()
                    .any(|p| statuses.get(p.as_str()) != Some(&StepStatus::Success));
                if blocked {
                    tracing::debug!(run_id = %run_id, step_id = %step_id, "skipping step, parent not successful");
                    yield RunEvent::log(format!(
                        "Skipping Node {} because parent failed/skipped.",
                        step_id
                    ));
                    statuses.insert(step_id, StepStatus::Skipped);
                    yield RunEvent::finished(step_id.as_str(), &StepResult::skipped(PARENT_NOT_SUCCESSFUL_REASON));
                    continue;
                }

                yield RunEvent::log(format!("--- Running Node {} ({}) ---", step_id, step.step_type));
                statuses.insert(step_id, StepStatus::Running);
                yield RunEvent::running(step_id.as_str());

                let prepared = registry.prepare(step, parents, &ctx, options.credentials.as_ref());
                if !prepared.is_known() {
                    tracing::warn!(run_id = %run_id, step_id = %step_id, step_type = %step.step_type, "unknown step type");
                }
                if let Some(parent_id) = prepared.auto_passed_from() {
                    let line = format!(
                        "Auto-passing output from Parent Node {} to Node {}",
                        parent_id, step_id
                    );
                    yield RunEvent::log(line);
                }

                let started = Instant::now();
                let outcome = run_prepared(prepared, step_timeout, &options.cancel).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                let result = match outcome {
                    None => {
                        tracing::info!(run_id = %run_id, step_id = %step_id, "run cancelled during step");
                        yield RunEvent::log(format!("Run cancelled while Node {} was running.", step_id));
                        statuses.insert(step_id, StepStatus::Skipped);
                        yield RunEvent::finished(step_id.as_str(), &StepResult::skipped(CANCELLED_REASON));
                        cancelled = true;
                        break;
                    }
                    Some(Ok(StepOutput::Value(output))) => match ctx.insert(step_id, output) {
                        Ok(stored) => StepResult::success(stored),
                        Err(e) => StepResult::error(e.to_string()),
                    },
                    Some(Ok(StepOutput::Stopped { reason })) => StepResult::stopped(reason),
                    Some(Err(e)) => StepResult::error(e.to_string()),
                };

                tracing::info!(
                    run_id = %run_id,
                    step_id = %step_id,
                    step_type = %step.step_type,
                    status = %result.status,
                    duration_ms,
                    "step finished"
                );

                if let Some(message) = &result.error {
                    yield RunEvent::log(format!("Error in Node {}: {}", step_id, message));
                }
                if result.status == StepStatus::Stopped {
                    yield RunEvent::log(format!(
                        "Node {} stopped: {}",
                        step_id,
                        result.reason.as_deref().unwrap_or_default()
                    ));
                }

                statuses.insert(step_id, result.status);
                let failed = result.status == StepStatus::Error;
                yield RunEvent::finished(step_id.as_str(), &result);

                if failed {
                    if error_node.is_none() {
                        error_node = Some(step_id.clone());
                    }
                    if halt_on_error {
                        // Descendants of the failed step are skipped; unrelated steps never start
                        for descendant in graph.descendants_of(step_id) {
                            if statuses.contains_key(descendant) {
                                continue;
                            }
                            yield RunEvent::log(format!(
                                "Skipping Node {} because parent failed/skipped.",
                                descendant
                            ));
                            statuses.insert(descendant, StepStatus::Skipped);
                            yield RunEvent::finished(descendant, &StepResult::skipped(PARENT_NOT_SUCCESSFUL_REASON));
                        }
                        break;
                    }
                }
            }

            let status = if cancelled {
                RunStatus::Cancelled
            } else if error_node.is_some() {
                RunStatus::Failed
            } else {
                RunStatus::Completed
            };

            tracing::info!(
                run_id = %run_id,
                status = %status,
                steps_with_output = ctx.len(),
                "workflow run finished"
            );
            yield RunEvent::WorkflowFinish { status, error_node };
        }
    }
}

/// Await a prepared step under the optional timeout. `None` means the run
/// was cancelled before the step finished.
async fn run_prepared(
    prepared: PreparedStep<'_>,
    timeout_secs: Option<u64>,
    cancel: &CancellationToken,
) -> Option<Result<StepOutput, StepError>> {
    let run = async {
        match timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), prepared.run())
                .await
                .unwrap_or(Err(StepError::Timeout(secs))),
            None => prepared.run().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = run => Some(result),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

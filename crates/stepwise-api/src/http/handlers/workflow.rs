//! Workflow run endpoints.
//!
//! - `POST /api/v1/workflows/run` runs to completion and returns the `RunReport`
//! - `POST /api/v1/workflows/run/stream` streams `RunEvent`s as SSE
//! - `POST /api/v1/runs/{run_id}/cancel` cancels an in-flight run
//! - `GET /api/v1/step-types` lists the registered step types
//!
//! SSE event names match the event's `type` tag (`log`, `node_update`,
//! `error`, `workflow_finish`); each `data` field is the event's JSON.
//! Both run endpoints return the run id in the `x-run-id` header.

use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use stepwise_core::workflow::executor::RunOptions;
use stepwise_types::event::RunEvent;
use stepwise_types::workflow::WorkflowDefinition;

use crate::http::error::AppError;
use crate::http::router::RUN_ID_HEADER;
use crate::state::AppState;

/// Request body for both run endpoints: the definition itself plus optional
/// per-run settings.
#[derive(Debug, Deserialize)]
pub struct RunWorkflowRequest {
    #[serde(flatten)]
    pub definition: WorkflowDefinition,
    /// Opaque credential blob handed to every connector call.
    #[serde(default)]
    pub credentials: Option<Value>,
    /// Overrides the configured fail-fast policy for this run.
    #[serde(default)]
    pub halt_on_error: Option<bool>,
}

impl RunWorkflowRequest {
    fn into_parts(self) -> (WorkflowDefinition, RunOptions) {
        let mut options = RunOptions::default();
        if let Some(credentials) = self.credentials {
            options = options.with_credentials(credentials);
        }
        if let Some(halt) = self.halt_on_error {
            options = options.with_halt_on_error(halt);
        }
        (self.definition, options)
    }
}

/// POST /api/v1/workflows/run
pub async fn run_workflow(
    State(state): State<AppState>,
    body: Result<Json<RunWorkflowRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;
    let (definition, options) = request.into_parts();
    let run_id = options.run_id;

    let _guard = state.track_run(run_id, options.cancel.clone());
    let report = state.executor.execute(definition, options).await;

    tracing::info!(run_id = %run_id, status = %report.status, "synchronous run finished");
    Ok(([(RUN_ID_HEADER, run_id.to_string())], Json(report)))
}

/// POST /api/v1/workflows/run/stream
///
/// Closing the connection abandons the run.
pub async fn stream_workflow(
    State(state): State<AppState>,
    body: Result<Json<RunWorkflowRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;
    let (definition, options) = request.into_parts();
    let run_id = options.run_id;

    let guard = state.track_run(run_id, options.cancel.clone());
    let events = state.executor.run_stream(definition, options);

    let sse_stream = async_stream::stream! {
        let _guard = guard;
        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            yield Ok::<_, Infallible>(to_sse_event(&event));
        }
    };

    Ok((
        [(RUN_ID_HEADER, run_id.to_string())],
        Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))),
    ))
}

fn to_sse_event(event: &RunEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        json!({ "type": "error", "message": format!("failed to encode event: {e}") }).to_string()
    });
    Event::default().event(event.kind()).data(data)
}

/// POST /api/v1/runs/{run_id}/cancel
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.cancel_run(&run_id) {
        return Err(AppError::RunNotFound(run_id));
    }
    tracing::info!(run_id = %run_id, "run cancellation requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "run_id": run_id, "status": "cancelling" })),
    ))
}

/// GET /api/v1/step-types
pub async fn list_step_types(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "step_types": state.executor.registry().step_types() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stepwise_core::workflow::executor::WorkflowExecutor;
    use stepwise_core::workflow::registry::{
        StepFuture, StepHandler, StepInput, StepOutput, StepRegistry,
    };
    use stepwise_infra::connectors::build_connectors;
    use stepwise_types::config::EngineConfig;

    use crate::http::router::build_router;

    struct SlowHandler;

    impl StepHandler for SlowHandler {
        fn execute<'a>(&'a self, _input: StepInput<'a>) -> StepFuture<'a> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(StepOutput::Value(Value::Null))
            })
        }
    }

    async fn spawn_app() -> (String, AppState) {
        let config = EngineConfig::default();
        let mut registry = StepRegistry::with_builtin(&build_connectors(&config).unwrap());
        registry.register("slow", Arc::new(SlowHandler));
        let state = AppState::with_executor(WorkflowExecutor::new(Arc::new(registry), config));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    fn scenario(keyword: &str) -> Value {
        json!({
            "nodes": [
                { "id": 1, "type": "google_sheet_read", "config": { "sheetId": "abc", "range": "A1:Z" } },
                { "id": 2, "type": "filter", "config": { "keyword": keyword } },
                { "id": 3, "type": "gmail_send", "config": { "to": "ops@example.com", "body": "{{1}}" } }
            ],
            "edges": [ { "from": 1, "to": 2 }, { "from": 2, "to": 3 } ]
        })
    }

    #[tokio::test]
    async fn sync_run_returns_report() {
        let (base, _) = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/workflows/run"))
            .json(&scenario("active"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get(RUN_ID_HEADER).is_some());
        let report: Value = resp.json().await.unwrap();
        assert_eq!(report["status"], json!("completed"));
        assert_eq!(report["node_results"]["2"]["status"], json!("success"));
        assert_eq!(report["node_results"]["3"]["status"], json!("success"));
    }

    #[tokio::test]
    async fn sync_run_filter_miss_skips_email() {
        let (base, _) = spawn_app().await;
        let report: Value = reqwest::Client::new()
            .post(format!("{base}/api/v1/workflows/run"))
            .json(&scenario("pending"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(report["status"], json!("completed"));
        assert_eq!(report["node_results"]["2"]["status"], json!("stopped"));
        assert_eq!(report["node_results"]["3"]["status"], json!("skipped"));
    }

    #[tokio::test]
    async fn sync_run_cycle_is_failed_report() {
        let (base, _) = spawn_app().await;
        let report: Value = reqwest::Client::new()
            .post(format!("{base}/api/v1/workflows/run"))
            .json(&json!({
                "nodes": [ { "id": "a", "type": "doc_read" }, { "id": "b", "type": "doc_read" } ],
                "edges": [ { "from": "a", "to": "b" }, { "from": "b", "to": "a" } ]
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(report["status"], json!("failed"));
        assert_eq!(report["node_results"], json!({}));
        assert!(report["error"].as_str().unwrap().starts_with("Cycle detected in workflow!"));
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (base, _) = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/workflows/run"))
            .header("content-type", "application/json")
            .body("{ not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["errors"][0]["code"], json!("INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn stream_emits_events_in_order() {
        let (base, state) = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/workflows/run/stream"))
            .json(&scenario("active"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get(RUN_ID_HEADER).is_some());

        let body = resp.text().await.unwrap();
        let first_log = body.find("event: log").unwrap();
        let first_update = body.find("event: node_update").unwrap();
        let finish = body.find("event: workflow_finish").unwrap();
        assert!(first_log < first_update && first_update < finish);
        assert!(body.contains(r#"{"type":"workflow_finish","status":"completed"}"#));
        assert!(state.active_runs.is_empty());
    }

    #[tokio::test]
    async fn cancel_in_flight_stream() {
        let (base, _) = spawn_app().await;
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{base}/api/v1/workflows/run/stream"))
            .json(&json!({
                "nodes": [ { "id": 1, "type": "slow" }, { "id": 2, "type": "doc_read" } ],
                "edges": [ { "from": 1, "to": 2 } ]
            }))
            .send()
            .await
            .unwrap();
        let run_id = resp
            .headers()
            .get(RUN_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let cancel = client
            .post(format!("{base}/api/v1/runs/{run_id}/cancel"))
            .send()
            .await
            .unwrap();
        assert_eq!(cancel.status(), 202);

        let body = tokio::time::timeout(Duration::from_secs(10), resp.text())
            .await
            .unwrap()
            .unwrap();
        assert!(body.contains(r#"{"type":"workflow_finish","status":"cancelled"}"#));
    }

    #[tokio::test]
    async fn cancel_unknown_run_is_not_found() {
        let (base, _) = spawn_app().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/runs/{}/cancel", Uuid::now_v7()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn step_types_and_health() {
        let (base, _) = spawn_app().await;
        let types: Value = reqwest::get(format!("{base}/api/v1/step-types"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let names: Vec<&str> = types["step_types"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(names.contains(&"sheet_read"));
        assert!(names.contains(&"slow"));

        let health: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], json!("ok"));
    }
}

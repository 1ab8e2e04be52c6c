//! Application state wiring the executor to its connectors.
//!
//! AppState holds the executor and the table of in-flight runs used by both
//! CLI commands and REST API handlers.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use stepwise_core::workflow::executor::WorkflowExecutor;
use stepwise_core::workflow::registry::StepRegistry;
use stepwise_infra::config::load_engine_config;
use stepwise_infra::connectors::build_connectors;
use stepwise_types::config::EngineConfig;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub executor: WorkflowExecutor,
    /// Cancellation handles of runs currently in flight, keyed by run id.
    pub active_runs: Arc<DashMap<Uuid, CancellationToken>>,
}

impl AppState {
    /// Load the engine config and wire the built-in step handlers to the
    /// default connector set.
    pub async fn init(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = load_engine_config(config_path).await;
        Self::from_config(config)
    }

    pub fn from_config(config: EngineConfig) -> anyhow::Result<Self> {
        let connectors = build_connectors(&config)?;
        let registry = StepRegistry::with_builtin(&connectors);
        tracing::debug!(step_types = ?registry.step_types(), "step registry ready");
        Ok(Self::with_executor(WorkflowExecutor::new(Arc::new(registry), config)))
    }

    pub fn with_executor(executor: WorkflowExecutor) -> Self {
        Self {
            executor,
            active_runs: Arc::new(DashMap::new()),
        }
    }

    /// Register a run as in flight. The returned guard unregisters it on drop.
    pub fn track_run(&self, run_id: Uuid, cancel: CancellationToken) -> ActiveRunGuard {
        self.active_runs.insert(run_id, cancel);
        ActiveRunGuard {
            runs: Arc::clone(&self.active_runs),
            run_id,
        }
    }

    /// Cancel an in-flight run. Returns false if the run is unknown or over.
    pub fn cancel_run(&self, run_id: &Uuid) -> bool {
        match self.active_runs.get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Removes a run from the in-flight table when dropped.
pub struct ActiveRunGuard {
    runs: Arc<DashMap<Uuid, CancellationToken>>,
    run_id: Uuid,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.runs.remove(&self.run_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_unregisters_run() {
        let state = AppState::from_config(EngineConfig::default()).unwrap();
        let run_id = Uuid::now_v7();
        let token = CancellationToken::new();

        let guard = state.track_run(run_id, token.clone());
        assert!(state.cancel_run(&run_id));
        assert!(token.is_cancelled());

        drop(guard);
        assert!(!state.cancel_run(&run_id));
        assert!(state.active_runs.is_empty());
    }
}

//! Step registry: step-type identifier -> handler.
//!
//! A `StepHandler` declares which config fields are templates and whether a
//! missing input may be taken from a parent's output (auto-pass). The
//! registry resolves the config against the execution context, applies
//! auto-pass, and calls the handler. Handler failures are returned to the
//! caller; turning them into step results is the executor's job.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use stepwise_types::workflow::StepDefinition;

use super::connector::{ConnectorError, Connectors};
use super::context::ExecutionContext;
use super::expression::{resolve_value, value_to_string};

/// Boxed future returned by `StepHandler::execute`.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<StepOutput, StepError>> + Send + 'a>>;

// ---------------------------------------------------------------------------
// StepOutput
// ---------------------------------------------------------------------------

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Normal output, recorded in the execution context.
    Value(Value),
    /// The step deliberately halted its branch (e.g. a failed filter gate).
    Stopped { reason: String },
}

impl StepOutput {
    /// Output recorded for an unregistered step type. The step still counts
    /// as successful.
    pub fn unknown_type() -> Self {
        StepOutput::Value(json!({ "status": "skipped", "reason": "Unknown node type" }))
    }
}

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Errors that can occur during step execution.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A backend call failed.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// The step config is missing a required field or holds an invalid value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Any other handler failure.
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),

    /// The step exceeded the configured per-step timeout.
    #[error("step timed out after {0}s")]
    Timeout(u64),
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// A step's config after template resolution and auto-pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig(Map<String, Value>);

impl ResolvedConfig {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String form of a field, or `None` when it is absent, null, or empty.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(value_to_string(v)),
        }
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require_text(&self, key: &str) -> Result<String, StepError> {
        self.text(key)
            .ok_or_else(|| StepError::InvalidConfig(format!("missing '{}'", key)))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// Everything a handler sees for one invocation.
pub struct StepInput<'a> {
    pub step_id: &'a str,
    pub step_type: &'a str,
    pub config: ResolvedConfig,
    /// Outputs of the direct parents, in transition declaration order.
    pub parent_outputs: Vec<Value>,
    /// Read-only view of all outputs produced so far.
    pub context: &'a ExecutionContext,
    /// Opaque credential blob forwarded to backends.
    pub credentials: Option<&'a Value>,
}

/// Auto-pass declaration: when `field` is blank in the step config, the
/// first parent output accepted by `accepts` is used instead.
#[derive(Debug, Clone, Copy)]
pub struct AutoPass {
    pub field: &'static str,
    pub accepts: fn(&Value) -> bool,
}

impl AutoPass {
    /// Fall back to the first parent's output, whatever it is.
    pub fn field(field: &'static str) -> Self {
        Self {
            field,
            accepts: |_| true,
        }
    }

    /// Fall back to the first parent output that satisfies `accepts`.
    pub fn when(field: &'static str, accepts: fn(&Value) -> bool) -> Self {
        Self { field, accepts }
    }
}

/// A connector implementation for one step type.
pub trait StepHandler: Send + Sync {
    /// Config fields passed through the template resolver.
    fn templated_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Which input may fall back to a parent output, if any.
    fn auto_pass(&self, _config: &Map<String, Value>) -> Option<AutoPass> {
        None
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lookup table from step-type identifier to handler.
#[derive(Clone, Default)]
pub struct StepRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
    aliases: HashMap<String, String>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in handler wired to `connectors`.
    pub fn with_builtin(connectors: &Connectors) -> Self {
        let mut registry = Self::new();
        super::steps::register_builtin(&mut registry, connectors);
        registry
    }

    /// Register (or replace) the handler for a step type.
    pub fn register(&mut self, step_type: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(step_type.into(), handler);
    }

    /// Make `alias` resolve to whatever handles `canonical`.
    pub fn alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alias.into(), canonical.into());
    }

    /// Handler for a step type or one of its aliases.
    pub fn get(&self, step_type: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers
            .get(step_type)
            .or_else(|| {
                self.aliases
                    .get(step_type)
                    .and_then(|canonical| self.handlers.get(canonical))
            })
            .cloned()
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.get(step_type).is_some()
    }

    /// Registered step types and aliases, sorted.
    pub fn step_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Resolve a step's inputs without running it.
    ///
    /// `parents` are the step's direct parents in declaration order; every
    /// one of them must already have output in `ctx`.
    pub fn prepare<'a>(
        &self,
        step: &'a StepDefinition,
        parents: &[String],
        ctx: &'a ExecutionContext,
        credentials: Option<&'a Value>,
    ) -> PreparedStep<'a> {
        let Some(handler) = self.get(&step.step_type) else {
            return PreparedStep {
                handler: None,
                input: None,
                auto_passed_from: None,
            };
        };

        let templated = handler.templated_fields();
        let mut config: Map<String, Value> = step
            .config
            .iter()
            .map(|(key, value)| {
                let resolved = if templated.contains(&key.as_str()) {
                    resolve_value(value, ctx)
                } else {
                    value.clone()
                };
                (key.clone(), resolved)
            })
            .collect();

        let mut auto_passed_from = None;
        if let Some(rule) = handler.auto_pass(&step.config) {
            if is_blank(step.config.get(rule.field)) {
                let candidate = parents
                    .iter()
                    .filter_map(|id| ctx.get(id).map(|v| (id, v)))
                    .find(|(_, v)| (rule.accepts)(v));
                if let Some((parent_id, value)) = candidate {
                    config.insert(rule.field.to_string(), value.clone());
                    auto_passed_from = Some(parent_id.clone());
                }
            }
        }

        let input = StepInput {
            step_id: &step.id,
            step_type: &step.step_type,
            config: ResolvedConfig(config),
            parent_outputs: ctx.outputs_of(parents),
            context: ctx,
            credentials,
        };

        PreparedStep {
            handler: Some(handler),
            input: Some(input),
            auto_passed_from,
        }
    }

    /// Resolve and run a step in one call.
    pub async fn dispatch(
        &self,
        step: &StepDefinition,
        parents: &[String],
        ctx: &ExecutionContext,
        credentials: Option<&Value>,
    ) -> Result<StepOutput, StepError> {
        self.prepare(step, parents, ctx, credentials).run().await
    }
}

/// A step whose inputs are resolved and which is ready to run.
pub struct PreparedStep<'a> {
    handler: Option<Arc<dyn StepHandler>>,
    input: Option<StepInput<'a>>,
    auto_passed_from: Option<String>,
}

impl<'a> PreparedStep<'a> {
    /// Whether a handler is registered for the step type.
    pub fn is_known(&self) -> bool {
        self.handler.is_some()
    }

    /// Parent whose output was substituted for a blank input, if any.
    pub fn auto_passed_from(&self) -> Option<&str> {
        self.auto_passed_from.as_deref()
    }

    /// Run the handler. Unknown step types succeed with a neutral marker.
    pub async fn run(self) -> Result<StepOutput, StepError> {
        match (self.handler, self.input) {
            (Some(handler), Some(input)) => handler.execute(input).await,
            _ => Ok(StepOutput::unknown_type()),
        }
    }
}

/// Absent, null, or empty string.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

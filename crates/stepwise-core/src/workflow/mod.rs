//! Workflow engine: definition parsing, graph ordering, and streaming execution.
//!
//! - `definition` -- JSON/YAML parsing, structural validation, file loading
//! - `graph` -- Kahn topological order, adjacency and parent maps, cycle reporting
//! - `connector` -- Backend ports (sheets, docs, mail, webhooks, inference)
//! - `context` -- Write-once per-run store of step outputs
//! - `expression` -- `{{stepId.path}}` template resolver with a restricted path grammar
//! - `registry` -- Step handler trait, config resolution, auto-pass, type -> handler table
//! - `steps` -- Built-in step handlers (sheet, doc, email, webhook, filter, inference)
//! - `executor` -- Sequential streaming executor with skip/stop/fail-fast semantics
//! - `report` -- Drains the event stream into a `RunReport`

pub mod connector;
pub mod context;
pub mod definition;
pub mod executor;
pub mod expression;
pub mod graph;
pub mod registry;
pub mod report;
pub mod steps;

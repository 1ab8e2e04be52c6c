//! Workflow engine core for stepwise.
//!
//! This crate owns the engine semantics: graph ordering, template resolution,
//! step dispatch, and the streaming executor. Connector backends are consumed
//! through the traits in `workflow::registry`; concrete adapters live in
//! `stepwise-infra`. It depends only on `stepwise-types` and pure libraries.

pub mod workflow;

//! Shared domain types for stepwise.
//!
//! This crate contains the serde types exchanged between the engine, its
//! hosts, and observers: workflow definitions, step results, run reports,
//! progress events, and engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono.

pub mod config;
pub mod event;
pub mod workflow;

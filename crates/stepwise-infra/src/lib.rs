//! Infrastructure layer for stepwise.
//!
//! Concrete implementations of the connector ports defined in `stepwise-core`:
//! an HTTP webhook client, a client for the OCR/forecast microservice, and an
//! in-memory offline workspace standing in for spreadsheets, documents, and
//! mail. Also loads the engine configuration from TOML with env overrides.

pub mod config;
pub mod connectors;

//! HTTP/REST API layer for stepwise.
//!
//! Axum-based API at `/api/v1/`: synchronous runs returning a report, SSE
//! progress streams, and cancellation of in-flight runs.

pub mod error;
pub mod handlers;
pub mod router;

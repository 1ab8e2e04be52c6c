//! Observability setup for stepwise: tracing subscriber and OpenTelemetry bridge.

pub mod tracing_setup;

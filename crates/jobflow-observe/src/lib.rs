//! Observability setup for jobflow.

pub mod tracing_setup;

//! Observability setup for the skill runtime.

pub mod tracing_setup;

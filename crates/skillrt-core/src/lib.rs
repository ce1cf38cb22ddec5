//! Skill runtime business logic.
//!
//! The registry owns `(spec, metadata, handler)` per skill, the execution
//! adapter is the only correct way to run one, the telemetry store and the
//! learning runtime observe every run, and the validation harness replays
//! recorded cases to feed promotion decisions.
//!
//! This crate performs no file I/O; persistence lives in `skillrt-infra`
//! behind the [`telemetry::TelemetrySink`] and [`learning::LearningRuntime`]
//! ports.

pub mod adapter;
pub mod demo;
pub mod error;
pub mod globals;
pub mod handler;
pub mod harness;
pub mod learning;
pub mod policy;
pub mod promotion;
pub mod registry;
pub mod telemetry;

//! Infrastructure layer for the skill runtime.
//!
//! Implements the persistence ports defined in `skillrt-core` on top of the
//! local filesystem: a JSONL telemetry sink and a JSONL learning runtime.
//! Also loads `config.toml` and wires a complete runtime from it.

pub mod bootstrap;
pub mod config;
pub mod jsonl;
pub mod learning;
pub mod telemetry;

//! Shared contract types for the skill runtime.
//!
//! Every record that crosses a component boundary lives here: skill specs and
//! their normalized metadata, run requests and results, validation cases,
//! telemetry events, learning events and the runtime configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod coerce;
pub mod config;
pub mod error;
pub mod learning;
pub mod run;
pub mod skill;
pub mod telemetry;
pub mod validation;

/// A JSON object, the runtime's "mapping" type for inputs, outputs and
/// free-form metadata.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Short, prefixed identifier built from a UUID v7 (`skillrun_0192f3...`).
///
/// The full simple-form UUID is kept so ids stay unique across threads even
/// when many are minted within the same millisecond.
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::now_v7().simple())
}

/// Current Unix time in seconds with sub-second precision.
pub fn unix_now() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

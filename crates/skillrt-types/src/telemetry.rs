//! Telemetry records emitted once per adapter run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::JsonMap;
use crate::coerce::{bool_or, float_or, int_or, map_or_empty, opt_string, require_non_empty, string_or};
use crate::error::ContractError;
use crate::skill::{SafetyClass, Stage, into_map};

pub const SKILL_TELEMETRY_EVENT_SCHEMA: &str = "aion.skill_telemetry_event.v1";

/// Immutable record of one run's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub schema_version: String,
    pub telemetry_id: String,
    /// Unix seconds.
    pub timestamp: f64,
    pub skill_run_id: String,
    pub skill_id: String,
    pub ok: bool,
    pub latency_ms: u64,
    pub session_id: Option<String>,
    pub turn_id: Option<String>,
    pub safety_class: Option<SafetyClass>,
    pub status: Option<Stage>,
    pub error_code: Option<String>,
    pub metadata: JsonMap,
}

impl TelemetryEvent {
    pub fn validate(self) -> Result<Self, ContractError> {
        require_non_empty("telemetry_id", &self.telemetry_id)?;
        require_non_empty("skill_id", &self.skill_id)?;
        require_non_empty("skill_run_id", &self.skill_run_id)?;
        Ok(self)
    }

    pub fn to_dict(&self) -> JsonMap {
        into_map(json!({
            "schema_version": self.schema_version,
            "telemetry_id": self.telemetry_id,
            "timestamp": self.timestamp,
            "skill_run_id": self.skill_run_id,
            "skill_id": self.skill_id,
            "ok": self.ok,
            "latency_ms": self.latency_ms,
            "session_id": self.session_id,
            "turn_id": self.turn_id,
            "safety_class": self.safety_class.map(|c| c.as_str()),
            "status": self.status.map(|s| s.as_str()),
            "error_code": self.error_code,
            "metadata": self.metadata,
        }))
    }

    pub fn from_dict(data: &Value) -> Result<Self, ContractError> {
        let d = map_or_empty(Some(data));
        let safety_class = opt_string(d.get("safety_class"))
            .map(|s| s.parse::<SafetyClass>())
            .transpose()?;
        let status = opt_string(d.get("status"))
            .map(|s| s.parse::<Stage>())
            .transpose()?;
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_TELEMETRY_EVENT_SCHEMA),
            telemetry_id: string_or(d.get("telemetry_id"), ""),
            timestamp: float_or(d.get("timestamp"), 0.0),
            skill_run_id: string_or(d.get("skill_run_id"), ""),
            skill_id: string_or(d.get("skill_id"), ""),
            ok: bool_or(d.get("ok"), false),
            latency_ms: u64::try_from(int_or(d.get("latency_ms"), 0)).unwrap_or(0),
            session_id: opt_string(d.get("session_id")),
            turn_id: opt_string(d.get("turn_id")),
            safety_class,
            status,
            error_code: opt_string(d.get("error_code")),
            metadata: map_or_empty(d.get("metadata")),
        }
        .validate()
    }
}

/// Per-skill rollup inside a [`TelemetrySummary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillTelemetryRollup {
    pub count: u64,
    pub ok: u64,
    pub fail: u64,
    pub avg_latency_ms: f64,
}

/// Totals over the events currently held by a telemetry store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub total: u64,
    pub ok: u64,
    pub fail: u64,
    pub avg_latency_ms: f64,
    pub by_skill: BTreeMap<String, SkillTelemetryRollup>,
}

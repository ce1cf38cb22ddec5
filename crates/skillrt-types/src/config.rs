//! Runtime configuration types.
//!
//! `RuntimeConfig` mirrors `config.toml` in the runtime's data directory and
//! controls the telemetry ring, learning persistence and demo registration.
//! Every field has a default so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Telemetry ring and optional JSONL persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Maximum number of events kept in memory; oldest are dropped first.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// JSONL file (relative to the data dir) each event is appended to.
    #[serde(default)]
    pub jsonl_path: Option<PathBuf>,
}

pub fn default_max_events() -> usize {
    5000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            jsonl_path: None,
        }
    }
}

impl TelemetryConfig {
    /// The ring cap with its floor of one event applied.
    pub fn effective_max_events(&self) -> usize {
        self.max_events.max(1)
    }
}

/// Learning runtime persistence and weakness clustering thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_events_path")]
    pub events_path: PathBuf,
    #[serde(default = "default_weaknesses_path")]
    pub weaknesses_path: PathBuf,
    /// Minimum failures in a cluster before it becomes a weakness signal.
    #[serde(default = "default_weakness_fail_threshold")]
    pub weakness_fail_threshold: u64,
    /// Minimum failure rate (per skill) before a cluster is reported.
    #[serde(default = "default_weakness_min_fail_rate")]
    pub weakness_min_fail_rate: f64,
}

fn default_true() -> bool {
    true
}

fn default_events_path() -> PathBuf {
    PathBuf::from("learning/aion_learning_events.jsonl")
}

fn default_weaknesses_path() -> PathBuf {
    PathBuf::from("learning/aion_weakness_signals.json")
}

fn default_weakness_fail_threshold() -> u64 {
    2
}

fn default_weakness_min_fail_rate() -> f64 {
    0.5
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            events_path: default_events_path(),
            weaknesses_path: default_weaknesses_path(),
            weakness_fail_threshold: default_weakness_fail_threshold(),
            weakness_min_fail_rate: default_weakness_min_fail_rate(),
        }
    }
}

impl LearningConfig {
    /// Thresholds with floors/clamps applied: threshold >= 1, rate in [0, 1].
    pub fn effective_thresholds(&self) -> (u64, f64) {
        let rate = if self.weakness_min_fail_rate.is_finite() {
            self.weakness_min_fail_rate.clamp(0.0, 1.0)
        } else {
            default_weakness_min_fail_rate()
        };
        (self.weakness_fail_threshold.max(1), rate)
    }
}

/// Built-in demo skill registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_true")]
    pub register_builtin_skills: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            register_builtin_skills: true,
        }
    }
}

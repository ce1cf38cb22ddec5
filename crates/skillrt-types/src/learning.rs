//! Learning records fed by the execution adapter.
//!
//! Every finalized run becomes a [`LearningEvent`] carrying a deterministic
//! [`RewardBreakdown`]. Learning runtimes aggregate events into a
//! [`LearningSummary`] and cluster repeated failures into
//! [`WeaknessSignal`]s.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::JsonMap;

pub const LEARNING_EVENT_SCHEMA: &str = "aion.learning_event.v2";
pub const REWARD_BREAKDOWN_SCHEMA: &str = "aion.learning_reward_breakdown.v1";
pub const WEAKNESS_REPORT_SCHEMA: &str = "aion.learning_weakness_report.v1";

/// Process/outcome decomposition of a run's reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub schema_version: String,
    /// Execution quality (policy, latency, error kind), in `[0, 1]`.
    pub process_score: f64,
    /// Success/failure quality, in `[0, 1]`.
    pub outcome_score: f64,
    /// Weighted combination, in `[0, 1]`.
    pub reward_score: f64,
    pub process_weight: f64,
    pub outcome_weight: f64,
}

/// Everything the adapter knows about a finalized run, handed to the
/// learning runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningEventInput {
    pub skill_id: String,
    pub skill_run_id: String,
    pub ok: bool,
    pub error_code: Option<String>,
    pub latency_ms: u64,
    pub session_id: Option<String>,
    pub turn_id: Option<String>,
    /// Classifiers and linkage: safety class, status, telemetry_ref,
    /// request_id, dry_run.
    pub metadata: JsonMap,
}

impl LearningEventInput {
    pub fn is_dry_run(&self) -> bool {
        self.metadata
            .get("dry_run")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// A recorded learning event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEvent {
    pub schema_version: String,
    pub event_id: String,
    pub timestamp: f64,
    pub event_type: String,
    pub skill_id: String,
    pub skill_run_id: String,
    pub ok: bool,
    pub error_code: Option<String>,
    pub latency_ms: u64,
    pub session_id: Option<String>,
    pub turn_id: Option<String>,
    pub reward: RewardBreakdown,
    pub metadata: JsonMap,
}

/// Read-path filter over recorded learning events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningQuery {
    pub skill_id: Option<String>,
    pub error_code: Option<String>,
    pub ok: Option<bool>,
    pub since_ts: Option<f64>,
    /// Most recent N matches, clamped to `[1, 5000]`.
    pub limit: usize,
    /// Exact-match filters on event metadata keys.
    pub metadata_filters: JsonMap,
}

impl Default for LearningQuery {
    fn default() -> Self {
        Self {
            skill_id: None,
            error_code: None,
            ok: None,
            since_ts: None,
            limit: 100,
            metadata_filters: JsonMap::new(),
        }
    }
}

impl LearningQuery {
    pub const MAX_LIMIT: usize = 5000;

    pub fn for_skill(skill_id: impl Into<String>) -> Self {
        Self {
            skill_id: Some(skill_id.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Blank string filters become `None`; the limit is clamped.
    pub fn validate(mut self) -> Self {
        self.skill_id = self
            .skill_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.error_code = self
            .error_code
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
        self
    }

    pub fn matches(&self, event: &LearningEvent) -> bool {
        if self.skill_id.as_deref().is_some_and(|id| id != event.skill_id) {
            return false;
        }
        if self
            .error_code
            .as_deref()
            .is_some_and(|code| Some(code) != event.error_code.as_deref())
        {
            return false;
        }
        if self.ok.is_some_and(|ok| ok != event.ok) {
            return false;
        }
        if self.since_ts.is_some_and(|since| event.timestamp < since) {
            return false;
        }
        self.metadata_filters
            .iter()
            .all(|(k, v)| event.metadata.get(k) == Some(v))
    }
}

/// Per-skill aggregate inside a [`LearningSummary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillLearningStats {
    pub count: u64,
    pub ok: u64,
    pub fail: u64,
    pub avg_latency_ms: f64,
    pub avg_process_score: f64,
    pub avg_outcome_score: f64,
    pub avg_reward_score: f64,
}

/// Aggregate summary over a set of learning events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSummary {
    pub total_events: u64,
    pub ok_count: u64,
    pub fail_count: u64,
    pub avg_latency_ms: f64,
    pub avg_process_score: f64,
    pub avg_outcome_score: f64,
    pub avg_reward_score: f64,
    pub by_skill: BTreeMap<String, SkillLearningStats>,
    pub by_error_code: BTreeMap<String, u64>,
    pub generated_at_ts: f64,
}

/// Severity of a failure cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// A cluster of repeated failures for one `(skill_id, error_code)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaknessSignal {
    pub weakness_id: String,
    pub kind: String,
    pub skill_id: String,
    pub error_code: String,
    pub count: u64,
    pub fail_rate: f64,
    pub avg_latency_ms: f64,
    pub confidence: f64,
    pub severity: Severity,
    pub summary: String,
    pub total_count_for_skill: u64,
}

/// The persisted weakness report (rewritten after every learning event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaknessReport {
    pub schema_version: String,
    pub generated_at_ts: f64,
    pub signals: Vec<WeaknessSignal>,
    pub weakness_fail_threshold: u64,
    pub weakness_min_fail_rate: f64,
}

//! Learning hooks fed by the execution adapter.
//!
//! The adapter hands every finalized run to a [`LearningRuntime`]. The
//! contract toward the adapter is fire-and-forget: errors are returned so the
//! adapter can log them, but they never reach the adapter's caller.
//!
//! [`reward`] holds the deterministic reward model and [`aggregate`] the
//! summary/weakness computations shared by every runtime implementation.

pub mod aggregate;
pub mod memory;
pub mod reward;

pub use memory::{InMemoryLearningRuntime, NoopLearningRuntime};

use skillrt_types::learning::{LEARNING_EVENT_SCHEMA, LearningEvent, LearningEventInput};
use skillrt_types::{prefixed_id, unix_now};

use crate::error::LearningError;

/// Port implemented by learning backends.
pub trait LearningRuntime: Send + Sync {
    /// Record one finalized skill run.
    fn record_skill_run(&self, input: LearningEventInput) -> Result<LearningEvent, LearningError>;
}

/// Turn adapter input into a scored [`LearningEvent`].
///
/// Blank skill ids are recorded as `unknown_skill` and blank run ids get a
/// fresh `learnrun_` id.
pub fn build_event(input: LearningEventInput) -> LearningEvent {
    let skill_id = match input.skill_id.trim() {
        "" => "unknown_skill".to_string(),
        id => id.to_string(),
    };
    let skill_run_id = match input.skill_run_id.trim() {
        "" => prefixed_id("learnrun"),
        id => id.to_string(),
    };
    let error_code = input
        .error_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string);
    let reward = reward::compute_reward(
        input.ok,
        error_code.as_deref(),
        input.latency_ms,
        input.is_dry_run(),
    );

    LearningEvent {
        schema_version: LEARNING_EVENT_SCHEMA.to_string(),
        event_id: prefixed_id("levent"),
        timestamp: unix_now(),
        event_type: "skill_run".to_string(),
        skill_id,
        skill_run_id,
        ok: input.ok,
        error_code,
        latency_ms: input.latency_ms,
        session_id: input.session_id.filter(|s| !s.trim().is_empty()),
        turn_id: input.turn_id.filter(|s| !s.trim().is_empty()),
        reward,
        metadata: input.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_event_fills_identity_and_reward() {
        let mut input = LearningEventInput {
            skill_id: "skill.echo_text".to_string(),
            skill_run_id: "skillrun_1".to_string(),
            ok: true,
            latency_ms: 2,
            session_id: Some(String::new()),
            ..Default::default()
        };
        input.metadata.insert("telemetry_ref".to_string(), json!("skilltel_1"));

        let event = build_event(input);
        assert!(event.event_id.starts_with("levent_"));
        assert_eq!(event.schema_version, "aion.learning_event.v2");
        assert_eq!(event.event_type, "skill_run");
        assert_eq!(event.session_id, None);
        assert_eq!(event.reward.reward_score, 1.0);
        assert_eq!(event.metadata["telemetry_ref"], json!("skilltel_1"));
    }

    #[test]
    fn build_event_substitutes_blank_ids() {
        let event = build_event(LearningEventInput {
            error_code: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(event.skill_id, "unknown_skill");
        assert!(event.skill_run_id.starts_with("learnrun_"));
        assert_eq!(event.error_code, None);
    }
}

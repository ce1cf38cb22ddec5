//! Promotion evaluation over validation results.
//!
//! A skill's recent [`SkillValidationResult`]s are compared against its
//! [`SkillValidationPolicy`]. The report lists every blocker found; a skill is
//! eligible only when there are none. The registry's stage rule is applied
//! separately when the promotion is actually attempted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use skillrt_types::skill::SkillValidationPolicy;
use skillrt_types::validation::SkillValidationResult;

/// One reason a skill is not yet eligible for promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromotionBlocker {
    #[error("only {have} validation runs, need {need}")]
    InsufficientSamples { have: usize, need: u32 },

    #[error("success rate {rate:.2} below minimum {min:.2}")]
    LowSuccessRate { rate: f64, min: f64 },

    #[error("average latency {avg:.1}ms above maximum {max}ms")]
    SlowAverageLatency { avg: f64, max: u64 },

    #[error("successful outputs missing required keys: {}", keys.join(", "))]
    MissingOutputKeys { keys: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
    pub skill_id: String,
    pub sample_size: usize,
    pub success_rate: f64,
    /// Average over results that carry a latency; 0 when none do.
    pub avg_latency_ms: f64,
    pub missing_output_keys: Vec<String>,
    pub blockers: Vec<PromotionBlocker>,
    pub eligible: bool,
}

/// Evaluate `results` for `skill_id` against `policy`.
///
/// Results for other skills are ignored. Required output keys are checked
/// on successful results only; a successful result without an output is
/// missing every key.
pub fn evaluate(
    skill_id: &str,
    policy: &SkillValidationPolicy,
    results: &[SkillValidationResult],
) -> PromotionReport {
    let relevant: Vec<&SkillValidationResult> =
        results.iter().filter(|r| r.skill_id == skill_id).collect();
    let sample_size = relevant.len();

    let success_rate = if sample_size == 0 {
        0.0
    } else {
        relevant.iter().filter(|r| r.ok).count() as f64 / sample_size as f64
    };

    let latencies: Vec<u64> = relevant.iter().filter_map(|r| r.latency_ms()).collect();
    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().map(|&ms| ms as f64).sum::<f64>() / latencies.len() as f64
    };

    let mut missing = BTreeSet::new();
    for result in relevant.iter().filter(|r| r.ok) {
        let output = result.output();
        for key in &policy.required_output_keys {
            if !output.is_some_and(|o| o.contains_key(key)) {
                missing.insert(key.clone());
            }
        }
    }
    let missing_output_keys: Vec<String> = missing.into_iter().collect();

    let mut blockers = Vec::new();
    if sample_size < policy.min_sample_size as usize {
        blockers.push(PromotionBlocker::InsufficientSamples {
            have: sample_size,
            need: policy.min_sample_size,
        });
    }
    if success_rate < policy.min_success_rate {
        blockers.push(PromotionBlocker::LowSuccessRate {
            rate: success_rate,
            min: policy.min_success_rate,
        });
    }
    if avg_latency_ms > policy.max_avg_latency_ms as f64 {
        blockers.push(PromotionBlocker::SlowAverageLatency {
            avg: avg_latency_ms,
            max: policy.max_avg_latency_ms,
        });
    }
    if !missing_output_keys.is_empty() {
        blockers.push(PromotionBlocker::MissingOutputKeys {
            keys: missing_output_keys.clone(),
        });
    }

    PromotionReport {
        skill_id: skill_id.to_string(),
        sample_size,
        success_rate,
        avg_latency_ms,
        missing_output_keys,
        eligible: blockers.is_empty(),
        blockers,
    }
}

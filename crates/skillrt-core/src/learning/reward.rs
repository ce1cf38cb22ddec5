//! Deterministic process/outcome reward model.

use skillrt_types::learning::{REWARD_BREAKDOWN_SCHEMA, RewardBreakdown};

pub const PROCESS_WEIGHT: f64 = 0.6;
pub const OUTCOME_WEIGHT: f64 = 0.4;

/// Whether `code` is one of the policy-gate deny codes.
pub fn is_policy_block(code: &str) -> bool {
    matches!(
        code,
        "skill_not_registered" | "skill_disabled" | "external_side_effect_not_allowed"
    ) || code.starts_with("skill_stage_not_verified")
}

fn base_process_score(ok: bool, error_code: Option<&str>) -> f64 {
    match error_code {
        Some("skill_not_found") => 0.10,
        Some(code) if is_policy_block(code) => 0.35,
        Some("skill_execution_error") => 0.25,
        _ if !ok => 0.30,
        _ => 1.0,
    }
}

fn latency_penalty(latency_ms: u64) -> f64 {
    match latency_ms {
        l if l > 5000 => 0.20,
        l if l > 2000 => 0.12,
        l if l > 1000 => 0.07,
        l if l > 500 => 0.03,
        _ => 0.0,
    }
}

/// Score one run.
///
/// Outcome is 1 on success and 0 on failure. Process starts at 1 and is
/// lowered by the error kind and by latency. Dry runs floor outcome at 0.5
/// and process at 0.9.
pub fn compute_reward(
    ok: bool,
    error_code: Option<&str>,
    latency_ms: u64,
    dry_run: bool,
) -> RewardBreakdown {
    let mut outcome = if ok { 1.0 } else { 0.0 };
    let mut process = base_process_score(ok, error_code) - latency_penalty(latency_ms);
    if dry_run {
        outcome = f64::max(outcome, 0.5);
        process = f64::max(process, 0.9);
    }
    let process = process.clamp(0.0, 1.0);
    let outcome = outcome.clamp(0.0, 1.0);

    RewardBreakdown {
        schema_version: REWARD_BREAKDOWN_SCHEMA.to_string(),
        process_score: process,
        outcome_score: outcome,
        reward_score: PROCESS_WEIGHT * process + OUTCOME_WEIGHT * outcome,
        process_weight: PROCESS_WEIGHT,
        outcome_weight: OUTCOME_WEIGHT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn success_scores_full_reward() {
        let r = compute_reward(true, None, 10, false);
        assert_eq!(r.process_score, 1.0);
        assert_eq!(r.outcome_score, 1.0);
        assert!(approx(r.reward_score, 1.0));
    }

    #[test]
    fn error_codes_set_process_score() {
        assert!(approx(compute_reward(false, Some("skill_not_found"), 0, false).process_score, 0.10));
        assert!(approx(compute_reward(false, Some("skill_disabled"), 0, false).process_score, 0.35));
        assert!(approx(
            compute_reward(false, Some("skill_stage_not_verified:experimental"), 0, false).process_score,
            0.35
        ));
        assert!(approx(
            compute_reward(false, Some("skill_execution_error"), 0, false).process_score,
            0.25
        ));
        assert!(approx(compute_reward(false, Some("weird"), 0, false).process_score, 0.30));
        assert!(approx(compute_reward(false, None, 0, false).process_score, 0.30));
    }

    #[test]
    fn latency_penalties_step_down() {
        assert!(approx(compute_reward(true, None, 501, false).process_score, 0.97));
        assert!(approx(compute_reward(true, None, 1001, false).process_score, 0.93));
        assert!(approx(compute_reward(true, None, 2001, false).process_score, 0.88));
        assert!(approx(compute_reward(true, None, 5001, false).process_score, 0.80));
        assert!(approx(compute_reward(true, None, 500, false).process_score, 1.0));
    }

    #[test]
    fn penalties_clamp_at_zero() {
        let r = compute_reward(false, Some("skill_not_found"), 10_000, false);
        assert_eq!(r.process_score, 0.0);
        assert_eq!(r.reward_score, 0.0);
    }

    #[test]
    fn dry_run_floors_scores() {
        let r = compute_reward(true, None, 0, true);
        assert_eq!(r.outcome_score, 1.0);
        assert!(approx(r.process_score, 1.0));

        let r = compute_reward(false, Some("skill_execution_error"), 0, true);
        assert!(approx(r.outcome_score, 0.5));
        assert!(approx(r.process_score, 0.9));
        assert!(approx(r.reward_score, 0.6 * 0.9 + 0.4 * 0.5));
    }
}

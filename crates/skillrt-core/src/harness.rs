//! Validation harness: replay stored cases through the adapter and score
//! them, then feed the scores into promotion decisions.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use skillrt_types::coerce::{bool_or, float_or};
use skillrt_types::error::ContractError;
use skillrt_types::run::SkillRunRequest;
use skillrt_types::skill::Stage;
use skillrt_types::validation::{
    SKILL_VALIDATION_RESULT_SCHEMA, SkillValidationCase, SkillValidationResult,
};
use tracing::{debug, info};

use crate::adapter::SkillExecutionAdapter;
use crate::error::PromotionError;
use crate::promotion::{self, PromotionReport};

/// Outcome of [`ValidationHarness::promote_if_eligible`].
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionDecision {
    pub report: PromotionReport,
    /// The stage reached, or `None` when the report had blockers.
    pub promoted_to: Option<Stage>,
}

/// Runs validation cases through a [`SkillExecutionAdapter`], so every case
/// is gated and recorded like a normal run, and promotes skills whose
/// results clear their validation policy.
pub struct ValidationHarness {
    adapter: SkillExecutionAdapter,
}

impl ValidationHarness {
    pub fn new(adapter: SkillExecutionAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &SkillExecutionAdapter {
        &self.adapter
    }

    /// Replay one case (never as a dry run) and score it.
    ///
    /// Always-on checks: `skill_run_ok`, `skill_id_match`. Optional checks
    /// from `expected`: `expect_ok`, `require_output_keys` (only when it is
    /// a list), `max_latency_ms`.
    pub fn run_case(
        &self,
        case: &SkillValidationCase,
    ) -> Result<SkillValidationResult, ContractError> {
        let case = case.clone().validate()?;
        let mut raw = case.request.clone();
        raw.insert("skill_id".to_string(), json!(case.skill_id));
        raw.insert("dry_run".to_string(), json!(false));
        let request = SkillRunRequest::from_dict(&Value::Object(raw))?;
        let inputs = request.inputs.clone();

        let result = self.adapter.run(request);

        let mut checks = BTreeMap::new();
        checks.insert("skill_run_ok".to_string(), result.ok);
        checks.insert("skill_id_match".to_string(), result.skill_id == case.skill_id);
        if let Some(expect_ok) = case.expected.get("expect_ok") {
            checks.insert(
                "expect_ok".to_string(),
                bool_or(Some(expect_ok), false) == result.ok,
            );
        }
        if let Some(Value::Array(keys)) = case.expected.get("require_output_keys") {
            let present = keys
                .iter()
                .all(|k| k.as_str().is_some_and(|k| result.output.contains_key(k)));
            checks.insert("require_output_keys".to_string(), present);
        }
        if let Some(bound) = case.expected.get("max_latency_ms") {
            let bound = float_or(Some(bound), -1.0);
            checks.insert(
                "max_latency_ms".to_string(),
                result.latency_ms as f64 <= bound,
            );
        }

        let total = checks.len();
        let passed = checks.values().filter(|ok| **ok).count();
        let mut details = skillrt_types::JsonMap::new();
        details.insert("inputs".to_string(), Value::Object(inputs));
        details.insert("result".to_string(), Value::Object(result.to_dict()));
        details.insert("expected".to_string(), Value::Object(case.expected.clone()));
        details.insert(
            "counts".to_string(),
            json!({ "passed": passed, "total": total }),
        );
        debug!(
            case_id = %case.case_id,
            skill_id = %case.skill_id,
            passed,
            total,
            "validation case scored"
        );

        SkillValidationResult {
            schema_version: SKILL_VALIDATION_RESULT_SCHEMA.to_string(),
            ok: passed == total,
            case_id: case.case_id,
            skill_id: case.skill_id,
            pass_rate: passed as f64 / total as f64,
            checks,
            details,
        }
        .validate()
    }

    /// Replay a batch of cases in order. Stops at the first malformed case.
    pub fn run_cases(
        &self,
        cases: &[SkillValidationCase],
    ) -> Result<Vec<SkillValidationResult>, ContractError> {
        cases.iter().map(|case| self.run_case(case)).collect()
    }

    /// Evaluate `results` against the skill's validation policy and promote
    /// to `target` only when no blocker remains.
    ///
    /// The registry's stage rule still applies, so an eligible skill can be
    /// refused as a downgrade or skip-ahead.
    pub fn promote_if_eligible(
        &self,
        skill_id: &str,
        target: Stage,
        results: &[SkillValidationResult],
    ) -> Result<PromotionDecision, PromotionError> {
        let registry = self.adapter.registry();
        let metadata = registry
            .get_metadata(skill_id)
            .ok_or_else(|| PromotionError::UnknownSkill(skill_id.to_string()))?;
        let report = promotion::evaluate(skill_id, &metadata.validation_policy, results);
        if !report.eligible {
            info!(
                skill_id,
                target = %target,
                blockers = report.blockers.len(),
                "promotion withheld"
            );
            return Ok(PromotionDecision {
                report,
                promoted_to: None,
            });
        }
        let stage = registry.promote(skill_id, target)?;
        Ok(PromotionDecision {
            report,
            promoted_to: Some(stage),
        })
    }
}

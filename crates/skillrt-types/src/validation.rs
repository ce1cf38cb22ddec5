//! Validation case/result contracts used by the replay harness.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::JsonMap;
use crate::coerce::{bool_or, float_or, map_or_empty, normalize_list, require_non_empty, string_list, string_or};
use crate::error::ContractError;
use crate::skill::into_map;

pub const SKILL_VALIDATION_CASE_SCHEMA: &str = "aion.skill_validation_case.v1";
pub const SKILL_VALIDATION_RESULT_SCHEMA: &str = "aion.skill_validation_result.v1";

/// A stored `(request, expected)` pair replayed deterministically against a
/// registered skill.
///
/// Recognised `expected` keys: `expect_ok` (bool), `require_output_keys`
/// (list of strings), `max_latency_ms` (number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillValidationCase {
    pub schema_version: String,
    pub case_id: String,
    pub skill_id: String,
    /// A run request in dict form; its `skill_id` is overridden on replay.
    pub request: JsonMap,
    pub expected: JsonMap,
    pub tags: Vec<String>,
}

impl SkillValidationCase {
    pub fn new(case_id: impl Into<String>, skill_id: impl Into<String>) -> Self {
        Self {
            schema_version: SKILL_VALIDATION_CASE_SCHEMA.to_string(),
            case_id: case_id.into(),
            skill_id: skill_id.into(),
            request: JsonMap::new(),
            expected: JsonMap::new(),
            tags: Vec::new(),
        }
    }

    pub fn validate(mut self) -> Result<Self, ContractError> {
        require_non_empty("case_id", &self.case_id)?;
        require_non_empty("skill_id", &self.skill_id)?;
        self.tags = normalize_list(self.tags);
        Ok(self)
    }

    pub fn to_dict(&self) -> JsonMap {
        into_map(json!({
            "schema_version": self.schema_version,
            "case_id": self.case_id,
            "skill_id": self.skill_id,
            "request": self.request,
            "expected": self.expected,
            "tags": self.tags,
        }))
    }

    pub fn from_dict(data: &Value) -> Result<Self, ContractError> {
        let d = map_or_empty(Some(data));
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_VALIDATION_CASE_SCHEMA),
            case_id: string_or(d.get("case_id"), ""),
            skill_id: string_or(d.get("skill_id"), ""),
            request: map_or_empty(d.get("request")),
            expected: map_or_empty(d.get("expected")),
            tags: string_list(d.get("tags")),
        }
        .validate()
    }
}

/// Scored outcome of replaying one [`SkillValidationCase`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillValidationResult {
    pub schema_version: String,
    /// True iff every evaluated check passed.
    pub ok: bool,
    pub case_id: String,
    pub skill_id: String,
    /// `passed / total` over the checks actually evaluated, in `[0, 1]`.
    pub pass_rate: f64,
    pub checks: BTreeMap<String, bool>,
    /// Inputs, run result, expectation and pass counts.
    pub details: JsonMap,
}

impl SkillValidationResult {
    pub fn validate(mut self) -> Result<Self, ContractError> {
        require_non_empty("case_id", &self.case_id)?;
        require_non_empty("skill_id", &self.skill_id)?;
        self.pass_rate = if self.pass_rate.is_finite() {
            self.pass_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(self)
    }

    /// Number of checks that passed.
    pub fn passed(&self) -> usize {
        self.checks.values().filter(|ok| **ok).count()
    }

    /// Latency of the underlying run, if the details carry it.
    pub fn latency_ms(&self) -> Option<u64> {
        self.details
            .get("result")
            .and_then(|r| r.get("latency_ms"))
            .and_then(Value::as_u64)
    }

    /// Output mapping of the underlying run, if the details carry it.
    pub fn output(&self) -> Option<&JsonMap> {
        self.details
            .get("result")
            .and_then(|r| r.get("output"))
            .and_then(Value::as_object)
    }

    pub fn to_dict(&self) -> JsonMap {
        into_map(json!({
            "schema_version": self.schema_version,
            "ok": self.ok,
            "case_id": self.case_id,
            "skill_id": self.skill_id,
            "pass_rate": self.pass_rate,
            "checks": self.checks,
            "details": self.details,
        }))
    }

    pub fn from_dict(data: &Value) -> Result<Self, ContractError> {
        let d = map_or_empty(Some(data));
        let checks = map_or_empty(d.get("checks"))
            .into_iter()
            .map(|(name, passed)| {
                let passed = bool_or(Some(&passed), false);
                (name, passed)
            })
            .collect();
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_VALIDATION_RESULT_SCHEMA),
            ok: bool_or(d.get("ok"), false),
            case_id: string_or(d.get("case_id"), ""),
            skill_id: string_or(d.get("skill_id"), ""),
            pass_rate: float_or(d.get("pass_rate"), 0.0),
            checks,
            details: map_or_empty(d.get("details")),
        }
        .validate()
    }
}

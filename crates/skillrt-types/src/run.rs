//! Execution request/result contracts between callers and the adapter.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::JsonMap;
use crate::coerce::{bool_or, int_or, map_or_empty, opt_string, require_non_empty, string_or, truthy};
use crate::error::ContractError;
use crate::skill::{SafetyClass, Stage, into_map};

pub const SKILL_RUN_REQUEST_SCHEMA: &str = "aion.skill_run_request.v1";
pub const SKILL_RUN_RESULT_SCHEMA: &str = "aion.skill_run_result.v1";

/// Request metadata key opting into `external_side_effect` skills.
pub const ALLOW_EXTERNAL_SIDE_EFFECTS: &str = "allow_external_side_effects";
/// Request metadata key restricting execution to verified/core skills.
pub const REQUIRE_VERIFIED_SKILL: &str = "require_verified_skill";

// ---------------------------------------------------------------------------
// SkillRunRequest
// ---------------------------------------------------------------------------

/// A single execution request from an orchestrator to the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRunRequest {
    pub schema_version: String,
    pub skill_id: String,
    pub inputs: JsonMap,
    pub session_id: Option<String>,
    pub turn_id: Option<String>,
    pub request_id: Option<String>,
    pub dry_run: bool,
    /// Overrides the spec's timeout in the trace; must be >= 1 when present.
    pub timeout_ms_override: Option<u64>,
    pub metadata: JsonMap,
}

impl SkillRunRequest {
    pub fn new(skill_id: impl Into<String>, inputs: JsonMap) -> Self {
        Self {
            schema_version: SKILL_RUN_REQUEST_SCHEMA.to_string(),
            skill_id: skill_id.into(),
            inputs,
            session_id: None,
            turn_id: None,
            request_id: None,
            dry_run: false,
            timeout_ms_override: None,
            metadata: JsonMap::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>, turn_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.turn_id = Some(turn_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn validate(self) -> Result<Self, ContractError> {
        require_non_empty("skill_id", &self.skill_id)?;
        if self.timeout_ms_override == Some(0) {
            return Err(ContractError::BelowMinimum {
                field: "timeout_ms_override",
                min: 1,
                value: 0,
            });
        }
        Ok(self)
    }

    /// Whether the caller opted into skills with external side effects.
    pub fn allows_external_side_effects(&self) -> bool {
        self.metadata
            .get(ALLOW_EXTERNAL_SIDE_EFFECTS)
            .is_some_and(truthy)
    }

    /// Whether the caller requires a verified or core skill.
    pub fn requires_verified_skill(&self) -> bool {
        self.metadata.get(REQUIRE_VERIFIED_SKILL).is_some_and(truthy)
    }

    pub fn to_dict(&self) -> JsonMap {
        into_map(json!({
            "schema_version": self.schema_version,
            "skill_id": self.skill_id,
            "inputs": self.inputs,
            "session_id": self.session_id,
            "turn_id": self.turn_id,
            "request_id": self.request_id,
            "dry_run": self.dry_run,
            "timeout_ms_override": self.timeout_ms_override,
            "metadata": self.metadata,
        }))
    }

    pub fn from_dict(data: &Value) -> Result<Self, ContractError> {
        let d = map_or_empty(Some(data));
        let timeout_ms_override = match d.get("timeout_ms_override") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let value = int_or(Some(raw), 0);
                let ms = u64::try_from(value).ok().filter(|ms| *ms >= 1).ok_or(
                    ContractError::BelowMinimum {
                        field: "timeout_ms_override",
                        min: 1,
                        value,
                    },
                )?;
                Some(ms)
            }
        };
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_RUN_REQUEST_SCHEMA),
            skill_id: string_or(d.get("skill_id"), ""),
            inputs: map_or_empty(d.get("inputs")),
            session_id: opt_string(d.get("session_id")),
            turn_id: opt_string(d.get("turn_id")),
            request_id: opt_string(d.get("request_id")),
            dry_run: bool_or(d.get("dry_run"), false),
            timeout_ms_override,
            metadata: map_or_empty(d.get("metadata")),
        }
        .validate()
    }
}

// ---------------------------------------------------------------------------
// SkillRunResult
// ---------------------------------------------------------------------------

/// The outcome of one adapter run.
///
/// Failed runs (`ok == false`) are still fully formed: they carry an error
/// code, a trace and a telemetry reference like any other result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRunResult {
    pub schema_version: String,
    pub ok: bool,
    pub skill_id: String,
    pub skill_run_id: String,
    pub output: JsonMap,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub latency_ms: u64,
    pub safety_class: SafetyClass,
    pub status: Stage,
    pub trace: JsonMap,
    pub telemetry_ref: Option<String>,
    pub metadata: JsonMap,
}

impl SkillRunResult {
    /// A skeleton result for `skill_id`/`skill_run_id` with placeholder
    /// classifiers (`internal_safe`, `experimental`).
    pub fn new(skill_id: impl Into<String>, skill_run_id: impl Into<String>) -> Self {
        Self {
            schema_version: SKILL_RUN_RESULT_SCHEMA.to_string(),
            ok: false,
            skill_id: skill_id.into(),
            skill_run_id: skill_run_id.into(),
            output: JsonMap::new(),
            error: None,
            error_code: None,
            latency_ms: 0,
            safety_class: SafetyClass::InternalSafe,
            status: Stage::Experimental,
            trace: JsonMap::new(),
            telemetry_ref: None,
            metadata: JsonMap::new(),
        }
    }

    pub fn validate(self) -> Result<Self, ContractError> {
        require_non_empty("skill_id", &self.skill_id)?;
        require_non_empty("skill_run_id", &self.skill_run_id)?;
        Ok(self)
    }

    pub fn to_dict(&self) -> JsonMap {
        into_map(json!({
            "schema_version": self.schema_version,
            "ok": self.ok,
            "skill_id": self.skill_id,
            "skill_run_id": self.skill_run_id,
            "output": self.output,
            "error": self.error,
            "error_code": self.error_code,
            "latency_ms": self.latency_ms,
            "safety_class": self.safety_class.as_str(),
            "status": self.status.as_str(),
            "trace": self.trace,
            "telemetry_ref": self.telemetry_ref,
            "metadata": self.metadata,
        }))
    }

    pub fn from_dict(data: &Value) -> Result<Self, ContractError> {
        let d = map_or_empty(Some(data));
        let latency = int_or(d.get("latency_ms"), 0);
        let latency_ms = u64::try_from(latency).map_err(|_| ContractError::BelowMinimum {
            field: "latency_ms",
            min: 0,
            value: latency,
        })?;
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_RUN_RESULT_SCHEMA),
            ok: bool_or(d.get("ok"), false),
            skill_id: string_or(d.get("skill_id"), ""),
            skill_run_id: string_or(d.get("skill_run_id"), ""),
            output: map_or_empty(d.get("output")),
            error: opt_string(d.get("error")),
            error_code: opt_string(d.get("error_code")),
            latency_ms,
            safety_class: string_or(d.get("safety_class"), "internal_safe").parse()?,
            status: string_or(d.get("status"), "experimental").parse()?,
            trace: map_or_empty(d.get("trace")),
            telemetry_ref: opt_string(d.get("telemetry_ref")),
            metadata: map_or_empty(d.get("metadata")),
        }
        .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(text: &str) -> JsonMap {
        into_map(json!({ "text": text }))
    }

    #[test]
    fn request_rejects_empty_skill_id() {
        let err = SkillRunRequest::new("", JsonMap::new()).validate().unwrap_err();
        assert_eq!(err, ContractError::EmptyField { field: "skill_id" });
    }

    #[test]
    fn request_rejects_zero_timeout_override() {
        let mut req = SkillRunRequest::new("skill.echo_text", inputs("hi"));
        req.timeout_ms_override = Some(0);
        assert!(req.validate().is_err());

        let err = SkillRunRequest::from_dict(&json!({
            "skill_id": "skill.echo_text",
            "timeout_ms_override": 0,
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            ContractError::BelowMinimum { field: "timeout_ms_override", .. }
        ));
    }

    #[test]
    fn request_policy_flags_read_from_metadata() {
        let req = SkillRunRequest::new("s", JsonMap::new());
        assert!(!req.allows_external_side_effects());
        assert!(!req.requires_verified_skill());

        let req = req
            .with_metadata(ALLOW_EXTERNAL_SIDE_EFFECTS, json!(true))
            .with_metadata(REQUIRE_VERIFIED_SKILL, json!("yes"));
        assert!(req.allows_external_side_effects());
        assert!(req.requires_verified_skill());
    }

    #[test]
    fn request_from_dict_tolerates_garbage_containers() {
        let req = SkillRunRequest::from_dict(&json!({
            "skill_id": "skill.echo_text",
            "inputs": "not a map",
            "metadata": null,
            "session_id": 42,
        }))
        .unwrap();
        assert!(req.inputs.is_empty());
        assert!(req.metadata.is_empty());
        assert_eq!(req.session_id.as_deref(), Some("42"));
        assert_eq!(req.schema_version, SKILL_RUN_REQUEST_SCHEMA);
    }

    #[test]
    fn request_dict_roundtrip() {
        let mut req = SkillRunRequest::new("skill.echo_text", inputs("hi"))
            .with_session("sess-1", "turn-3")
            .with_dry_run(true);
        req.request_id = Some("req-9".to_string());
        req.timeout_ms_override = Some(250);
        let back = SkillRunRequest::from_dict(&Value::Object(req.to_dict())).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn result_dict_roundtrip() {
        let mut res = SkillRunResult::new("skill.echo_text", "skillrun_abc");
        res.ok = true;
        res.output = into_map(json!({"echo": "hi", "length": 2}));
        res.latency_ms = 3;
        res.safety_class = SafetyClass::SafeTransform;
        res.status = Stage::Verified;
        res.trace = into_map(json!({"adapter": "SkillExecutionAdapter"}));
        res.telemetry_ref = Some("skilltel_1".to_string());
        let dict = Value::Object(res.to_dict());
        assert_eq!(dict["schema_version"], "aion.skill_run_result.v1");
        assert_eq!(SkillRunResult::from_dict(&dict).unwrap(), res);
    }

    #[test]
    fn result_requires_run_id_and_valid_enums() {
        assert!(SkillRunResult::new("s", "").validate().is_err());
        let err = SkillRunResult::from_dict(&json!({
            "skill_id": "s", "skill_run_id": "r", "safety_class": "unknown"
        }))
        .unwrap_err();
        assert_eq!(err, ContractError::UnknownSafetyClass("unknown".to_string()));
    }
}

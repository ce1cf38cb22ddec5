//! Skill registry contracts.
//!
//! Defines the safety and stage vocabularies, the registry-facing
//! [`SkillSpec`], the normalized lifecycle view [`SkillMetadata`] and the
//! promotion gate parameters [`SkillValidationPolicy`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::JsonMap;
use crate::coerce::{
    bool_or, float_or, int_or, map_or_empty, normalize_list, require_non_empty, string_list,
    string_or,
};
use crate::error::ContractError;

pub const SKILL_SPEC_SCHEMA: &str = "aion.skill_spec.v1";
pub const SKILL_METADATA_SCHEMA: &str = "aion.skill_metadata.v1";
pub const SKILL_VALIDATION_POLICY_SCHEMA: &str = "aion.skill_validation_policy.v1";

// ---------------------------------------------------------------------------
// Safety classes
// ---------------------------------------------------------------------------

/// The side-effect envelope a skill is allowed to operate in.
///
/// The first four variants are the normalized vocabulary used by metadata.
/// The remaining five are legacy labels still accepted on specs and results
/// for backward compatibility; they are never emitted anew in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyClass {
    SafeRead,
    SafeTransform,
    InternalState,
    ExternalSideEffect,
    // Legacy labels
    InternalSafe,
    ReadOnly,
    ExternalNetwork,
    SideEffecting,
    Restricted,
}

impl SafetyClass {
    pub const ALL: [SafetyClass; 9] = [
        SafetyClass::SafeRead,
        SafetyClass::SafeTransform,
        SafetyClass::InternalState,
        SafetyClass::ExternalSideEffect,
        SafetyClass::InternalSafe,
        SafetyClass::ReadOnly,
        SafetyClass::ExternalNetwork,
        SafetyClass::SideEffecting,
        SafetyClass::Restricted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SafeRead => "safe_read",
            Self::SafeTransform => "safe_transform",
            Self::InternalState => "internal_state",
            Self::ExternalSideEffect => "external_side_effect",
            Self::InternalSafe => "internal_safe",
            Self::ReadOnly => "read_only",
            Self::ExternalNetwork => "external_network",
            Self::SideEffecting => "side_effecting",
            Self::Restricted => "restricted",
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            Self::InternalSafe
                | Self::ReadOnly
                | Self::ExternalNetwork
                | Self::SideEffecting
                | Self::Restricted
        )
    }

    /// Map a legacy label onto the normalized vocabulary. Normalized labels
    /// pass through unchanged.
    pub fn normalized(&self) -> SafetyClass {
        match self {
            Self::InternalSafe => Self::InternalState,
            Self::ReadOnly => Self::SafeRead,
            Self::ExternalNetwork | Self::SideEffecting | Self::Restricted => {
                Self::ExternalSideEffect
            }
            other => *other,
        }
    }

    /// Parse, falling back to `safe_read` for unknown labels.
    pub fn parse_lenient(s: &str) -> SafetyClass {
        s.parse().unwrap_or(SafetyClass::SafeRead)
    }
}

impl fmt::Display for SafetyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyClass {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ContractError::UnknownSafetyClass(needle.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Skill lifecycle stage. The declaration order is the promotion order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Experimental,
    Verified,
    Core,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Experimental, Stage::Verified, Stage::Core];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Experimental => "experimental",
            Self::Verified => "verified",
            Self::Core => "core",
        }
    }

    /// Position in the lifecycle total order.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Experimental => 0,
            Self::Verified => 1,
            Self::Core => 2,
        }
    }

    /// The stage one step up, if any.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::Experimental => Some(Self::Verified),
            Self::Verified => Some(Self::Core),
            Self::Core => None,
        }
    }

    /// Whether moving from `self` to `target` is an allowed promotion:
    /// same stage (no-op) or exactly one step up.
    pub fn can_promote_to(&self, target: Stage) -> bool {
        let (current, target) = (self.rank(), target.rank());
        target == current || target == current + 1
    }

    pub fn is_verified_or_better(&self) -> bool {
        self.rank() >= Stage::Verified.rank()
    }

    /// Parse, falling back to `experimental` for unknown labels.
    pub fn parse_lenient(s: &str) -> Stage {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "experimental" => Ok(Stage::Experimental),
            "verified" => Ok(Stage::Verified),
            "core" => Ok(Stage::Core),
            other => Err(ContractError::UnknownStage(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation policy
// ---------------------------------------------------------------------------

fn default_min_success_rate() -> f64 {
    0.80
}

fn default_max_avg_latency_ms() -> u64 {
    2000
}

fn default_min_sample_size() -> u32 {
    3
}

/// Promotion gate parameters consumed by the promotion evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillValidationPolicy {
    pub schema_version: String,
    /// Minimum fraction of passing validation runs, in `[0, 1]`.
    pub min_success_rate: f64,
    /// Upper bound on average latency across validation runs (>= 1).
    pub max_avg_latency_ms: u64,
    /// Keys every successful output must contain.
    pub required_output_keys: Vec<String>,
    /// Minimum number of validation runs before promotion is considered.
    pub min_sample_size: u32,
}

impl Default for SkillValidationPolicy {
    fn default() -> Self {
        Self {
            schema_version: SKILL_VALIDATION_POLICY_SCHEMA.to_string(),
            min_success_rate: default_min_success_rate(),
            max_avg_latency_ms: default_max_avg_latency_ms(),
            required_output_keys: Vec::new(),
            min_sample_size: default_min_sample_size(),
        }
    }
}

impl SkillValidationPolicy {
    /// Clamp every field into its allowed range. Never fails: out-of-range
    /// values are replaced with defaults.
    pub fn validate(mut self) -> Self {
        self.min_success_rate = if self.min_success_rate.is_finite() {
            self.min_success_rate.clamp(0.0, 1.0)
        } else {
            default_min_success_rate()
        };
        if self.max_avg_latency_ms < 1 {
            self.max_avg_latency_ms = default_max_avg_latency_ms();
        }
        self.min_sample_size = self.min_sample_size.max(1);
        self.required_output_keys = normalize_list(self.required_output_keys);
        self
    }

    pub fn to_dict(&self) -> JsonMap {
        let value = json!({
            "schema_version": self.schema_version,
            "min_success_rate": self.min_success_rate,
            "max_avg_latency_ms": self.max_avg_latency_ms,
            "required_output_keys": self.required_output_keys,
            "min_sample_size": self.min_sample_size,
        });
        into_map(value)
    }

    /// Build from a loose mapping. `None` or a non-object yields the default
    /// policy.
    pub fn from_dict(data: Option<&Value>) -> Self {
        let d = map_or_empty(data);
        let max_latency = int_or(d.get("max_avg_latency_ms"), 2000);
        let sample = int_or(d.get("min_sample_size"), 3);
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_VALIDATION_POLICY_SCHEMA),
            min_success_rate: float_or(d.get("min_success_rate"), default_min_success_rate()),
            max_avg_latency_ms: u64::try_from(max_latency).unwrap_or(0),
            required_output_keys: string_list(d.get("required_output_keys")),
            min_sample_size: u32::try_from(sample.clamp(0, i64::from(u32::MAX))).unwrap_or(1),
        }
        .validate()
    }
}

// ---------------------------------------------------------------------------
// SkillMetadata
// ---------------------------------------------------------------------------

/// Normalized lifecycle view of a registered skill.
///
/// Kept in lockstep with the owning [`SkillSpec`] by the registry: stage,
/// enabled flag, tags, topics and validation policy always match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub schema_version: String,
    pub skill_id: String,
    pub title: String,
    pub description: String,
    pub safety_class: SafetyClass,
    pub stage: Stage,
    pub tags: Vec<String>,
    pub topics: Vec<String>,
    pub enabled: bool,
    pub validation_policy: SkillValidationPolicy,
    /// Open extension mapping (spec version, timeout, retry policy, ...).
    pub extra: JsonMap,
}

impl SkillMetadata {
    /// Minimal metadata for `skill_id` with every other field defaulted.
    pub fn new(skill_id: impl Into<String>) -> Self {
        Self {
            schema_version: SKILL_METADATA_SCHEMA.to_string(),
            skill_id: skill_id.into(),
            title: String::new(),
            description: String::new(),
            safety_class: SafetyClass::SafeRead,
            stage: Stage::Experimental,
            tags: Vec::new(),
            topics: Vec::new(),
            enabled: true,
            validation_policy: SkillValidationPolicy::default(),
            extra: JsonMap::new(),
        }
    }

    pub fn validate(mut self) -> Result<Self, ContractError> {
        self.skill_id = self.skill_id.trim().to_string();
        require_non_empty("skill_id", &self.skill_id)?;
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            self.title = self.skill_id.clone();
        }
        self.description = self.description.trim().to_string();
        self.tags = normalize_list(self.tags);
        self.topics = normalize_list(self.topics);
        self.validation_policy = self.validation_policy.validate();
        Ok(self)
    }

    pub fn to_dict(&self) -> JsonMap {
        let value = json!({
            "schema_version": self.schema_version,
            "skill_id": self.skill_id,
            "title": self.title,
            "description": self.description,
            "safety_class": self.safety_class.as_str(),
            "stage": self.stage.as_str(),
            "tags": self.tags,
            "topics": self.topics,
            "enabled": self.enabled,
            "validation_policy": self.validation_policy.to_dict(),
            "extra": self.extra,
        });
        into_map(value)
    }

    /// Tolerant constructor. Unknown safety classes degrade to `safe_read`
    /// and unknown stages to `experimental`; only a missing `skill_id` fails.
    pub fn from_dict(data: &Value) -> Result<Self, ContractError> {
        let d = map_or_empty(Some(data));
        let skill_id = string_or(d.get("skill_id"), "");
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_METADATA_SCHEMA),
            title: string_or(d.get("title"), &skill_id),
            skill_id,
            description: string_or(d.get("description"), ""),
            safety_class: SafetyClass::parse_lenient(&string_or(d.get("safety_class"), "")),
            stage: Stage::parse_lenient(&string_or(d.get("stage"), "")),
            tags: string_list(d.get("tags")),
            topics: string_list(d.get("topics")),
            enabled: bool_or(d.get("enabled"), true),
            validation_policy: SkillValidationPolicy::from_dict(d.get("validation_policy")),
            extra: map_or_empty(d.get("extra")),
        }
        .validate()
    }
}

// ---------------------------------------------------------------------------
// SkillSpec
// ---------------------------------------------------------------------------

fn default_retry_policy() -> JsonMap {
    let mut map = JsonMap::new();
    map.insert("max_retries".to_string(), Value::from(0));
    map
}

/// Registry contract for a skill.
///
/// Created once at registration; afterwards only mutated by the registry's
/// controlled operations (promotion, enable/disable, metadata patch).
/// `skill_id` never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSpec {
    pub schema_version: String,
    pub skill_id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub input_schema: JsonMap,
    pub output_schema: JsonMap,
    pub safety_class: SafetyClass,
    pub timeout_ms: u64,
    pub retry_policy: JsonMap,
    pub status: Stage,
    pub tags: Vec<String>,
    pub metadata: JsonMap,
    pub topics: Vec<String>,
    pub enabled: bool,
    pub validation_policy: SkillValidationPolicy,
}

impl SkillSpec {
    /// A spec with sensible defaults (`0.1.0`, 5000 ms, `internal_safe`).
    pub fn new(skill_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema_version: SKILL_SPEC_SCHEMA.to_string(),
            skill_id: skill_id.into(),
            name: name.into(),
            version: "0.1.0".to_string(),
            description: String::new(),
            input_schema: JsonMap::new(),
            output_schema: JsonMap::new(),
            safety_class: SafetyClass::InternalSafe,
            timeout_ms: 5000,
            retry_policy: default_retry_policy(),
            status: Stage::Experimental,
            tags: Vec::new(),
            metadata: JsonMap::new(),
            topics: Vec::new(),
            enabled: true,
            validation_policy: SkillValidationPolicy::default(),
        }
    }

    pub fn validate(mut self) -> Result<Self, ContractError> {
        require_non_empty("skill_id", &self.skill_id)?;
        require_non_empty("name", &self.name)?;
        require_non_empty("version", &self.version)?;
        if self.timeout_ms < 1 {
            return Err(ContractError::BelowMinimum {
                field: "timeout_ms",
                min: 1,
                value: 0,
            });
        }
        self.tags = normalize_list(self.tags);
        self.topics = normalize_list(self.topics);
        self.validation_policy = self.validation_policy.validate();
        if self.retry_policy.is_empty() {
            self.retry_policy = default_retry_policy();
        } else if !self.retry_policy.contains_key("max_retries") {
            self.retry_policy
                .insert("max_retries".to_string(), Value::from(0));
        }
        Ok(self)
    }

    pub fn to_dict(&self) -> JsonMap {
        let value = json!({
            "schema_version": self.schema_version,
            "skill_id": self.skill_id,
            "name": self.name,
            "version": self.version,
            "description": self.description,
            "input_schema": self.input_schema,
            "output_schema": self.output_schema,
            "safety_class": self.safety_class.as_str(),
            "timeout_ms": self.timeout_ms,
            "retry_policy": self.retry_policy,
            "status": self.status.as_str(),
            "tags": self.tags,
            "metadata": self.metadata,
            "topics": self.topics,
            "enabled": self.enabled,
            "validation_policy": self.validation_policy.to_dict(),
        });
        into_map(value)
    }

    /// Strict on enums (unknown safety class or stage is an error), tolerant
    /// on everything else.
    pub fn from_dict(data: &Value) -> Result<Self, ContractError> {
        let d = map_or_empty(Some(data));
        let timeout = int_or(d.get("timeout_ms"), 5000);
        let timeout_ms = u64::try_from(timeout)
            .ok()
            .filter(|t| *t >= 1)
            .ok_or(ContractError::BelowMinimum {
                field: "timeout_ms",
                min: 1,
                value: timeout,
            })?;
        let retry_policy = map_or_empty(d.get("retry_policy"));
        Self {
            schema_version: string_or(d.get("schema_version"), SKILL_SPEC_SCHEMA),
            skill_id: string_or(d.get("skill_id"), ""),
            name: string_or(d.get("name"), ""),
            version: string_or(d.get("version"), "0.1.0"),
            description: string_or(d.get("description"), ""),
            input_schema: map_or_empty(d.get("input_schema")),
            output_schema: map_or_empty(d.get("output_schema")),
            safety_class: string_or(d.get("safety_class"), "internal_safe").parse()?,
            timeout_ms,
            retry_policy,
            status: string_or(d.get("status"), "experimental").parse()?,
            tags: string_list(d.get("tags")),
            metadata: map_or_empty(d.get("metadata")),
            topics: string_list(d.get("topics")),
            enabled: bool_or(d.get("enabled"), true),
            validation_policy: SkillValidationPolicy::from_dict(d.get("validation_policy")),
        }
        .validate()
    }

    /// Derive the normalized metadata view of this spec.
    ///
    /// Legacy safety labels are mapped onto the normalized vocabulary; the
    /// spec's version, timeout, retry policy and metadata keys land in
    /// `extra`.
    pub fn derive_metadata(&self) -> Result<SkillMetadata, ContractError> {
        let mut extra = JsonMap::new();
        extra.insert("skill_spec_version".to_string(), json!(self.version));
        extra.insert("timeout_ms".to_string(), json!(self.timeout_ms));
        extra.insert(
            "retry_policy".to_string(),
            Value::Object(self.retry_policy.clone()),
        );
        for (k, v) in &self.metadata {
            extra.insert(k.clone(), v.clone());
        }

        SkillMetadata {
            schema_version: SKILL_METADATA_SCHEMA.to_string(),
            skill_id: self.skill_id.clone(),
            title: self.name.clone(),
            description: self.description.clone(),
            safety_class: self.safety_class.normalized(),
            stage: self.status,
            tags: self.tags.clone(),
            topics: self.topics.clone(),
            enabled: self.enabled,
            validation_policy: self.validation_policy.clone(),
            extra,
        }
        .validate()
    }

    /// Copy the metadata-owned lifecycle fields onto this spec.
    pub fn sync_from_metadata(&mut self, meta: &SkillMetadata) {
        self.status = meta.stage;
        self.tags = meta.tags.clone();
        self.topics = meta.topics.clone();
        self.enabled = meta.enabled;
        self.validation_policy = meta.validation_policy.clone();
    }
}

pub(crate) fn into_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_spec() -> SkillSpec {
        let mut spec = SkillSpec::new("skill.echo_text", "Echo Text");
        spec.tags = vec!["test".to_string(), "  ".to_string(), " debug ".to_string()];
        spec.topics = vec!["general".to_string()];
        spec
    }

    #[test]
    fn safety_class_legacy_mapping() {
        assert_eq!(SafetyClass::InternalSafe.normalized(), SafetyClass::InternalState);
        assert_eq!(SafetyClass::ReadOnly.normalized(), SafetyClass::SafeRead);
        assert_eq!(
            SafetyClass::ExternalNetwork.normalized(),
            SafetyClass::ExternalSideEffect
        );
        assert_eq!(
            SafetyClass::SideEffecting.normalized(),
            SafetyClass::ExternalSideEffect
        );
        assert_eq!(
            SafetyClass::Restricted.normalized(),
            SafetyClass::ExternalSideEffect
        );
        for class in SafetyClass::ALL.iter().filter(|c| !c.is_legacy()) {
            assert_eq!(class.normalized(), *class);
        }
    }

    #[test]
    fn safety_class_parse_strict_and_lenient() {
        assert_eq!(
            "external_side_effect".parse::<SafetyClass>().unwrap(),
            SafetyClass::ExternalSideEffect
        );
        assert!(matches!(
            "dangerous".parse::<SafetyClass>(),
            Err(ContractError::UnknownSafetyClass(_))
        ));
        assert_eq!(SafetyClass::parse_lenient("dangerous"), SafetyClass::SafeRead);
    }

    #[test]
    fn safety_class_serde_uses_snake_case_labels() {
        let json = serde_json::to_string(&SafetyClass::ExternalSideEffect).unwrap();
        assert_eq!(json, "\"external_side_effect\"");
        for class in SafetyClass::ALL {
            let s = serde_json::to_value(class).unwrap();
            assert_eq!(s.as_str().unwrap(), class.as_str());
        }
    }

    #[test]
    fn stage_order_and_promotion_rule() {
        assert!(Stage::Experimental < Stage::Verified);
        assert!(Stage::Verified < Stage::Core);
        assert!(Stage::Experimental.can_promote_to(Stage::Experimental));
        assert!(Stage::Experimental.can_promote_to(Stage::Verified));
        assert!(!Stage::Experimental.can_promote_to(Stage::Core));
        assert!(!Stage::Core.can_promote_to(Stage::Verified));
        assert_eq!(Stage::Core.next(), None);
        assert!("beta".parse::<Stage>().is_err());
        assert_eq!(Stage::parse_lenient("beta"), Stage::Experimental);
    }

    #[test]
    fn policy_validate_clamps_ranges() {
        let policy = SkillValidationPolicy {
            min_success_rate: 1.7,
            max_avg_latency_ms: 0,
            min_sample_size: 0,
            required_output_keys: vec![" echo ".to_string(), "".to_string()],
            ..Default::default()
        }
        .validate();
        assert_eq!(policy.min_success_rate, 1.0);
        assert_eq!(policy.max_avg_latency_ms, 2000);
        assert_eq!(policy.min_sample_size, 1);
        assert_eq!(policy.required_output_keys, vec!["echo"]);
    }

    #[test]
    fn policy_from_dict_defaults_when_absent() {
        let policy = SkillValidationPolicy::from_dict(None);
        assert_eq!(policy, SkillValidationPolicy::default());

        let policy = SkillValidationPolicy::from_dict(Some(&json!({
            "min_success_rate": "0.5",
            "max_avg_latency_ms": -4,
            "min_sample_size": 10,
        })));
        assert_eq!(policy.min_success_rate, 0.5);
        assert_eq!(policy.max_avg_latency_ms, 2000);
        assert_eq!(policy.min_sample_size, 10);
    }

    #[test]
    fn spec_validate_normalizes_containers() {
        let mut spec = echo_spec();
        spec.retry_policy = JsonMap::new();
        let spec = spec.validate().unwrap();
        assert_eq!(spec.tags, vec!["test", "debug"]);
        assert_eq!(spec.retry_policy.get("max_retries"), Some(&json!(0)));
    }

    #[test]
    fn spec_rejects_empty_id_and_zero_timeout() {
        let err = SkillSpec::new("  ", "x").validate().unwrap_err();
        assert_eq!(err, ContractError::EmptyField { field: "skill_id" });

        let mut spec = echo_spec();
        spec.timeout_ms = 0;
        assert!(matches!(
            spec.validate(),
            Err(ContractError::BelowMinimum { field: "timeout_ms", .. })
        ));

        let err = SkillSpec::from_dict(&json!({
            "skill_id": "a", "name": "A", "timeout_ms": 0
        }))
        .unwrap_err();
        assert!(matches!(err, ContractError::BelowMinimum { value: 0, .. }));
    }

    #[test]
    fn spec_from_dict_rejects_unknown_enums() {
        let err = SkillSpec::from_dict(&json!({
            "skill_id": "a", "name": "A", "safety_class": "nuclear"
        }))
        .unwrap_err();
        assert_eq!(err, ContractError::UnknownSafetyClass("nuclear".to_string()));

        let err = SkillSpec::from_dict(&json!({
            "skill_id": "a", "name": "A", "status": "beta"
        }))
        .unwrap_err();
        assert_eq!(err, ContractError::UnknownStage("beta".to_string()));
    }

    #[test]
    fn spec_dict_roundtrip_preserves_schema_version() {
        let mut spec = echo_spec().validate().unwrap();
        spec.input_schema = into_map(json!({"type": "object"}));
        spec.metadata = into_map(json!({"owner": "runtime"}));
        let dict = Value::Object(spec.to_dict());
        assert_eq!(dict["schema_version"], "aion.skill_spec.v1");
        assert_eq!(SkillSpec::from_dict(&dict).unwrap(), spec);
    }

    #[test]
    fn metadata_from_dict_is_lenient() {
        let meta = SkillMetadata::from_dict(&json!({
            "skill_id": " skill.x ",
            "safety_class": "unheard_of",
            "stage": "gold",
            "tags": ["a", ""],
        }))
        .unwrap();
        assert_eq!(meta.skill_id, "skill.x");
        assert_eq!(meta.title, "skill.x");
        assert_eq!(meta.safety_class, SafetyClass::SafeRead);
        assert_eq!(meta.stage, Stage::Experimental);
        assert_eq!(meta.tags, vec!["a"]);
        assert!(meta.enabled);

        assert!(SkillMetadata::from_dict(&json!({"title": "no id"})).is_err());
    }

    #[test]
    fn metadata_dict_roundtrip() {
        let mut meta = SkillMetadata::new("skill.echo_text");
        meta.safety_class = SafetyClass::SafeTransform;
        meta.stage = Stage::Verified;
        meta.tags = vec!["debug".to_string()];
        let meta = meta.validate().unwrap();
        let back = SkillMetadata::from_dict(&Value::Object(meta.to_dict())).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn derive_metadata_normalizes_legacy_safety() {
        let mut spec = echo_spec().validate().unwrap();
        spec.safety_class = SafetyClass::ExternalNetwork;
        spec.metadata = into_map(json!({"owner": "ops"}));
        let meta = spec.derive_metadata().unwrap();
        assert_eq!(meta.safety_class, SafetyClass::ExternalSideEffect);
        assert_eq!(meta.title, "Echo Text");
        assert_eq!(meta.extra["timeout_ms"], json!(5000));
        assert_eq!(meta.extra["skill_spec_version"], json!("0.1.0"));
        assert_eq!(meta.extra["owner"], json!("ops"));
        assert_eq!(meta.tags, spec.tags);
    }

    #[test]
    fn sync_from_metadata_copies_lifecycle_fields() {
        let mut spec = echo_spec().validate().unwrap();
        let mut meta = spec.derive_metadata().unwrap();
        meta.stage = Stage::Core;
        meta.enabled = false;
        meta.topics = vec!["ops".to_string()];
        spec.sync_from_metadata(&meta);
        assert_eq!(spec.status, Stage::Core);
        assert!(!spec.enabled);
        assert_eq!(spec.topics, vec!["ops"]);
    }
}

//! Policy gate evaluated before every skill run.
//!
//! The gate reads the skill's normalized metadata and the request's policy
//! flags and either lets the run through or returns a [`DenyReason`]. The
//! adapter turns every deny into an `ok = false` result whose `error_code`
//! is [`DenyReason::code`].

use skillrt_types::run::SkillRunRequest;
use skillrt_types::skill::{SafetyClass, SkillMetadata, Stage};

/// Why a run was refused. The code emitted into results is a stable mapping
/// from the variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    /// No registry entry at all. The adapter looks the entry up before
    /// gating and reports a missing one as [`DenyReason::NotFound`].
    #[error("skill is not registered")]
    NotRegistered,

    #[error("skill is disabled")]
    Disabled,

    #[error("skill has external side effects and the request does not allow them")]
    ExternalBlocked,

    #[error("skill stage '{0}' is not verified")]
    StageNotVerified(Stage),

    #[error("skill not found or not enabled")]
    NotFound,

    #[error("invalid run request: {0}")]
    InvalidRequest(String),
}

impl DenyReason {
    /// The `error_code` placed on the run result.
    pub fn code(&self) -> String {
        match self {
            Self::NotRegistered => "skill_not_registered".to_string(),
            Self::Disabled => "skill_disabled".to_string(),
            Self::ExternalBlocked => "external_side_effect_not_allowed".to_string(),
            Self::StageNotVerified(stage) => format!("skill_stage_not_verified:{stage}"),
            Self::NotFound => "skill_not_found".to_string(),
            Self::InvalidRequest(_) => "invalid_request".to_string(),
        }
    }

    /// Whether the reason comes from the policy gate proper (as opposed to
    /// resolution or request validation).
    pub fn is_policy_gate(&self) -> bool {
        matches!(
            self,
            Self::NotRegistered | Self::Disabled | Self::ExternalBlocked | Self::StageNotVerified(_)
        )
    }
}

/// Evaluate the gate for `request` against the skill's metadata.
///
/// `None` metadata means the id is not registered. Checks run in order:
/// registration, enabled flag, external side effects, verified stage.
pub fn evaluate(metadata: Option<&SkillMetadata>, request: &SkillRunRequest) -> Result<(), DenyReason> {
    let Some(meta) = metadata else {
        return Err(DenyReason::NotRegistered);
    };
    if !meta.enabled {
        return Err(DenyReason::Disabled);
    }
    if meta.safety_class.normalized() == SafetyClass::ExternalSideEffect
        && !request.allows_external_side_effects()
    {
        return Err(DenyReason::ExternalBlocked);
    }
    if request.requires_verified_skill() && !meta.stage.is_verified_or_better() {
        return Err(DenyReason::StageNotVerified(meta.stage));
    }
    Ok(())
}

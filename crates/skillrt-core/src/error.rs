//! Error kinds raised by the registry, telemetry store and learning runtime.
//!
//! The execution adapter never returns these to its caller: contract and
//! policy failures become deny results, and observability failures are
//! logged and swallowed.

use skillrt_types::error::ContractError;
use skillrt_types::skill::Stage;
use thiserror::Error;

/// Errors from registry registration and mutation.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid contract: {0}")]
    Contract(#[from] ContractError),

    #[error("metadata.skill_id '{metadata}' must match spec.skill_id '{spec}'")]
    SkillIdMismatch { spec: String, metadata: String },

    #[error("skill '{0}' is not registered")]
    NotFound(String),
}

/// Reasons the registry refuses a stage change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromotionError {
    #[error("skill '{0}' is not registered")]
    UnknownSkill(String),

    #[error("cannot downgrade '{skill_id}' from {from} to {to}")]
    Downgrade {
        skill_id: String,
        from: Stage,
        to: Stage,
    },

    #[error("cannot skip ahead for '{skill_id}' from {from} to {to}")]
    SkipAhead {
        skill_id: String,
        from: Stage,
        to: Stage,
    },
}

/// Telemetry recording failures. Swallowed by the adapter.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid telemetry event: {0}")]
    Contract(#[from] ContractError),

    #[error("telemetry sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("telemetry serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Learning runtime failures. Swallowed by the adapter.
#[derive(Debug, Error)]
pub enum LearningError {
    #[error("learning store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("learning serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("learning runtime unavailable: {0}")]
    Unavailable(String),
}

use thiserror::Error;

/// Validation failure raised by a contract's `validate()` / `from_dict()`.
///
/// Upper layers (the execution adapter in particular) never surface this to
/// their callers; they turn it into a well-formed deny result instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("{field} must be a non-empty string")]
    EmptyField { field: &'static str },

    #[error("{field} must be >= {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: i64,
        value: i64,
    },

    #[error("unknown safety_class '{0}'")]
    UnknownSafetyClass(String),

    #[error("unknown stage '{0}' (expected one of: experimental, verified, core)")]
    UnknownStage(String),
}

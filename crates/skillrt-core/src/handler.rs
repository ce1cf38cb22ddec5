//! Skill handler trait.
//!
//! A handler is the callable body of a skill: it receives the request's
//! input mapping and returns a JSON value. Mappings become the run output
//! directly; any other value is wrapped as `{"result": value}` by the
//! execution adapter.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use skillrt_types::JsonMap;

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// Trait for skill bodies invoked by the execution adapter.
///
/// Handlers are synchronous. Errors and panics are both converted into a
/// `skill_execution_error` result; neither escapes the adapter.
pub trait SkillHandler: Send + Sync {
    /// Name recorded in the run trace as `handler_name`.
    fn name(&self) -> &str;

    /// Execute the skill against its inputs.
    fn handle(&self, inputs: JsonMap) -> anyhow::Result<Value>;
}

/// Shared handle stored by the registry.
pub type SharedSkillHandler = Arc<dyn SkillHandler>;

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// Wraps a closure as a named [`SkillHandler`].
pub struct FnSkillHandler<F> {
    name: String,
    func: F,
}

impl<F> FnSkillHandler<F>
where
    F: Fn(JsonMap) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> SkillHandler for FnSkillHandler<F>
where
    F: Fn(JsonMap) -> anyhow::Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, inputs: JsonMap) -> anyhow::Result<Value> {
        (self.func)(inputs)
    }
}

impl<F> fmt::Debug for FnSkillHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSkillHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Box a closure into a [`SharedSkillHandler`].
pub fn handler_fn<F>(name: impl Into<String>, func: F) -> SharedSkillHandler
where
    F: Fn(JsonMap) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnSkillHandler::new(name, func))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fn_handler_reports_name_and_runs_closure() {
        let handler = handler_fn("upper", |inputs: JsonMap| {
            let text = inputs
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(json!({ "text": text.to_uppercase() }))
        });
        assert_eq!(handler.name(), "upper");

        let mut inputs = JsonMap::new();
        inputs.insert("text".to_string(), json!("hi"));
        assert_eq!(handler.handle(inputs).unwrap(), json!({"text": "HI"}));
    }

    #[test]
    fn fn_handler_propagates_errors() {
        let handler = handler_fn("broken", |_| anyhow::bail!("boom"));
        let err = handler.handle(JsonMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}

//! Built-in demo skills used by smoke tests and fresh installs.

use serde_json::{Value, json};
use skillrt_types::JsonMap;
use skillrt_types::skill::{SafetyClass, SkillMetadata, Stage};
use tracing::info;

use crate::error::RegistryError;
use crate::globals::get_global_skill_registry;
use crate::handler::handler_fn;
use crate::registry::{SkillOptions, SkillRegistry};

pub const ECHO_TEXT_SKILL_ID: &str = "skill.echo_text";
pub const ROADMAP_PRIORITY_SKILL_ID: &str = "skill.aion_roadmap_priority";

const ROADMAP_PRIORITY_ORDER: [&str; 4] = [
    "response_quality_and_followup_handling",
    "planner_and_context_routing",
    "skill_runtime_registry_adapter",
    "learning_loop_integration",
];

fn text_input(inputs: &JsonMap, key: &str) -> Option<String> {
    match inputs.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// `{"echo": text, "length": chars}`; a missing `text` echoes `""`.
pub fn echo_text(inputs: JsonMap) -> anyhow::Result<Value> {
    let text = text_input(&inputs, "text").unwrap_or_default();
    let length = text.chars().count();
    Ok(json!({ "echo": text, "length": length }))
}

/// Fixed roadmap priority guidance for `topic` (default `AION roadmap`).
pub fn roadmap_priority(inputs: JsonMap) -> anyhow::Result<Value> {
    let topic = text_input(&inputs, "topic").unwrap_or_else(|| "AION roadmap".to_string());
    let summary = format!(
        "For {topic}, prioritize user-visible conversational quality first, \
         then strengthen routing/planning, then expand execution capability."
    );
    Ok(json!({
        "topic": topic,
        "priority_order": ROADMAP_PRIORITY_ORDER,
        "summary": summary,
    }))
}

fn object_schema(properties: Value, required: &[&str]) -> JsonMap {
    let mut schema = JsonMap::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), properties);
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    schema
}

fn demo_metadata(
    skill_id: &str,
    title: &str,
    description: &str,
    safety_class: SafetyClass,
    tags: &[&str],
    topics: &[&str],
) -> SkillMetadata {
    let mut meta = SkillMetadata::new(skill_id);
    meta.title = title.to_string();
    meta.description = description.to_string();
    meta.safety_class = safety_class;
    meta.stage = Stage::Experimental;
    meta.tags = tags.iter().map(|t| t.to_string()).collect();
    meta.topics = topics.iter().map(|t| t.to_string()).collect();
    meta
}

fn demo_options(metadata: SkillMetadata, input_schema: JsonMap) -> SkillOptions {
    let mut output_schema = JsonMap::new();
    output_schema.insert("type".to_string(), json!("object"));
    let mut retry_policy = JsonMap::new();
    retry_policy.insert("max_retries".to_string(), json!(0));
    SkillOptions {
        input_schema,
        output_schema,
        retry_policy,
        ..SkillOptions::default()
    }
    .with_metadata(metadata)
    .with_timeout_ms(1000)
    .with_spec_safety_class(SafetyClass::InternalSafe)
}

/// Register the demo skills into `registry` (the global registry when
/// `None`). Skills already present are left untouched, so repeated calls
/// are idempotent. Returns how many skills were newly registered.
pub fn register_builtin_demo_skills(registry: Option<&SkillRegistry>) -> Result<usize, RegistryError> {
    match registry {
        Some(registry) => register_into(registry),
        None => register_into(&get_global_skill_registry()),
    }
}

fn register_into(registry: &SkillRegistry) -> Result<usize, RegistryError> {
    let mut registered = 0;

    if !registry.has(ECHO_TEXT_SKILL_ID) {
        let metadata = demo_metadata(
            ECHO_TEXT_SKILL_ID,
            "Echo Text",
            "Echoes input text for testing adapter/telemetry plumbing.",
            SafetyClass::SafeTransform,
            &["test", "debug"],
            &["general", "testing", "utilities"],
        );
        let input_schema = object_schema(json!({"text": {"type": "string"}}), &["text"]);
        registry.register_skill(
            ECHO_TEXT_SKILL_ID,
            handler_fn("echo_text", echo_text),
            demo_options(metadata, input_schema),
        )?;
        registered += 1;
    }

    if !registry.has(ROADMAP_PRIORITY_SKILL_ID) {
        let metadata = demo_metadata(
            ROADMAP_PRIORITY_SKILL_ID,
            "AION Roadmap Priority",
            "Returns deterministic roadmap prioritization guidance for AION.",
            SafetyClass::SafeRead,
            &["aion", "roadmap", "planning"],
            &["AION roadmap", "planning", "aion", "roadmap"],
        );
        let input_schema = object_schema(json!({"topic": {"type": "string"}}), &[]);
        registry.register_skill(
            ROADMAP_PRIORITY_SKILL_ID,
            handler_fn("roadmap_priority", roadmap_priority),
            demo_options(metadata, input_schema),
        )?;
        registered += 1;
    }

    if registered > 0 {
        info!(registered, "built-in demo skills registered");
    }
    Ok(registered)
}

//! Wire a complete skill runtime from configuration.

use std::path::Path;
use std::sync::Arc;

use skillrt_core::adapter::SkillExecutionAdapter;
use skillrt_core::demo::register_builtin_demo_skills;
use skillrt_core::error::RegistryError;
use skillrt_core::harness::ValidationHarness;
use skillrt_core::learning::{LearningRuntime, NoopLearningRuntime};
use skillrt_core::registry::SkillRegistry;
use skillrt_core::telemetry::SkillTelemetryStore;
use skillrt_types::config::RuntimeConfig;
use thiserror::Error;

use crate::config::{load_runtime_config, resolve_path};
use crate::learning::JsonlLearningRuntime;
use crate::telemetry::JsonlTelemetrySink;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to open telemetry log {path}: {source}")]
    TelemetryLog {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register built-in skills: {0}")]
    DemoSkills(#[from] RegistryError),
}

/// The shared components of one runtime instance.
pub struct SkillRuntime {
    pub registry: Arc<SkillRegistry>,
    pub telemetry: Arc<SkillTelemetryStore>,
    pub learning: Arc<dyn LearningRuntime>,
    pub adapter: SkillExecutionAdapter,
}

impl SkillRuntime {
    /// A validation harness over a fresh adapter sharing this runtime's
    /// registry, telemetry and learning components.
    pub fn harness(&self) -> ValidationHarness {
        ValidationHarness::new(SkillExecutionAdapter::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.telemetry),
            Arc::clone(&self.learning),
        ))
    }
}

/// Build a runtime rooted at `data_dir`.
///
/// The telemetry store gets a JSONL sink when `telemetry.jsonl_path` is
/// set. Learning is JSONL-backed when enabled and a no-op otherwise.
pub fn build_runtime(data_dir: &Path, config: &RuntimeConfig) -> Result<SkillRuntime, BootstrapError> {
    let registry = Arc::new(SkillRegistry::new());
    let max_events = config.telemetry.effective_max_events();

    let telemetry = match &config.telemetry.jsonl_path {
        Some(path) => {
            let path = resolve_path(data_dir, path);
            let sink = JsonlTelemetrySink::open(&path).map_err(|source| BootstrapError::TelemetryLog {
                path: path.display().to_string(),
                source,
            })?;
            Arc::new(SkillTelemetryStore::with_sink(max_events, Arc::new(sink)))
        }
        None => Arc::new(SkillTelemetryStore::new(max_events)),
    };

    let learning: Arc<dyn LearningRuntime> = if config.learning.enabled {
        Arc::new(JsonlLearningRuntime::from_config(data_dir, &config.learning))
    } else {
        Arc::new(NoopLearningRuntime)
    };

    if config.demo.register_builtin_skills {
        let added = register_builtin_demo_skills(Some(&registry))?;
        tracing::debug!(added, "built-in demo skills registered");
    }

    let adapter = SkillExecutionAdapter::new(
        Arc::clone(&registry),
        Arc::clone(&telemetry),
        Arc::clone(&learning),
    );
    tracing::info!(
        data_dir = %data_dir.display(),
        skills = registry.len(),
        max_events,
        learning = config.learning.enabled,
        "skill runtime ready"
    );

    Ok(SkillRuntime {
        registry,
        telemetry,
        learning,
        adapter,
    })
}

/// Load `{data_dir}/config.toml` and build the runtime it describes.
pub async fn bootstrap(data_dir: &Path) -> Result<SkillRuntime, BootstrapError> {
    let config = load_runtime_config(data_dir).await;
    build_runtime(data_dir, &config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use serde_json::json;
    use skillrt_core::demo::ECHO_TEXT_SKILL_ID;
    use skillrt_types::JsonMap;
    use skillrt_types::learning::LearningQuery;
    use skillrt_types::run::SkillRunRequest;
    use tempfile::TempDir;

    use crate::learning::read_learning_log;
    use crate::telemetry::read_telemetry_log;

    fn echo_request() -> SkillRunRequest {
        let mut inputs = JsonMap::new();
        inputs.insert("text".to_string(), json!("hi"));
        SkillRunRequest::new(ECHO_TEXT_SKILL_ID, inputs)
    }

    #[tokio::test]
    async fn bootstrap_with_defaults_registers_demo_skills() {
        let tmp = TempDir::new().unwrap();
        let runtime = bootstrap(tmp.path()).await.unwrap();
        assert_eq!(runtime.registry.len(), 2);
        assert_eq!(runtime.telemetry.max_events(), 5000);

        let result = runtime.adapter.run(echo_request());
        assert!(result.ok);
        let events = read_learning_log(&tmp.path().join("learning/aion_learning_events.jsonl")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].skill_run_id, result.skill_run_id);
        assert!(tmp.path().join("learning/aion_weakness_signals.json").exists());
    }

    #[tokio::test]
    async fn configured_telemetry_log_receives_every_run() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[telemetry]
max_events = 1
jsonl_path = "telemetry/skill_telemetry.jsonl"

[learning]
enabled = false
"#,
        )
        .await
        .unwrap();

        let runtime = bootstrap(tmp.path()).await.unwrap();
        runtime.adapter.run(echo_request());
        let denied = runtime
            .adapter
            .run(SkillRunRequest::new("skill.absent", JsonMap::new()));

        assert_eq!(runtime.telemetry.len(), 1);
        let persisted =
            read_telemetry_log(&tmp.path().join("telemetry/skill_telemetry.jsonl")).unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(
            Some(persisted[1].telemetry_id.clone()),
            denied.telemetry_ref
        );
        assert!(!tmp.path().join("learning").exists());
    }

    #[test]
    fn demo_registration_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        let mut config = RuntimeConfig::default();
        config.demo.register_builtin_skills = false;
        config.learning.enabled = false;
        let runtime = build_runtime(tmp.path(), &config).unwrap();
        assert!(runtime.registry.is_empty());

        let result = runtime.adapter.run(echo_request());
        assert_eq!(result.error_code.as_deref(), Some("skill_not_found"));
    }

    #[test]
    fn harness_shares_runtime_components() {
        let tmp = TempDir::new().unwrap();
        let config = RuntimeConfig::default();
        let runtime = build_runtime(tmp.path(), &config).unwrap();
        let harness = runtime.harness();

        let mut case = skillrt_types::validation::SkillValidationCase::new("case-1", ECHO_TEXT_SKILL_ID);
        case.request.insert("inputs".to_string(), json!({"text": "hi"}));
        let scored = harness.run_case(&case).unwrap();
        assert!(scored.ok);
        assert_eq!(runtime.telemetry.len(), 1);

        let learning = JsonlLearningRuntime::from_config(tmp.path(), &config.learning);
        assert_eq!(learning.query_events(&LearningQuery::default()).unwrap().len(), 1);
    }

    #[test]
    fn unopenable_telemetry_log_is_reported() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"file, not dir").unwrap();
        let mut config = RuntimeConfig::default();
        config.telemetry.jsonl_path = Some(PathBuf::from("blocker/telemetry.jsonl"));
        config.learning.enabled = false;

        let err = build_runtime(tmp.path(), &config).err().unwrap();
        assert!(matches!(err, BootstrapError::TelemetryLog { .. }));
    }
}

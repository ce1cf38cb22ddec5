//! Process-wide default instances.
//!
//! Adapters built with [`crate::adapter::SkillExecutionAdapter::with_globals`]
//! share these. Everything that uses them also accepts injected instances,
//! so tests construct their own.

use std::sync::{Arc, OnceLock};

use crate::learning::{InMemoryLearningRuntime, LearningRuntime};
use crate::registry::SkillRegistry;
use crate::telemetry::SkillTelemetryStore;

static GLOBAL_REGISTRY: OnceLock<Arc<SkillRegistry>> = OnceLock::new();
static GLOBAL_TELEMETRY: OnceLock<Arc<SkillTelemetryStore>> = OnceLock::new();
static GLOBAL_LEARNING: OnceLock<Arc<InMemoryLearningRuntime>> = OnceLock::new();

pub fn get_global_skill_registry() -> Arc<SkillRegistry> {
    Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(SkillRegistry::new())))
}

pub fn get_global_skill_telemetry() -> Arc<SkillTelemetryStore> {
    Arc::clone(GLOBAL_TELEMETRY.get_or_init(|| Arc::new(SkillTelemetryStore::default())))
}

/// The process-wide in-memory learning runtime.
pub fn get_global_learning_runtime() -> Arc<InMemoryLearningRuntime> {
    Arc::clone(GLOBAL_LEARNING.get_or_init(|| Arc::new(InMemoryLearningRuntime::default())))
}

/// [`get_global_learning_runtime`] behind the port trait.
pub fn get_global_learning_port() -> Arc<dyn LearningRuntime> {
    get_global_learning_runtime()
}

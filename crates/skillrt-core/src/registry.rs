//! In-process skill registry.
//!
//! The registry is the authoritative table `skill_id -> (spec, metadata,
//! handler)`. Registration is the only way a skill becomes executable and
//! resolution is the only way the execution adapter obtains a handler.
//!
//! Entries are stored behind `Arc` and never mutated in place: every
//! mutation clones the current pair, applies the change, re-syncs the spec
//! from the metadata and swaps the new entry in under the write lock.
//! Readers therefore always observe a consistent `(spec, metadata)` pair.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use skillrt_types::JsonMap;
use skillrt_types::error::ContractError;
use skillrt_types::skill::{
    SKILL_METADATA_SCHEMA, SafetyClass, SkillMetadata, SkillSpec, SkillValidationPolicy, Stage,
};
use tracing::{debug, info};

use crate::error::{PromotionError, RegistryError};
use crate::handler::SharedSkillHandler;

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One registered skill.
#[derive(Clone)]
pub struct RegistryEntry {
    pub spec: SkillSpec,
    pub metadata: SkillMetadata,
    pub handler: SharedSkillHandler,
}

impl RegistryEntry {
    /// A copy of this entry carrying `metadata`, with the spec re-synced.
    fn with_metadata(&self, metadata: SkillMetadata) -> RegistryEntry {
        let mut spec = self.spec.clone();
        spec.sync_from_metadata(&metadata);
        RegistryEntry {
            spec,
            metadata,
            handler: Arc::clone(&self.handler),
        }
    }

    fn sort_key(&self) -> (u8, &str) {
        (self.metadata.stage.rank(), self.spec.skill_id.as_str())
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("spec", &self.spec)
            .field("metadata", &self.metadata)
            .field("handler", &self.handler.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Filters, options and patches
// ---------------------------------------------------------------------------

/// Filter for the `list_*` operations. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillFilter {
    pub stage: Option<Stage>,
    pub tag: Option<String>,
    pub topic: Option<String>,
    pub enabled_only: bool,
}

impl SkillFilter {
    pub fn enabled_only() -> Self {
        Self {
            enabled_only: true,
            ..Self::default()
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn matches(&self, meta: &SkillMetadata) -> bool {
        if self.enabled_only && !meta.enabled {
            return false;
        }
        if self.stage.is_some_and(|stage| stage != meta.stage) {
            return false;
        }
        if let Some(tag) = self.tag.as_deref()
            && !meta.tags.iter().any(|t| t == tag)
        {
            return false;
        }
        if let Some(topic) = self.topic.as_deref()
            && !meta.topics.iter().any(|t| t == topic)
        {
            return false;
        }
        true
    }
}

/// Keyword arguments for [`SkillRegistry::register_skill`].
///
/// When `metadata` is set it wins over the metadata-shaped fields (title,
/// description, safety class, stage, tags, topics, enabled, validation
/// policy, extra). The spec-shaped fields always apply.
#[derive(Debug, Clone)]
pub struct SkillOptions {
    pub metadata: Option<SkillMetadata>,
    pub title: String,
    pub description: String,
    pub safety_class: SafetyClass,
    pub stage: Stage,
    pub tags: Vec<String>,
    pub topics: Vec<String>,
    pub enabled: bool,
    pub validation_policy: SkillValidationPolicy,
    pub extra: JsonMap,
    pub version: String,
    pub input_schema: JsonMap,
    pub output_schema: JsonMap,
    /// Safety label stored on the spec (may be a legacy label).
    pub spec_safety_class: SafetyClass,
    pub timeout_ms: u64,
    pub retry_policy: JsonMap,
    pub spec_metadata: JsonMap,
}

impl Default for SkillOptions {
    fn default() -> Self {
        Self {
            metadata: None,
            title: String::new(),
            description: String::new(),
            safety_class: SafetyClass::SafeRead,
            stage: Stage::Experimental,
            tags: Vec::new(),
            topics: Vec::new(),
            enabled: true,
            validation_policy: SkillValidationPolicy::default(),
            extra: JsonMap::new(),
            version: "0.1.0".to_string(),
            input_schema: JsonMap::new(),
            output_schema: JsonMap::new(),
            spec_safety_class: SafetyClass::InternalSafe,
            timeout_ms: 5000,
            retry_policy: JsonMap::new(),
            spec_metadata: JsonMap::new(),
        }
    }
}

impl SkillOptions {
    pub fn with_metadata(mut self, metadata: SkillMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_spec_safety_class(mut self, safety_class: SafetyClass) -> Self {
        self.spec_safety_class = safety_class;
        self
    }

    fn build_metadata(&self, skill_id: &str) -> SkillMetadata {
        SkillMetadata {
            schema_version: SKILL_METADATA_SCHEMA.to_string(),
            skill_id: skill_id.to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            safety_class: self.safety_class,
            stage: self.stage,
            tags: self.tags.clone(),
            topics: self.topics.clone(),
            enabled: self.enabled,
            validation_policy: self.validation_policy.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Typed metadata patch for [`SkillRegistry::update_metadata`].
///
/// Stage is deliberately absent: stage changes go through
/// [`SkillRegistry::promote`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// New gate-facing class, normalized on apply. Only the metadata label
    /// changes: `spec.safety_class`, which success results report, keeps the
    /// label the skill was registered with.
    pub safety_class: Option<SafetyClass>,
    pub tags: Option<Vec<String>>,
    pub topics: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub validation_policy: Option<SkillValidationPolicy>,
    /// Keys merged into `extra`; existing keys are overwritten.
    pub extra: Option<JsonMap>,
}

impl MetadataPatch {
    fn apply(self, mut meta: SkillMetadata) -> SkillMetadata {
        if let Some(title) = self.title {
            meta.title = title;
        }
        if let Some(description) = self.description {
            meta.description = description;
        }
        if let Some(class) = self.safety_class {
            meta.safety_class = class.normalized();
        }
        if let Some(tags) = self.tags {
            meta.tags = tags;
        }
        if let Some(topics) = self.topics {
            meta.topics = topics;
        }
        if let Some(enabled) = self.enabled {
            meta.enabled = enabled;
        }
        if let Some(policy) = self.validation_policy {
            meta.validation_policy = policy;
        }
        if let Some(extra) = self.extra {
            meta.extra.extend(extra);
        }
        meta
    }
}

// ---------------------------------------------------------------------------
// Introspection records
// ---------------------------------------------------------------------------

/// Full dump of the registry for admin views and smoke tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub count: usize,
    pub enabled_count: usize,
    pub skills: Vec<JsonMap>,
    pub metadata: Vec<JsonMap>,
}

/// Counts by enabled flag, stage and safety class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total_skills: usize,
    pub enabled_skills: usize,
    pub disabled_skills: usize,
    pub by_stage: BTreeMap<String, usize>,
    pub by_safety_class: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Thread-safe skill table. Mutations are serialised by the write lock.
#[derive(Default)]
pub struct SkillRegistry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
}

impl fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.read().len())
            .finish()
    }
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: entries are replaced whole, never edited in place.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<RegistryEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<RegistryEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `spec` with `handler`.
    ///
    /// Without explicit metadata, the normalized view is derived from the
    /// spec (legacy safety labels mapped onto the normalized vocabulary).
    /// The spec is then re-synced from the metadata. An existing entry with
    /// the same id is replaced.
    pub fn register(
        &self,
        spec: SkillSpec,
        handler: SharedSkillHandler,
        metadata: Option<SkillMetadata>,
    ) -> Result<SkillSpec, RegistryError> {
        let mut spec = spec.validate()?;
        let mut metadata = match metadata {
            Some(meta) => meta.validate()?,
            None => spec.derive_metadata()?,
        };
        if metadata.skill_id != spec.skill_id {
            return Err(RegistryError::SkillIdMismatch {
                spec: spec.skill_id,
                metadata: metadata.skill_id,
            });
        }
        metadata.safety_class = metadata.safety_class.normalized();
        spec.sync_from_metadata(&metadata);

        let entry = Arc::new(RegistryEntry {
            spec: spec.clone(),
            metadata,
            handler,
        });
        let replaced = self
            .write()
            .insert(spec.skill_id.clone(), entry)
            .is_some();
        debug!(
            skill_id = %spec.skill_id,
            stage = %spec.status,
            replaced,
            "skill registered"
        );
        Ok(spec)
    }

    /// Build a minimal spec from `options` and register it.
    pub fn register_skill(
        &self,
        skill_id: &str,
        handler: SharedSkillHandler,
        options: SkillOptions,
    ) -> Result<SkillSpec, RegistryError> {
        let skill_id = skill_id.trim();
        if skill_id.is_empty() {
            return Err(ContractError::EmptyField { field: "skill_id" }.into());
        }
        let metadata = match &options.metadata {
            Some(meta) => meta.clone(),
            None => options.build_metadata(skill_id),
        }
        .validate()?;

        let mut spec = SkillSpec::new(skill_id, metadata.title.clone());
        spec.version = options.version;
        spec.description = metadata.description.clone();
        spec.input_schema = options.input_schema;
        spec.output_schema = options.output_schema;
        spec.safety_class = options.spec_safety_class;
        spec.timeout_ms = options.timeout_ms;
        spec.retry_policy = options.retry_policy;
        spec.metadata = options.spec_metadata;
        spec.sync_from_metadata(&metadata);

        self.register(spec, handler, Some(metadata))
    }

    /// Remove a skill. Returns whether it was present.
    pub fn unregister(&self, skill_id: &str) -> bool {
        let removed = self.write().remove(skill_id).is_some();
        if removed {
            info!(skill_id, "skill unregistered");
        }
        removed
    }

    pub fn has(&self, skill_id: &str) -> bool {
        self.read().contains_key(skill_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get_spec(&self, skill_id: &str) -> Option<SkillSpec> {
        self.read().get(skill_id).map(|e| e.spec.clone())
    }

    pub fn get_metadata(&self, skill_id: &str) -> Option<SkillMetadata> {
        self.read().get(skill_id).map(|e| e.metadata.clone())
    }

    /// The handler, only if the skill is enabled.
    pub fn get_handler(&self, skill_id: &str) -> Option<SharedSkillHandler> {
        self.read()
            .get(skill_id)
            .filter(|e| e.metadata.enabled)
            .map(|e| Arc::clone(&e.handler))
    }

    /// The handler regardless of the enabled flag (admin use).
    pub fn get_handler_raw(&self, skill_id: &str) -> Option<SharedSkillHandler> {
        self.read().get(skill_id).map(|e| Arc::clone(&e.handler))
    }

    /// The current entry regardless of the enabled flag. Spec, metadata and
    /// handler in the returned snapshot always belong together.
    pub fn get_entry(&self, skill_id: &str) -> Option<Arc<RegistryEntry>> {
        self.read().get(skill_id).map(Arc::clone)
    }

    /// `(spec, handler)` when the skill exists and is enabled.
    pub fn resolve(&self, skill_id: &str) -> Option<(SkillSpec, SharedSkillHandler)> {
        self.resolve_with_metadata(skill_id)
            .map(|e| (e.spec.clone(), Arc::clone(&e.handler)))
    }

    /// The whole entry when the skill exists and is enabled.
    pub fn resolve_with_metadata(&self, skill_id: &str) -> Option<Arc<RegistryEntry>> {
        self.read()
            .get(skill_id)
            .filter(|e| e.metadata.enabled)
            .map(Arc::clone)
    }

    /// Matching entries sorted by `(stage rank, skill_id)`.
    fn filtered(&self, filter: &SkillFilter) -> Vec<Arc<RegistryEntry>> {
        let mut entries: Vec<Arc<RegistryEntry>> = self
            .read()
            .values()
            .filter(|e| filter.matches(&e.metadata))
            .map(Arc::clone)
            .collect();
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        entries
    }

    pub fn list_specs(&self, filter: &SkillFilter) -> Vec<SkillSpec> {
        self.filtered(filter)
            .iter()
            .map(|e| e.spec.clone())
            .collect()
    }

    pub fn list_skill_ids(&self, filter: &SkillFilter) -> Vec<String> {
        self.filtered(filter)
            .iter()
            .map(|e| e.spec.skill_id.clone())
            .collect()
    }

    pub fn list_metadata(&self, filter: &SkillFilter) -> Vec<SkillMetadata> {
        self.filtered(filter)
            .iter()
            .map(|e| e.metadata.clone())
            .collect()
    }

    /// Flip the enabled flag. Returns `false` for unknown skills.
    pub fn set_enabled(&self, skill_id: &str, enabled: bool) -> bool {
        let mut entries = self.write();
        let Some(current) = entries.get(skill_id) else {
            return false;
        };
        let mut metadata = current.metadata.clone();
        metadata.enabled = enabled;
        let next = Arc::new(current.with_metadata(metadata));
        entries.insert(skill_id.to_string(), next);
        info!(skill_id, enabled, "skill enabled flag changed");
        true
    }

    /// Move a skill to `target`.
    ///
    /// Accepted iff `target` is the current stage (no-op) or the next one.
    /// Returns the stage the skill is at afterwards.
    pub fn promote(&self, skill_id: &str, target: Stage) -> Result<Stage, PromotionError> {
        let mut entries = self.write();
        let current = entries
            .get(skill_id)
            .ok_or_else(|| PromotionError::UnknownSkill(skill_id.to_string()))?;
        let from = current.metadata.stage;
        if !from.can_promote_to(target) {
            let skill_id = skill_id.to_string();
            let err = if target.rank() < from.rank() {
                PromotionError::Downgrade {
                    skill_id,
                    from,
                    to: target,
                }
            } else {
                PromotionError::SkipAhead {
                    skill_id,
                    from,
                    to: target,
                }
            };
            debug!(error = %err, "promotion rejected");
            return Err(err);
        }
        if from == target {
            return Ok(from);
        }

        let mut metadata = current.metadata.clone();
        metadata.stage = target;
        let next = Arc::new(current.with_metadata(metadata));
        entries.insert(skill_id.to_string(), next);
        info!(skill_id, from = %from, to = %target, "skill promoted");
        Ok(target)
    }

    /// Patch metadata fields, re-validate and re-sync the spec.
    pub fn update_metadata(
        &self,
        skill_id: &str,
        patch: MetadataPatch,
    ) -> Result<SkillMetadata, RegistryError> {
        let mut entries = self.write();
        let current = entries
            .get(skill_id)
            .ok_or_else(|| RegistryError::NotFound(skill_id.to_string()))?;
        let metadata = patch.apply(current.metadata.clone()).validate()?;
        let next = Arc::new(current.with_metadata(metadata.clone()));
        entries.insert(skill_id.to_string(), next);
        debug!(skill_id, "skill metadata updated");
        Ok(metadata)
    }

    pub fn to_snapshot(&self) -> RegistrySnapshot {
        let entries = self.filtered(&SkillFilter::default());
        RegistrySnapshot {
            count: entries.len(),
            enabled_count: entries.iter().filter(|e| e.metadata.enabled).count(),
            skills: entries.iter().map(|e| e.spec.to_dict()).collect(),
            metadata: entries.iter().map(|e| e.metadata.to_dict()).collect(),
        }
    }

    pub fn telemetry_summary(&self) -> RegistrySummary {
        let entries = self.read();
        let mut by_stage: BTreeMap<String, usize> = Stage::ALL
            .iter()
            .map(|stage| (stage.as_str().to_string(), 0))
            .collect();
        let mut by_safety_class: BTreeMap<String, usize> = BTreeMap::new();
        let mut enabled = 0;
        for entry in entries.values() {
            *by_stage
                .entry(entry.metadata.stage.as_str().to_string())
                .or_default() += 1;
            *by_safety_class
                .entry(entry.metadata.safety_class.as_str().to_string())
                .or_default() += 1;
            if entry.metadata.enabled {
                enabled += 1;
            }
        }
        RegistrySummary {
            total_skills: entries.len(),
            enabled_skills: enabled,
            disabled_skills: entries.len() - enabled,
            by_stage,
            by_safety_class,
        }
    }
}

//! Governed skill execution.
//!
//! [`SkillExecutionAdapter::run`] is the only correct way to execute a
//! skill. Each run passes through the same pipeline:
//!
//! 1. request validation and run id allocation,
//! 2. one registry lookup, taking a snapshot of the skill's entry,
//! 3. the policy gate ([`crate::policy::evaluate`]) on that snapshot's
//!    metadata,
//! 4. the dry-run or live path, from the same snapshot,
//! 5. finalization: one telemetry event, then one learning event.
//!
//! `run` never fails. Contract and policy problems become `ok = false`
//! results with an error code; telemetry and learning failures, panics
//! included, are logged and otherwise ignored.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use skillrt_types::learning::LearningEventInput;
use skillrt_types::run::{SkillRunRequest, SkillRunResult};
use skillrt_types::skill::{SafetyClass, Stage};
use skillrt_types::{JsonMap, prefixed_id};
use tracing::{debug, debug_span, warn};

use crate::globals::{get_global_learning_port, get_global_skill_registry, get_global_skill_telemetry};
use crate::learning::LearningRuntime;
use crate::policy::{self, DenyReason};
use crate::registry::{RegistryEntry, SkillRegistry};
use crate::telemetry::{SkillTelemetryStore, TelemetryDraft};

/// Value of the `adapter` key in every run trace.
pub const ADAPTER_NAME: &str = "SkillExecutionAdapter";

/// Skill id recorded when a request arrives without one.
const UNKNOWN_SKILL_ID: &str = "unknown_skill";

/// Pipeline stage that produced a result, recorded as the trace `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Validate,
    PolicyGate,
    Resolve,
    DryRun,
    Execute,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Validate => "validate",
            Phase::PolicyGate => "policy_gate",
            Phase::Resolve => "resolve",
            Phase::DryRun => "dry_run",
            Phase::Execute => "execute",
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn base_trace(phase: Phase, dry_run: bool) -> JsonMap {
    let mut trace = JsonMap::new();
    trace.insert("adapter".to_string(), json!(ADAPTER_NAME));
    trace.insert("phase".to_string(), json!(phase.as_str()));
    trace.insert("dry_run".to_string(), json!(dry_run));
    trace
}

fn panic_message(what: &str, payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("{what} panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("{what} panicked: {msg}")
    } else {
        format!("{what} panicked")
    }
}

/// Runs skills from a shared [`SkillRegistry`], recording every outcome in a
/// [`SkillTelemetryStore`] and a [`LearningRuntime`].
///
/// Cheap to construct; all three components are shared handles, so several
/// adapters (or threads calling one adapter) see the same skills and
/// telemetry.
pub struct SkillExecutionAdapter {
    registry: Arc<SkillRegistry>,
    telemetry: Arc<SkillTelemetryStore>,
    learning: Arc<dyn LearningRuntime>,
}

impl SkillExecutionAdapter {
    pub fn new(
        registry: Arc<SkillRegistry>,
        telemetry: Arc<SkillTelemetryStore>,
        learning: Arc<dyn LearningRuntime>,
    ) -> Self {
        Self {
            registry,
            telemetry,
            learning,
        }
    }

    /// An adapter over the process-wide registry, telemetry store and
    /// learning runtime.
    pub fn with_globals() -> Self {
        Self::new(
            get_global_skill_registry(),
            get_global_skill_telemetry(),
            get_global_learning_port(),
        )
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    pub fn telemetry(&self) -> &Arc<SkillTelemetryStore> {
        &self.telemetry
    }

    /// Execute one request. Always returns a fully formed result.
    pub fn run(&self, request: SkillRunRequest) -> SkillRunResult {
        let started = Instant::now();
        let skill_run_id = prefixed_id("skillrun");
        let span = debug_span!(
            "skill_run",
            skill_id = %request.skill_id,
            skill_run_id = %skill_run_id,
        );
        let _enter = span.enter();

        let request = match request.clone().validate() {
            Ok(valid) => valid,
            Err(err) => {
                let reason = DenyReason::InvalidRequest(err.to_string());
                return self.deny(&request, skill_run_id, started, reason, None, Phase::Validate);
            }
        };

        let Some(entry) = self.registry.get_entry(&request.skill_id) else {
            return self.deny(
                &request,
                skill_run_id,
                started,
                DenyReason::NotFound,
                None,
                Phase::Resolve,
            );
        };
        self.run_entry(&request, &entry, skill_run_id, started)
    }

    /// Gate and run `request` against one registry snapshot. Later registry
    /// writes do not affect a run that already holds its entry.
    fn run_entry(
        &self,
        request: &SkillRunRequest,
        entry: &RegistryEntry,
        skill_run_id: String,
        started: Instant,
    ) -> SkillRunResult {
        if let Err(reason) = policy::evaluate(Some(&entry.metadata), request) {
            let classifiers = (entry.metadata.safety_class, entry.metadata.stage);
            return self.deny(
                request,
                skill_run_id,
                started,
                reason,
                Some(classifiers),
                Phase::PolicyGate,
            );
        }

        let result = if request.dry_run {
            self.dry_run(request, entry, skill_run_id, started)
        } else {
            self.execute(request, entry, skill_run_id, started)
        };
        let mut extra = JsonMap::new();
        if request.dry_run {
            extra.insert("dry_run".to_string(), json!(true));
        }
        self.finalize(request, result, extra)
    }

    fn success_shell(
        &self,
        request: &SkillRunRequest,
        entry: &RegistryEntry,
        skill_run_id: String,
        phase: Phase,
    ) -> SkillRunResult {
        let timeout_ms = request.timeout_ms_override.unwrap_or(entry.spec.timeout_ms);
        let mut result = SkillRunResult::new(entry.spec.skill_id.clone(), skill_run_id);
        result.safety_class = entry.spec.safety_class;
        result.status = entry.spec.status;
        result.trace = base_trace(phase, request.dry_run);
        result
            .trace
            .insert("handler_name".to_string(), json!(entry.handler.name()));
        result
            .trace
            .insert("timeout_ms".to_string(), json!(timeout_ms));
        result
            .metadata
            .insert("request_id".to_string(), json!(request.request_id));
        result
    }

    fn dry_run(
        &self,
        request: &SkillRunRequest,
        entry: &RegistryEntry,
        skill_run_id: String,
        started: Instant,
    ) -> SkillRunResult {
        let timeout_ms = request.timeout_ms_override.unwrap_or(entry.spec.timeout_ms);
        let mut input_keys: Vec<&String> = request.inputs.keys().collect();
        input_keys.sort();

        let mut result = self.success_shell(request, entry, skill_run_id, Phase::DryRun);
        result.ok = true;
        result.output.insert("dry_run".to_string(), json!(true));
        result
            .output
            .insert("would_execute".to_string(), json!(entry.spec.skill_id));
        result
            .output
            .insert("timeout_ms".to_string(), json!(timeout_ms));
        result
            .output
            .insert("input_keys".to_string(), json!(input_keys));
        result.latency_ms = elapsed_ms(started);
        result
    }

    fn execute(
        &self,
        request: &SkillRunRequest,
        entry: &RegistryEntry,
        skill_run_id: String,
        started: Instant,
    ) -> SkillRunResult {
        let handler = Arc::clone(&entry.handler);
        let inputs = request.inputs.clone();
        let outcome = catch_unwind(AssertUnwindSafe(move || handler.handle(inputs)));

        let mut result = self.success_shell(request, entry, skill_run_id, Phase::Execute);
        result.latency_ms = elapsed_ms(started);
        let failure = match outcome {
            Ok(Ok(Value::Object(output))) => {
                result.output = output;
                None
            }
            Ok(Ok(other)) => {
                result.output.insert("result".to_string(), other);
                None
            }
            Ok(Err(err)) => Some(format!("{err:#}")),
            Err(payload) => Some(panic_message("handler", payload.as_ref())),
        };

        match failure {
            None => result.ok = true,
            Some(message) => {
                warn!(
                    skill_id = %result.skill_id,
                    latency_ms = result.latency_ms,
                    error = %message,
                    "skill handler failed"
                );
                result.error = Some(message);
                result.error_code = Some("skill_execution_error".to_string());
            }
        }
        result
    }

    /// Build and finalize a deny result.
    ///
    /// `classifiers` carries the registry's `(safety_class, stage)` when the
    /// skill is known; otherwise the `internal_safe` / `experimental`
    /// placeholders are used.
    fn deny(
        &self,
        request: &SkillRunRequest,
        skill_run_id: String,
        started: Instant,
        reason: DenyReason,
        classifiers: Option<(SafetyClass, Stage)>,
        phase: Phase,
    ) -> SkillRunResult {
        let source = if classifiers.is_some() {
            "registry_metadata"
        } else {
            "deny_default"
        };
        let (safety_class, status) =
            classifiers.unwrap_or((SafetyClass::InternalSafe, Stage::Experimental));
        let code = reason.code();
        let skill_id = match request.skill_id.trim() {
            "" => UNKNOWN_SKILL_ID.to_string(),
            id => id.to_string(),
        };
        debug!(%skill_id, error_code = %code, "skill run denied");

        let mut result = SkillRunResult::new(skill_id, skill_run_id);
        result.error = Some(reason.to_string());
        result.error_code = Some(code.clone());
        result.latency_ms = elapsed_ms(started);
        result.safety_class = safety_class;
        result.status = status;
        result.trace = base_trace(phase, request.dry_run);
        result
            .trace
            .insert("policy_gate".to_string(), json!(reason.is_policy_gate()));
        result.metadata.insert("policy_blocked".to_string(), json!(true));
        result
            .metadata
            .insert("request".to_string(), Value::Object(request.to_dict()));
        result.metadata.insert("deny_reason".to_string(), json!(code));
        result.metadata.insert("status_source".to_string(), json!(source));
        result.metadata.insert("safety_source".to_string(), json!(source));

        let mut extra = JsonMap::new();
        extra.insert("reason".to_string(), json!(code));
        extra.insert("policy_blocked".to_string(), json!(true));
        extra.insert("status_source".to_string(), json!(source));
        extra.insert("safety_source".to_string(), json!(source));
        self.finalize(request, result, extra)
    }

    /// Emit telemetry, attach its id, then record the learning event.
    fn finalize(
        &self,
        request: &SkillRunRequest,
        mut result: SkillRunResult,
        extra: JsonMap,
    ) -> SkillRunResult {
        let mut metadata = JsonMap::new();
        metadata.insert("request_id".to_string(), json!(request.request_id));
        if !request.metadata.is_empty() {
            metadata.insert(
                "request_metadata".to_string(),
                Value::Object(request.metadata.clone()),
            );
        }
        metadata.extend(extra);

        let draft = TelemetryDraft {
            skill_run_id: result.skill_run_id.clone(),
            skill_id: result.skill_id.clone(),
            ok: result.ok,
            latency_ms: result.latency_ms,
            session_id: request.session_id.clone(),
            turn_id: request.turn_id.clone(),
            safety_class: Some(result.safety_class),
            status: Some(result.status),
            error_code: result.error_code.clone(),
            metadata,
        };
        match catch_unwind(AssertUnwindSafe(|| self.telemetry.emit(draft))) {
            Ok(Ok(event)) => result.telemetry_ref = Some(event.telemetry_id),
            Ok(Err(err)) => warn!(
                skill_run_id = %result.skill_run_id,
                error = %err,
                "telemetry emit failed"
            ),
            Err(payload) => warn!(
                skill_run_id = %result.skill_run_id,
                error = %panic_message("telemetry sink", payload.as_ref()),
                "telemetry emit failed"
            ),
        }

        let mut learning_meta = JsonMap::new();
        learning_meta.insert("safety_class".to_string(), json!(result.safety_class.as_str()));
        learning_meta.insert("status".to_string(), json!(result.status.as_str()));
        learning_meta.insert("telemetry_ref".to_string(), json!(result.telemetry_ref));
        learning_meta.insert("request_id".to_string(), json!(request.request_id));
        learning_meta.insert("dry_run".to_string(), json!(request.dry_run));
        let input = LearningEventInput {
            skill_id: result.skill_id.clone(),
            skill_run_id: result.skill_run_id.clone(),
            ok: result.ok,
            error_code: result.error_code.clone(),
            latency_ms: result.latency_ms,
            session_id: request.session_id.clone(),
            turn_id: request.turn_id.clone(),
            metadata: learning_meta,
        };
        let recorded = catch_unwind(AssertUnwindSafe(|| self.learning.record_skill_run(input)));
        let learning_error = match recorded {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(payload) => Some(panic_message("learning runtime", payload.as_ref())),
        };
        if let Some(error) = learning_error {
            warn!(
                skill_run_id = %result.skill_run_id,
                %error,
                "learning record failed"
            );
        }

        debug!(
            ok = result.ok,
            latency_ms = result.latency_ms,
            error_code = result.error_code.as_deref().unwrap_or(""),
            "skill run finalized"
        );
        result
    }
}

//! Bounded, append-only telemetry store.
//!
//! Holds the most recent `max_events` [`TelemetryEvent`]s in arrival order.
//! When the cap is exceeded the oldest events are discarded whole. An
//! optional [`TelemetrySink`] receives every event for persistence.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use skillrt_types::config::default_max_events;
use skillrt_types::skill::{SafetyClass, Stage};
use skillrt_types::telemetry::{
    SKILL_TELEMETRY_EVENT_SCHEMA, SkillTelemetryRollup, TelemetryEvent, TelemetrySummary,
};
use skillrt_types::{JsonMap, prefixed_id, unix_now};
use tracing::warn;

use crate::error::TelemetryError;

// ---------------------------------------------------------------------------
// Sink port
// ---------------------------------------------------------------------------

/// Persistence port for telemetry events (implemented by the JSONL sink in
/// `skillrt-infra`).
pub trait TelemetrySink: Send + Sync {
    fn persist(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Everything needed to emit an event except its id and timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryDraft {
    pub skill_run_id: String,
    pub skill_id: String,
    pub ok: bool,
    pub latency_ms: u64,
    pub session_id: Option<String>,
    pub turn_id: Option<String>,
    pub safety_class: Option<SafetyClass>,
    pub status: Option<Stage>,
    pub error_code: Option<String>,
    pub metadata: JsonMap,
}

impl TelemetryDraft {
    fn into_event(self) -> TelemetryEvent {
        TelemetryEvent {
            schema_version: SKILL_TELEMETRY_EVENT_SCHEMA.to_string(),
            telemetry_id: prefixed_id("skilltel"),
            timestamp: unix_now(),
            skill_run_id: self.skill_run_id,
            skill_id: self.skill_id,
            ok: self.ok,
            latency_ms: self.latency_ms,
            session_id: self.session_id,
            turn_id: self.turn_id,
            safety_class: self.safety_class,
            status: self.status,
            error_code: self.error_code,
            metadata: self.metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Bounded in-memory ring of telemetry events, optionally mirrored to a
/// [`TelemetrySink`]. Oldest events are evicted once `max_events` is reached.
pub struct SkillTelemetryStore {
    max_events: usize,
    events: Mutex<VecDeque<TelemetryEvent>>,
    sink: Option<Arc<dyn TelemetrySink>>,
    sink_failures: AtomicU64,
}

impl Default for SkillTelemetryStore {
    fn default() -> Self {
        Self::new(default_max_events())
    }
}

impl fmt::Debug for SkillTelemetryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillTelemetryStore")
            .field("max_events", &self.max_events)
            .field("len", &self.len())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl SkillTelemetryStore {
    /// A store keeping at most `max_events` (floored at 1).
    pub fn new(max_events: usize) -> Self {
        Self {
            max_events: max_events.max(1),
            events: Mutex::new(VecDeque::new()),
            sink: None,
            sink_failures: AtomicU64::new(0),
        }
    }

    pub fn with_sink(max_events: usize, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new(max_events)
        }
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    fn events(&self) -> MutexGuard<'_, VecDeque<TelemetryEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mint an id and timestamp for `draft` and record it.
    pub fn emit(&self, draft: TelemetryDraft) -> Result<TelemetryEvent, TelemetryError> {
        self.record(draft.into_event())
    }

    /// Validate and append `event`, evicting the oldest past the cap.
    ///
    /// The sink is written under the same lock as the ring so persisted
    /// order matches arrival order. Sink failures are logged and counted;
    /// the in-memory event is kept.
    pub fn record(&self, event: TelemetryEvent) -> Result<TelemetryEvent, TelemetryError> {
        let event = event.validate()?;
        let mut events = self.events();
        events.push_back(event.clone());
        while events.len() > self.max_events {
            events.pop_front();
        }
        if let Some(sink) = &self.sink
            && let Err(err) = sink.persist(&event)
        {
            self.sink_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                telemetry_id = %event.telemetry_id,
                skill_id = %event.skill_id,
                error = %err,
                "telemetry sink write failed"
            );
        }
        Ok(event)
    }

    /// The most recent `limit` events (optionally for one skill), oldest
    /// first.
    pub fn list_events(&self, skill_id: Option<&str>, limit: usize) -> Vec<TelemetryEvent> {
        let events = self.events();
        let mut picked: Vec<TelemetryEvent> = events
            .iter()
            .rev()
            .filter(|e| skill_id.is_none_or(|id| e.skill_id == id))
            .take(limit)
            .cloned()
            .collect();
        picked.reverse();
        picked
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    /// Number of events the sink failed to persist.
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> TelemetrySummary {
        let events = self.events();
        let mut summary = TelemetrySummary::default();
        let mut latency_total: f64 = 0.0;
        let mut per_skill_latency: BTreeMap<String, f64> = BTreeMap::new();

        for event in events.iter() {
            summary.total += 1;
            latency_total += event.latency_ms as f64;
            let rollup = summary
                .by_skill
                .entry(event.skill_id.clone())
                .or_insert_with(SkillTelemetryRollup::default);
            rollup.count += 1;
            if event.ok {
                summary.ok += 1;
                rollup.ok += 1;
            } else {
                summary.fail += 1;
                rollup.fail += 1;
            }
            *per_skill_latency.entry(event.skill_id.clone()).or_default() += event.latency_ms as f64;
        }

        if summary.total > 0 {
            summary.avg_latency_ms = latency_total / summary.total as f64;
        }
        for (skill_id, rollup) in summary.by_skill.iter_mut() {
            let total = per_skill_latency.get(skill_id).copied().unwrap_or(0.0);
            rollup.avg_latency_ms = total / rollup.count as f64;
        }
        summary
    }
}

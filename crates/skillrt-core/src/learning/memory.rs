//! Process-local learning runtimes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use skillrt_types::learning::{
    LearningEvent, LearningEventInput, LearningQuery, LearningSummary, SkillLearningStats,
    WeaknessReport, WeaknessSignal,
};
use tracing::debug;

use super::{LearningRuntime, aggregate, build_event};
use crate::error::LearningError;

// ---------------------------------------------------------------------------
// In-memory runtime
// ---------------------------------------------------------------------------

/// Bounded in-memory learning store.
///
/// Keeps the most recent `capacity` events for queries and weakness
/// clustering, plus lifetime per-skill rollups in a concurrent map that
/// survive eviction.
pub struct InMemoryLearningRuntime {
    capacity: usize,
    fail_threshold: u64,
    min_fail_rate: f64,
    events: Mutex<VecDeque<LearningEvent>>,
    per_skill: DashMap<String, SkillLearningStats>,
}

impl Default for InMemoryLearningRuntime {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for InMemoryLearningRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLearningRuntime")
            .field("capacity", &self.capacity)
            .field("events", &self.len())
            .field("skills", &self.per_skill.len())
            .finish()
    }
}

impl InMemoryLearningRuntime {
    pub const DEFAULT_CAPACITY: usize = 5000;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            fail_threshold: 2,
            min_fail_rate: 0.5,
            events: Mutex::new(VecDeque::new()),
            per_skill: DashMap::new(),
        }
    }

    /// Override the weakness clustering thresholds (threshold floored at 1,
    /// rate clamped to `[0, 1]`).
    pub fn with_thresholds(mut self, fail_threshold: u64, min_fail_rate: f64) -> Self {
        self.fail_threshold = fail_threshold.max(1);
        self.min_fail_rate = if min_fail_rate.is_finite() {
            min_fail_rate.clamp(0.0, 1.0)
        } else {
            0.5
        };
        self
    }

    fn events(&self) -> MutexGuard<'_, VecDeque<LearningEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    pub fn query_events(&self, query: &LearningQuery) -> Vec<LearningEvent> {
        aggregate::query_events(self.events().iter(), query)
    }

    /// Summary over the events selected by `query`.
    pub fn build_summary(&self, query: &LearningQuery) -> LearningSummary {
        aggregate::summarize(&self.query_events(query))
    }

    pub fn weakness_report(&self) -> WeaknessReport {
        aggregate::weakness_report(self.events().iter(), self.fail_threshold, self.min_fail_rate)
    }

    pub fn query_weaknesses(&self, query: &LearningQuery) -> Vec<WeaknessSignal> {
        aggregate::filter_weaknesses(&self.weakness_report().signals, query)
    }

    /// Lifetime rollup for one skill, including evicted events.
    pub fn skill_stats(&self, skill_id: &str) -> Option<SkillLearningStats> {
        self.per_skill.get(skill_id).map(|s| s.value().clone())
    }

    fn update_rollup(&self, event: &LearningEvent) {
        let mut stats = self.per_skill.entry(event.skill_id.clone()).or_default();
        stats.count += 1;
        if event.ok {
            stats.ok += 1;
        } else {
            stats.fail += 1;
        }
        let n = stats.count as f64;
        stats.avg_latency_ms += (event.latency_ms as f64 - stats.avg_latency_ms) / n;
        stats.avg_process_score += (event.reward.process_score - stats.avg_process_score) / n;
        stats.avg_outcome_score += (event.reward.outcome_score - stats.avg_outcome_score) / n;
        stats.avg_reward_score += (event.reward.reward_score - stats.avg_reward_score) / n;
    }
}

impl LearningRuntime for InMemoryLearningRuntime {
    fn record_skill_run(&self, input: LearningEventInput) -> Result<LearningEvent, LearningError> {
        let event = build_event(input);
        {
            let mut events = self.events();
            events.push_back(event.clone());
            while events.len() > self.capacity {
                events.pop_front();
            }
        }
        self.update_rollup(&event);
        debug!(
            event_id = %event.event_id,
            skill_id = %event.skill_id,
            reward = event.reward.reward_score,
            "learning event recorded"
        );
        Ok(event)
    }
}

// ---------------------------------------------------------------------------
// No-op runtime
// ---------------------------------------------------------------------------

/// Scores events but stores nothing. Used when learning is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLearningRuntime;

impl LearningRuntime for NoopLearningRuntime {
    fn record_skill_run(&self, input: LearningEventInput) -> Result<LearningEvent, LearningError> {
        Ok(build_event(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn input(skill_id: &str, ok: bool, code: Option<&str>, latency_ms: u64) -> LearningEventInput {
        LearningEventInput {
            skill_id: skill_id.to_string(),
            skill_run_id: "skillrun_1".to_string(),
            ok,
            error_code: code.map(str::to_string),
            latency_ms,
            ..Default::default()
        }
    }

    #[test]
    fn records_and_queries_events() {
        let runtime = InMemoryLearningRuntime::default();
        runtime.record_skill_run(input("skill.a", true, None, 4)).unwrap();
        runtime
            .record_skill_run(input("skill.b", false, Some("skill_not_found"), 0))
            .unwrap();

        assert_eq!(runtime.len(), 2);
        let events = runtime.query_events(&LearningQuery::for_skill("skill.b"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].error_code.as_deref(), Some("skill_not_found"));

        let summary = runtime.build_summary(&LearningQuery::default());
        assert_eq!(summary.total_events, 2);
        assert_eq!(summary.fail_count, 1);
    }

    #[test]
    fn capacity_evicts_but_rollups_survive() {
        let runtime = InMemoryLearningRuntime::new(2);
        for latency in [10, 20, 30] {
            runtime.record_skill_run(input("skill.a", true, None, latency)).unwrap();
        }
        assert_eq!(runtime.len(), 2);

        let stats = runtime.skill_stats("skill.a").unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.ok, 3);
        assert!((stats.avg_latency_ms - 20.0).abs() < 1e-9);
        assert!((stats.avg_reward_score - 1.0).abs() < 1e-9);
        assert!(runtime.skill_stats("skill.z").is_none());
    }

    #[test]
    fn weakness_signals_follow_thresholds() {
        let runtime = InMemoryLearningRuntime::default().with_thresholds(3, 0.5);
        for _ in 0..2 {
            runtime
                .record_skill_run(input("skill.a", false, Some("skill_execution_error"), 1))
                .unwrap();
        }
        assert!(runtime.weakness_report().signals.is_empty());

        runtime
            .record_skill_run(input("skill.a", false, Some("skill_execution_error"), 1))
            .unwrap();
        let signals = runtime.query_weaknesses(&LearningQuery::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].count, 3);
        assert_eq!(runtime.weakness_report().weakness_fail_threshold, 3);
    }

    #[test]
    fn concurrent_records_update_rollups() {
        let runtime = Arc::new(InMemoryLearningRuntime::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let runtime = Arc::clone(&runtime);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        runtime
                            .record_skill_run(input(&format!("skill.{i}"), true, None, 1))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(runtime.len(), 100);
        for i in 0..4 {
            assert_eq!(runtime.skill_stats(&format!("skill.{i}")).unwrap().count, 25);
        }
    }

    #[test]
    fn noop_runtime_scores_without_storing() {
        let event = NoopLearningRuntime
            .record_skill_run(input("skill.a", false, Some("skill_disabled"), 0))
            .unwrap();
        assert!((event.reward.process_score - 0.35).abs() < 1e-9);
    }
}

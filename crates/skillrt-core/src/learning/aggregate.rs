//! Read-path aggregation over learning events.
//!
//! Pure functions over event slices so every runtime (in-memory, JSONL)
//! reports the same summary and the same weakness clusters.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use skillrt_types::learning::{
    LearningEvent, LearningQuery, LearningSummary, Severity, SkillLearningStats,
    WEAKNESS_REPORT_SCHEMA, WeaknessReport, WeaknessSignal,
};
use skillrt_types::unix_now;

pub const WEAKNESS_KIND: &str = "skill_error_cluster";

/// The most recent `query.limit` events matching `query`, oldest first.
pub fn query_events<'a, I>(events: I, query: &LearningQuery) -> Vec<LearningEvent>
where
    I: IntoIterator<Item = &'a LearningEvent>,
{
    let query = query.clone().validate();
    let mut matched: Vec<LearningEvent> = events
        .into_iter()
        .filter(|e| query.matches(e))
        .cloned()
        .collect();
    if matched.len() > query.limit {
        matched.drain(..matched.len() - query.limit);
    }
    matched
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    ok: u64,
    latency: f64,
    process: f64,
    outcome: f64,
    reward: f64,
}

impl Accumulator {
    fn add(&mut self, event: &LearningEvent) {
        self.count += 1;
        if event.ok {
            self.ok += 1;
        }
        self.latency += event.latency_ms as f64;
        self.process += event.reward.process_score;
        self.outcome += event.reward.outcome_score;
        self.reward += event.reward.reward_score;
    }

    fn avg(&self, total: f64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            total / self.count as f64
        }
    }

    fn stats(&self) -> SkillLearningStats {
        SkillLearningStats {
            count: self.count,
            ok: self.ok,
            fail: self.count - self.ok,
            avg_latency_ms: self.avg(self.latency),
            avg_process_score: self.avg(self.process),
            avg_outcome_score: self.avg(self.outcome),
            avg_reward_score: self.avg(self.reward),
        }
    }
}

/// Totals, averages and per-skill / per-error-code rollups.
pub fn summarize<'a, I>(events: I) -> LearningSummary
where
    I: IntoIterator<Item = &'a LearningEvent>,
{
    let mut overall = Accumulator::default();
    let mut per_skill: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut by_error_code: BTreeMap<String, u64> = BTreeMap::new();

    for event in events {
        overall.add(event);
        per_skill.entry(event.skill_id.clone()).or_default().add(event);
        if let Some(code) = &event.error_code {
            *by_error_code.entry(code.clone()).or_default() += 1;
        }
    }

    let totals = overall.stats();
    LearningSummary {
        total_events: totals.count,
        ok_count: totals.ok,
        fail_count: totals.fail,
        avg_latency_ms: totals.avg_latency_ms,
        avg_process_score: totals.avg_process_score,
        avg_outcome_score: totals.avg_outcome_score,
        avg_reward_score: totals.avg_reward_score,
        by_skill: per_skill
            .into_iter()
            .map(|(id, acc)| (id, acc.stats()))
            .collect(),
        by_error_code,
        generated_at_ts: unix_now(),
    }
}

fn severity_for(fail_count: u64, fail_rate: f64) -> Severity {
    if fail_count >= 5 || fail_rate >= 0.90 {
        Severity::High
    } else if fail_count >= 3 || fail_rate >= 0.70 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Strongest first: severity, then confidence, then count.
pub fn strongest_first(a: &WeaknessSignal, b: &WeaknessSignal) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| b.count.cmp(&a.count))
}

/// Cluster failures per `(skill_id, error_code)`.
///
/// A cluster is reported when it has at least `fail_threshold` failures and
/// its share of the skill's runs is at least `min_fail_rate`. Failures
/// without an error code are grouped under `unknown_error`.
pub fn cluster_weaknesses<'a, I>(
    events: I,
    fail_threshold: u64,
    min_fail_rate: f64,
) -> Vec<WeaknessSignal>
where
    I: IntoIterator<Item = &'a LearningEvent>,
{
    let fail_threshold = fail_threshold.max(1);
    let mut per_skill_totals: BTreeMap<&str, u64> = BTreeMap::new();
    let mut buckets: BTreeMap<(&str, &str), (u64, u64)> = BTreeMap::new();

    for event in events {
        *per_skill_totals.entry(event.skill_id.as_str()).or_default() += 1;
        if event.ok {
            continue;
        }
        let code = event
            .error_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or("unknown_error");
        let bucket = buckets
            .entry((event.skill_id.as_str(), code))
            .or_default();
        bucket.0 += 1;
        bucket.1 += event.latency_ms;
    }

    let mut signals: Vec<WeaknessSignal> = buckets
        .into_iter()
        .filter_map(|((skill_id, code), (fail_count, latency_total))| {
            let total = per_skill_totals
                .get(skill_id)
                .copied()
                .unwrap_or(fail_count)
                .max(1);
            let fail_rate = fail_count as f64 / total as f64;
            if fail_count < fail_threshold || fail_rate < min_fail_rate {
                return None;
            }
            let confidence =
                (fail_count as f64 / fail_threshold as f64 * 0.5 + fail_rate * 0.5).min(1.0);
            Some(WeaknessSignal {
                weakness_id: format!("weak_{skill_id}_{code}").replace([':', '/'], "_"),
                kind: WEAKNESS_KIND.to_string(),
                skill_id: skill_id.to_string(),
                error_code: code.to_string(),
                count: fail_count,
                fail_rate,
                avg_latency_ms: latency_total as f64 / fail_count as f64,
                confidence,
                severity: severity_for(fail_count, fail_rate),
                summary: format!(
                    "Repeated failures detected for {skill_id} ({code}): \
                     {fail_count}/{total} failed (fail_rate={fail_rate:.2})."
                ),
                total_count_for_skill: total,
            })
        })
        .collect();
    signals.sort_by(strongest_first);
    signals
}

/// A full weakness report with the thresholds that produced it.
pub fn weakness_report<'a, I>(events: I, fail_threshold: u64, min_fail_rate: f64) -> WeaknessReport
where
    I: IntoIterator<Item = &'a LearningEvent>,
{
    WeaknessReport {
        schema_version: WEAKNESS_REPORT_SCHEMA.to_string(),
        generated_at_ts: unix_now(),
        signals: cluster_weaknesses(events, fail_threshold, min_fail_rate),
        weakness_fail_threshold: fail_threshold.max(1),
        weakness_min_fail_rate: min_fail_rate,
    }
}

/// Signals matching the query's skill and error-code filters, strongest
/// first, capped at the query limit.
pub fn filter_weaknesses(signals: &[WeaknessSignal], query: &LearningQuery) -> Vec<WeaknessSignal> {
    let query = query.clone().validate();
    let mut out: Vec<WeaknessSignal> = signals
        .iter()
        .filter(|s| query.skill_id.as_deref().is_none_or(|id| id == s.skill_id))
        .filter(|s| query.error_code.as_deref().is_none_or(|c| c == s.error_code))
        .cloned()
        .collect();
    out.sort_by(strongest_first);
    out.truncate(query.limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::build_event;
    use skillrt_types::learning::LearningEventInput;

    fn event(skill_id: &str, ok: bool, code: Option<&str>, latency_ms: u64) -> LearningEvent {
        build_event(LearningEventInput {
            skill_id: skill_id.to_string(),
            skill_run_id: "skillrun_x".to_string(),
            ok,
            error_code: code.map(str::to_string),
            latency_ms,
            ..Default::default()
        })
    }

    #[test]
    fn query_keeps_most_recent_matches() {
        let events: Vec<LearningEvent> = (0..5)
            .map(|i| event("skill.a", i % 2 == 0, None, i))
            .collect();
        let picked = query_events(&events, &LearningQuery::for_skill("skill.a").with_limit(2));
        let latencies: Vec<u64> = picked.iter().map(|e| e.latency_ms).collect();
        assert_eq!(latencies, vec![3, 4]);

        let failures = query_events(
            &events,
            &LearningQuery {
                ok: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn summary_rolls_up_per_skill_and_code() {
        let events = vec![
            event("skill.a", true, None, 10),
            event("skill.a", false, Some("skill_execution_error"), 30),
            event("skill.b", false, Some("skill_not_found"), 0),
        ];
        let summary = summarize(&events);
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.ok_count, 1);
        assert_eq!(summary.fail_count, 2);
        let a = &summary.by_skill["skill.a"];
        assert_eq!((a.count, a.ok, a.fail), (2, 1, 1));
        assert_eq!(a.avg_latency_ms, 20.0);
        assert!((a.avg_process_score - (1.0 + 0.25) / 2.0).abs() < 1e-9);
        assert_eq!(summary.by_error_code["skill_not_found"], 1);
        assert!(summary.generated_at_ts > 0.0);
    }

    #[test]
    fn empty_summary_has_zero_averages() {
        let summary = summarize(std::iter::empty());
        assert_eq!(summary.total_events, 0);
        assert_eq!(summary.avg_reward_score, 0.0);
    }

    #[test]
    fn clusters_need_threshold_and_rate() {
        let mut events = vec![
            event("skill.a", false, Some("skill_execution_error"), 100),
            event("skill.a", false, Some("skill_execution_error"), 300),
            event("skill.a", true, None, 5),
            // Single failure: below the count threshold.
            event("skill.b", false, Some("skill_disabled"), 0),
        ];
        // Mostly successful skill: below the rate threshold.
        events.extend((0..6).map(|_| event("skill.c", true, None, 1)));
        events.push(event("skill.c", false, Some("skill_execution_error"), 1));
        events.push(event("skill.c", false, Some("skill_execution_error"), 1));

        let signals = cluster_weaknesses(&events, 2, 0.5);
        assert_eq!(signals.len(), 1);
        let s = &signals[0];
        assert_eq!(s.weakness_id, "weak_skill.a_skill_execution_error");
        assert_eq!(s.kind, WEAKNESS_KIND);
        assert_eq!(s.count, 2);
        assert_eq!(s.total_count_for_skill, 3);
        assert!((s.fail_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.avg_latency_ms, 200.0);
        assert_eq!(s.severity, Severity::Low);
        assert!((s.confidence - (0.5 + (2.0 / 3.0) * 0.5)).abs() < 1e-9);
        assert!(s.summary.contains("2/3 failed"));
    }

    #[test]
    fn weakness_ids_escape_separators_and_rank_by_severity() {
        let mut events: Vec<LearningEvent> = (0..5)
            .map(|_| event("skill.a", false, Some("skill_stage_not_verified:experimental"), 1))
            .collect();
        events.extend((0..2).map(|_| event("skill/b", false, None, 1)));
        events.push(event("skill/b", true, None, 1));

        let signals = cluster_weaknesses(&events, 2, 0.5);
        assert_eq!(signals.len(), 2);
        assert_eq!(
            signals[0].weakness_id,
            "weak_skill.a_skill_stage_not_verified_experimental"
        );
        assert_eq!(signals[0].severity, Severity::High);
        assert_eq!(signals[0].confidence, 1.0);
        assert_eq!(signals[1].weakness_id, "weak_skill_b_unknown_error");
        assert_eq!(signals[1].error_code, "unknown_error");
    }

    #[test]
    fn filter_weaknesses_applies_query() {
        let events: Vec<LearningEvent> = ["skill.a", "skill.a", "skill.b", "skill.b", "skill.b"]
            .iter()
            .map(|id| event(id, false, Some("skill_execution_error"), 1))
            .collect();
        let report = weakness_report(&events, 2, 0.5);
        assert_eq!(report.signals.len(), 2);
        assert_eq!(report.schema_version, WEAKNESS_REPORT_SCHEMA);

        let only_a = filter_weaknesses(&report.signals, &LearningQuery::for_skill("skill.a"));
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].skill_id, "skill.a");
        let capped = filter_weaknesses(&report.signals, &LearningQuery::default().with_limit(1));
        assert_eq!(capped[0].skill_id, "skill.b");
    }
}

//! File-backed learning runtime.
//!
//! Events are appended to a JSONL log. After every event the weakness report
//! is recomputed over the whole log and rewritten atomically, so the report
//! file always reflects every persisted event.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use skillrt_core::error::LearningError;
use skillrt_core::learning::{LearningRuntime, aggregate, build_event};
use skillrt_types::config::LearningConfig;
use skillrt_types::learning::{
    LearningEvent, LearningEventInput, LearningQuery, LearningSummary, WeaknessReport,
    WeaknessSignal,
};

use crate::config::resolve_path;
use crate::jsonl;

pub struct JsonlLearningRuntime {
    events_path: PathBuf,
    weaknesses_path: PathBuf,
    fail_threshold: u64,
    min_fail_rate: f64,
    /// Serializes appends and report rewrites.
    write_lock: Mutex<()>,
}

impl JsonlLearningRuntime {
    pub fn new(events_path: impl Into<PathBuf>, weaknesses_path: impl Into<PathBuf>) -> Self {
        let defaults = LearningConfig::default();
        let (fail_threshold, min_fail_rate) = defaults.effective_thresholds();
        Self {
            events_path: events_path.into(),
            weaknesses_path: weaknesses_path.into(),
            fail_threshold,
            min_fail_rate,
            write_lock: Mutex::new(()),
        }
    }

    /// Build from the `[learning]` config section, resolving relative paths
    /// against `data_dir`.
    pub fn from_config(data_dir: &Path, config: &LearningConfig) -> Self {
        let (fail_threshold, min_fail_rate) = config.effective_thresholds();
        Self {
            fail_threshold,
            min_fail_rate,
            ..Self::new(
                resolve_path(data_dir, &config.events_path),
                resolve_path(data_dir, &config.weaknesses_path),
            )
        }
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn weaknesses_path(&self) -> &Path {
        &self.weaknesses_path
    }

    fn load_events(&self) -> Result<Vec<LearningEvent>, LearningError> {
        Ok(jsonl::read_lines(&self.events_path, |v| {
            serde_json::from_value::<LearningEvent>(v.clone()).ok()
        })?)
    }

    pub fn query_events(&self, query: &LearningQuery) -> Result<Vec<LearningEvent>, LearningError> {
        Ok(aggregate::query_events(&self.load_events()?, query))
    }

    /// Summary over the events selected by `query`.
    pub fn build_summary(&self, query: &LearningQuery) -> Result<LearningSummary, LearningError> {
        Ok(aggregate::summarize(&self.query_events(query)?))
    }

    /// Weakness report recomputed from the event log.
    pub fn weakness_report(&self) -> Result<WeaknessReport, LearningError> {
        Ok(aggregate::weakness_report(
            &self.load_events()?,
            self.fail_threshold,
            self.min_fail_rate,
        ))
    }

    pub fn query_weaknesses(&self, query: &LearningQuery) -> Result<Vec<WeaknessSignal>, LearningError> {
        Ok(aggregate::filter_weaknesses(&self.weakness_report()?.signals, query))
    }

    /// The last report written to disk, if any.
    pub fn read_persisted_report(&self) -> Result<Option<WeaknessReport>, LearningError> {
        match std::fs::read(&self.weaknesses_path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl LearningRuntime for JsonlLearningRuntime {
    fn record_skill_run(&self, input: LearningEventInput) -> Result<LearningEvent, LearningError> {
        let event = build_event(input);
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = jsonl::open_append(&self.events_path)?;
        jsonl::append_line(&mut file, &serde_json::to_value(&event)?)?;

        let report = self.weakness_report()?;
        let body = serde_json::to_vec_pretty(&report)?;
        jsonl::write_atomic(&self.weaknesses_path, &body)?;

        tracing::debug!(
            event_id = %event.event_id,
            skill_id = %event.skill_id,
            signals = report.signals.len(),
            "learning event persisted"
        );
        Ok(event)
    }
}

/// Read a learning JSONL log without a runtime.
pub fn read_learning_log(path: &Path) -> std::io::Result<Vec<LearningEvent>> {
    jsonl::read_lines(path, |v: &Value| {
        serde_json::from_value::<LearningEvent>(v.clone()).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use skillrt_types::learning::Severity;
    use tempfile::TempDir;

    fn input(skill_id: &str, ok: bool, code: Option<&str>) -> LearningEventInput {
        LearningEventInput {
            skill_id: skill_id.to_string(),
            skill_run_id: String::new(),
            ok,
            error_code: code.map(str::to_string),
            latency_ms: 12,
            ..Default::default()
        }
    }

    fn runtime(tmp: &TempDir) -> JsonlLearningRuntime {
        JsonlLearningRuntime::from_config(tmp.path(), &LearningConfig::default())
    }

    #[test]
    fn events_are_appended_and_queryable() {
        let tmp = TempDir::new().unwrap();
        let rt = runtime(&tmp);
        rt.record_skill_run(input("skill.a", true, None)).unwrap();
        rt.record_skill_run(input("skill.b", false, Some("skill_execution_error"))).unwrap();
        rt.record_skill_run(input("skill.a", true, None)).unwrap();

        assert!(rt.events_path().starts_with(tmp.path()));
        assert_eq!(read_learning_log(rt.events_path()).unwrap().len(), 3);

        let a = rt.query_events(&LearningQuery::for_skill("skill.a")).unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|e| e.skill_run_id.starts_with("learnrun_")));

        let summary = rt.build_summary(&LearningQuery::default()).unwrap();
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.fail_count, 1);
        assert_eq!(summary.by_error_code["skill_execution_error"], 1);
    }

    #[test]
    fn weakness_report_is_rewritten_after_each_event() {
        let tmp = TempDir::new().unwrap();
        let rt = runtime(&tmp);

        rt.record_skill_run(input("skill.flaky", false, Some("skill_execution_error"))).unwrap();
        let report = rt.read_persisted_report().unwrap().unwrap();
        assert!(report.signals.is_empty());

        rt.record_skill_run(input("skill.flaky", false, Some("skill_execution_error"))).unwrap();
        let report = rt.read_persisted_report().unwrap().unwrap();
        assert_eq!(report.signals.len(), 1);
        let signal = &report.signals[0];
        assert_eq!(signal.skill_id, "skill.flaky");
        assert_eq!(signal.count, 2);
        assert_eq!(signal.severity, Severity::High);

        let none = rt
            .query_weaknesses(&LearningQuery::for_skill("skill.other"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn missing_files_read_as_empty() {
        let tmp = TempDir::new().unwrap();
        let rt = runtime(&tmp);
        assert!(rt.query_events(&LearningQuery::default()).unwrap().is_empty());
        assert!(rt.read_persisted_report().unwrap().is_none());
        assert!(rt.weakness_report().unwrap().signals.is_empty());
    }

    #[test]
    fn concurrent_writers_do_not_interleave_lines() {
        let tmp = TempDir::new().unwrap();
        let rt = Arc::new(runtime(&tmp));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let rt = Arc::clone(&rt);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        rt.record_skill_run(input(&format!("skill.{i}"), true, None)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(read_learning_log(rt.events_path()).unwrap().len(), 40);
    }
}

//! JSONL persistence for skill telemetry.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use skillrt_core::error::TelemetryError;
use skillrt_core::telemetry::TelemetrySink;
use skillrt_types::telemetry::TelemetryEvent;

use crate::jsonl;

/// Appends one JSON line per telemetry event and flushes after each write.
pub struct JsonlTelemetrySink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlTelemetrySink {
    /// Open (or create) the log at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = jsonl::open_append(&path)?;
        tracing::debug!(path = %path.display(), "telemetry log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every event in the log, skipping unreadable lines.
    pub fn read_events(&self) -> std::io::Result<Vec<TelemetryEvent>> {
        read_telemetry_log(&self.path)
    }
}

impl TelemetrySink for JsonlTelemetrySink {
    fn persist(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        jsonl::append_line(&mut file, &Value::Object(event.to_dict()))?;
        Ok(())
    }
}

/// Load a telemetry JSONL log written by [`JsonlTelemetrySink`].
pub fn read_telemetry_log(path: &Path) -> std::io::Result<Vec<TelemetryEvent>> {
    jsonl::read_lines(path, |v| TelemetryEvent::from_dict(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use skillrt_core::telemetry::{SkillTelemetryStore, TelemetryDraft};
    use tempfile::TempDir;

    fn draft(skill_id: &str, ok: bool) -> TelemetryDraft {
        TelemetryDraft {
            skill_run_id: "skillrun_1".to_string(),
            skill_id: skill_id.to_string(),
            ok,
            latency_ms: 3,
            ..Default::default()
        }
    }

    #[test]
    fn store_events_are_persisted_in_order() {
        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(JsonlTelemetrySink::open(tmp.path().join("telemetry/skill.jsonl")).unwrap());
        let store = SkillTelemetryStore::with_sink(2, sink.clone());

        let first = store.emit(draft("skill.a", true)).unwrap();
        store.emit(draft("skill.b", false)).unwrap();
        let third = store.emit(draft("skill.a", true)).unwrap();

        // The ring evicts, the log does not.
        assert_eq!(store.len(), 2);
        let persisted = sink.read_events().unwrap();
        assert_eq!(persisted.len(), 3);
        assert_eq!(persisted[0].telemetry_id, first.telemetry_id);
        assert_eq!(persisted[2].telemetry_id, third.telemetry_id);
        assert_eq!(persisted[1].skill_id, "skill.b");
        assert!(!persisted[1].ok);
        assert_eq!(store.sink_failures(), 0);
    }

    #[test]
    fn reopening_appends_to_existing_log() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("skill.jsonl");
        for _ in 0..2 {
            let sink = JsonlTelemetrySink::open(&path).unwrap();
            let event = SkillTelemetryStore::new(10).emit(draft("skill.a", true)).unwrap();
            sink.persist(&event).unwrap();
        }
        assert_eq!(read_telemetry_log(&path).unwrap().len(), 2);
    }
}

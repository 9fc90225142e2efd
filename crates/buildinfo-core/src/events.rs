//! Append-only JSONL event log for publish runs.
//!
//! Every engine step (upload start/finish, descriptor and build-info
//! publication, run completion) is recorded as a typed event, so a run can
//! be reconstructed after the fact without a debugger attached to the CI
//! job that ran it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use buildinfo_types::{ErrorClass, ItemKind, OverallStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default events file name.
pub const EVENTS_FILE: &str = "publish-events.jsonl";

/// Events file path within a state directory.
pub fn events_path(state_dir: &Path) -> PathBuf {
    state_dir.join(EVENTS_FILE)
}

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A publish run began.
    RunStarted {
        build_name: String,
        build_number: String,
    },
    /// An upload was handed to a worker.
    UploadStarted {
        module: String,
        path: String,
        kind: ItemKind,
    },
    /// An upload was acknowledged by the repository.
    UploadCompleted {
        module: String,
        path: String,
        kind: ItemKind,
        attempts: u32,
    },
    /// An upload failed for good.
    UploadFailed {
        module: String,
        path: String,
        kind: ItemKind,
        class: ErrorClass,
        message: String,
    },
    /// The build-info document landed.
    BuildInfoPublished,
    /// The run finished with a final status.
    RunFinished { status: OverallStatus },
}

/// A timestamped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl RunEvent {
    /// Stamp an event with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// In-memory event buffer with JSONL persistence.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<RunEvent>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event.
    pub fn record(&mut self, kind: EventKind) {
        self.events.push(RunEvent::now(kind));
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append all recorded events to a JSONL file.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create events dir {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open events file {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);

        for event in &self.events {
            let line = serde_json::to_string(event).context("failed to serialize event")?;
            writeln!(writer, "{line}").context("failed to write event line")?;
        }
        writer.flush().context("failed to flush events file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_inspect() {
        let mut log = EventLog::new();
        log.record(EventKind::RunStarted {
            build_name: "demo".to_string(),
            build_number: "7".to_string(),
        });
        log.record(EventKind::BuildInfoPublished);

        assert_eq!(log.len(), 2);
        assert!(matches!(log.events()[1].kind, EventKind::BuildInfoPublished));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = RunEvent::now(EventKind::UploadFailed {
            module: "org.example:api:1.0".to_string(),
            path: "org/example/api/1.0/api-1.0.jar".to_string(),
            kind: ItemKind::Artifact,
            class: ErrorClass::Permanent,
            message: "HTTP 401".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"upload_failed\""));
        assert!(json.contains("\"class\":\"permanent\""));
    }

    #[test]
    fn writes_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = events_path(dir.path());

        let mut log = EventLog::new();
        log.record(EventKind::RunFinished {
            status: OverallStatus::Success,
        });
        log.write_to_file(&path).unwrap();
        log.write_to_file(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: RunEvent = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(
            parsed.kind,
            EventKind::RunFinished {
                status: OverallStatus::Success
            }
        ));
    }
}

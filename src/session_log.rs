//! Append-only session log.
//!
//! One JSON object per line, each stamped with an RFC 3339 timestamp. The
//! log is constructed once in `main` from `[log] session_log` and handed to
//! the commands by reference. Writes are best-effort: a failed append is
//! reported through `tracing` and never fails the command.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bugreport_harness_core::builder::BuildReport;
use serde::Serialize;

use crate::config::LogConfig;

/// One session log record.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent<'a> {
    IndexBuilt {
        source_id: &'a str,
        path: String,
        model: &'a str,
        report: &'a BuildReport,
    },
    Question {
        question: &'a str,
        source_id: &'a str,
        top_k: usize,
    },
    Answer {
        question: &'a str,
        answer: &'a str,
        sources: usize,
    },
    Summary {
        source_id: &'a str,
        segments_failed: usize,
        summary: Option<&'a str>,
    },
    Error {
        command: &'a str,
        message: String,
    },
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a SessionEvent<'a>,
}

pub struct SessionLog {
    path: Option<PathBuf>,
}

impl SessionLog {
    /// A log that drops every event.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Log to `path`, creating its parent directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session log directory: {}", parent.display())
            })?;
        }
        Ok(Self { path: Some(path) })
    }

    pub fn from_config(config: &LogConfig) -> Result<Self> {
        match &config.session_log {
            Some(path) => Self::open(path),
            None => Ok(Self::disabled()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `event`.
    pub fn record(&self, event: &SessionEvent<'_>) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append(path, event) {
            tracing::warn!(path = %path.display(), error = %e, "session log write failed");
        }
    }
}

fn append(path: &Path, event: &SessionEvent<'_>) -> Result<()> {
    let record = Record {
        timestamp: chrono::Utc::now().to_rfc3339(),
        event,
    };
    let mut line = serde_json::to_string(&record)?;
    line.push('\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_one_json_line_per_event() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("session.jsonl");
        let log = SessionLog::open(&path).unwrap();

        log.record(&SessionEvent::Question {
            question: "why ANR?",
            source_id: "bugreport.zip",
            top_k: 6,
        });
        log.record(&SessionEvent::Error {
            command: "ask",
            message: "provider unavailable".into(),
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "question");
        assert_eq!(lines[0]["top_k"], 6);
        assert_eq!(lines[1]["event"], "error");
        let ts = lines[0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = SessionLog::from_config(&LogConfig::default()).unwrap();
        assert!(log.path().is_none());
        log.record(&SessionEvent::Error {
            command: "index",
            message: "x".into(),
        });
    }
}

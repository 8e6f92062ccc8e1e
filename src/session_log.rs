use crate::error::StoreError;
use crate::report::{SessionSink, SessionSummary};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// One line of the CSV session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub date: String,
    pub duration_secs: u32,
    pub wpm: u32,
    pub accuracy: u32,
    pub score: u32,
    pub keystrokes: u32,
    pub errors: u32,
    pub selected_keys: String,
}

impl LogRow {
    fn new(summary: &SessionSummary, at: DateTime<Local>) -> Self {
        Self {
            date: at.to_rfc3339(),
            duration_secs: summary.duration_secs,
            wpm: summary.wpm,
            accuracy: summary.accuracy,
            score: summary.score,
            keystrokes: summary.keystrokes,
            errors: summary.errors,
            selected_keys: summary.selected_keys.clone(),
        }
    }
}

/// Append-only CSV log of completed sessions.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, summary: &SessionSummary, at: DateTime<Local>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // A fresh file gets a header row
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(LogRow::new(summary, at))?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<LogRow>, StoreError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

impl SessionSink for SessionLog {
    fn record_session(&mut self, summary: &SessionSummary) -> Result<(), StoreError> {
        self.append(summary, Local::now())
    }
}

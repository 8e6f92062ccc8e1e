use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Final aggregate of one completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub duration_secs: u32,
    pub wpm: u32,
    pub accuracy: u32,
    pub score: u32,
    pub keystrokes: u32,
    pub errors: u32,
    pub selected_keys: String,
}

/// How one character fared during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDelta {
    pub character: char,
    pub correct: u32,
    pub incorrect: u32,
}

impl KeyDelta {
    /// Rounded percentage of correct presses.
    pub fn accuracy(&self) -> u32 {
        let total = self.correct + self.incorrect;
        if total == 0 {
            return 0;
        }
        ((self.correct as f64 / total as f64) * 100.0).round() as u32
    }
}

/// Everything emitted when a session completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub summary: SessionSummary,
    pub deltas: Vec<KeyDelta>,
}

pub trait SessionSink: Send {
    fn record_session(&mut self, summary: &SessionSummary) -> Result<(), StoreError>;
}

pub trait KeyPerformanceSink: Send {
    /// `wpm` is the speed of the session the delta came from.
    fn record_key_delta(&mut self, delta: &KeyDelta, wpm: u32) -> Result<(), StoreError>;
}

/// Where the engine hands completion reports. Must not block.
pub trait ReportSink {
    fn submit(&mut self, report: CompletionReport);
}

/// Collects reports in memory.
impl ReportSink for Vec<CompletionReport> {
    fn submit(&mut self, report: CompletionReport) {
        self.push(report);
    }
}

/// The sinks a reporter writes to.
#[derive(Default)]
pub struct Sinks {
    sessions: Vec<Box<dyn SessionSink>>,
    keys: Vec<Box<dyn KeyPerformanceSink>>,
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions<S: SessionSink + 'static>(mut self, sink: S) -> Self {
        self.sessions.push(Box::new(sink));
        self
    }

    pub fn with_keys<K: KeyPerformanceSink + 'static>(mut self, sink: K) -> Self {
        self.keys.push(Box::new(sink));
        self
    }

    /// Write one report everywhere. Failures are logged and skipped.
    pub fn deliver(&mut self, report: &CompletionReport) {
        for sink in &mut self.sessions {
            if let Err(e) = sink.record_session(&report.summary) {
                warn!(error = %e, "failed to record session");
            }
        }
        for delta in &report.deltas {
            for sink in &mut self.keys {
                if let Err(e) = sink.record_key_delta(delta, report.summary.wpm) {
                    warn!(error = %e, key = %delta.character, "failed to record key performance");
                }
            }
        }
    }
}

/// Delivers reports on a dedicated worker thread.
///
/// Dropping the reporter (or calling [`BackgroundReporter::shutdown`]) closes
/// the channel and waits for queued reports to be written.
pub struct BackgroundReporter {
    tx: Option<Sender<CompletionReport>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundReporter {
    pub fn spawn(mut sinks: Sinks) -> Self {
        let (tx, rx) = mpsc::channel::<CompletionReport>();

        let handle = thread::spawn(move || {
            for report in rx {
                debug!(wpm = report.summary.wpm, keys = report.deltas.len(), "delivering report");
                sinks.deliver(&report);
            }
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl ReportSink for BackgroundReporter {
    fn submit(&mut self, report: CompletionReport) {
        let sent = self.tx.as_ref().map(|tx| tx.send(report));
        if !matches!(sent, Some(Ok(()))) {
            warn!("report worker is gone; dropping completion report");
        }
    }
}

impl Drop for BackgroundReporter {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("report worker panicked");
            }
        }
    }
}

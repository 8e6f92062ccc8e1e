use crate::key::Key;
use crate::metrics::Metrics;
use crate::report::{CompletionReport, ReportSink, SessionSummary};
use crate::session::{KeyOutcome, SessionState, Timestamp};
use crate::word_source::WordSource;
use tracing::{debug, info};

const MS_PER_MINUTE: f64 = 60_000.0;

/// Drives typing sessions: feeds key presses into the session state, reports
/// completed sessions and draws the next target text.
#[derive(Debug)]
pub struct TypingEngine<W: WordSource, R: ReportSink> {
    session: SessionState,
    source: W,
    reporter: R,
    last_speed: u32,
    top_speed: u32,
    completed_sessions: u32,
}

impl<W: WordSource, R: ReportSink> TypingEngine<W, R> {
    pub fn new(mut source: W, reporter: R) -> Self {
        let session = SessionState::new(source.target_text());
        Self {
            session,
            source,
            reporter,
            last_speed: 0,
            top_speed: 0,
            completed_sessions: 0,
        }
    }

    /// Seed last/top speed from stored history.
    pub fn with_speed_history(mut self, last_speed: u32, top_speed: u32) -> Self {
        self.last_speed = last_speed;
        self.top_speed = top_speed;
        self
    }

    pub fn submit_key_press(&mut self, key: Key, now: Timestamp) -> KeyOutcome {
        let outcome = self.session.apply(key, now);
        if outcome == KeyOutcome::Finished {
            self.complete(now);
        }
        outcome
    }

    /// Abandon the current session and start over with a fresh text.
    /// Returns the whole minutes spent in the abandoned session.
    pub fn restart(&mut self, now: Timestamp) -> u32 {
        let minutes = self
            .session
            .started_at()
            .map(|start| (now.saturating_sub(start) as f64 / MS_PER_MINUTE).round() as u32)
            .unwrap_or(0);
        debug!(minutes, "restarting session");
        self.reload();
        minutes
    }

    /// Draw a fresh text from the source, e.g. after the key set changed.
    pub fn reload(&mut self) {
        self.session = SessionState::new(self.source.target_text());
    }

    fn complete(&mut self, now: Timestamp) {
        let elapsed_ms = self
            .session
            .started_at()
            .map_or(0, |start| now.saturating_sub(start));
        let counters = self.session.counters();
        let metrics =
            Metrics::compute(counters.keystrokes, counters.errors, elapsed_ms).unwrap_or_default();

        let summary = SessionSummary {
            duration_secs: (elapsed_ms as f64 / 1000.0).round() as u32,
            wpm: metrics.speed,
            accuracy: metrics.accuracy,
            score: metrics.score,
            keystrokes: counters.keystrokes,
            errors: counters.errors,
            selected_keys: self.source.active_keys(),
        };
        let deltas = self.session.key_deltas();

        self.last_speed = metrics.speed;
        self.top_speed = self.top_speed.max(metrics.speed);
        self.completed_sessions += 1;

        info!(
            wpm = summary.wpm,
            accuracy = summary.accuracy,
            score = summary.score,
            keystrokes = summary.keystrokes,
            errors = summary.errors,
            "session complete"
        );
        self.reporter.submit(CompletionReport { summary, deltas });
        self.reload();
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn metrics(&self) -> Option<Metrics> {
        self.session.metrics()
    }

    pub fn last_speed(&self) -> u32 {
        self.last_speed
    }

    pub fn top_speed(&self) -> u32 {
        self.top_speed
    }

    pub fn completed_sessions(&self) -> u32 {
        self.completed_sessions
    }

    pub fn source(&self) -> &W {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut W {
        &mut self.source
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }
}

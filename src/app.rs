use crate::config::{Config, ConfigStore};
use crate::engine::TypingEngine;
use crate::key::Key;
use crate::report::ReportSink;
use crate::session::{KeyOutcome, Timestamp};
use crate::stats::{DailyGoal, Experience, KeyPerformance, StatsDb};
use crate::word_source::{PracticeSource, WordSource};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::warn;

/// Ticks to keep polling the store for a just-finished session.
const REFRESH_TICKS: u32 = 50;
const PROBLEM_KEYS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    KeyPicker,
    KeyStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Application state: the engine plus what the screen shows around it.
pub struct App<R: ReportSink> {
    pub engine: TypingEngine<PracticeSource, R>,
    pub state: AppState,
    pub config: Config,
    pub goal: Option<DailyGoal>,
    pub experience: Option<Experience>,
    pub key_stats: Vec<KeyPerformance>,
    pub problem_keys: Vec<KeyPerformance>,
    pub goal_streak: u32,
    store: Option<StatsDb>,
    config_store: Option<Box<dyn ConfigStore>>,
    pending_refresh: u32,
}

impl<R: ReportSink> App<R> {
    pub fn new(source: PracticeSource, reporter: R, config: Config) -> Self {
        Self {
            engine: TypingEngine::new(source, reporter),
            state: AppState::Typing,
            config,
            goal: None,
            experience: None,
            key_stats: Vec::new(),
            problem_keys: Vec::new(),
            goal_streak: 0,
            store: None,
            config_store: None,
            pending_refresh: 0,
        }
    }

    /// Attach the read side of the record store and seed speed history.
    pub fn with_store(mut self, store: StatsDb) -> Self {
        let last = store.last_speed().unwrap_or_default();
        let top = store.top_speed().unwrap_or_default();
        self.engine = self.engine.with_speed_history(last, top);
        self.store = Some(store);
        self.refresh();
        self
    }

    pub fn with_config_store<C: ConfigStore + 'static>(mut self, store: C) -> Self {
        self.config_store = Some(Box::new(store));
        self
    }

    pub fn store(&self) -> Option<&StatsDb> {
        self.store.as_ref()
    }

    /// Re-read goal and experience from the store, resetting experience
    /// first if a day or week boundary has passed.
    pub fn refresh(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.apply_due_resets(Local::now()) {
            warn!(error = %e, "failed to reset experience");
        }
        match store.goal_for(Local::now().date_naive()) {
            Ok(goal) => self.goal = Some(goal),
            Err(e) => warn!(error = %e, "failed to read daily goal"),
        }
        match store.experience() {
            Ok(xp) => self.experience = Some(xp),
            Err(e) => warn!(error = %e, "failed to read experience"),
        }
    }

    /// The report worker writes asynchronously, so keep re-reading until the
    /// finished session shows up or the retry budget runs out.
    pub fn on_tick(&mut self) {
        if self.pending_refresh == 0 {
            return;
        }
        let before = (self.goal, self.experience);
        self.refresh();
        if (self.goal, self.experience) != before {
            self.pending_refresh = 0;
        } else {
            self.pending_refresh -= 1;
        }
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.pending_refresh > 0
    }

    pub fn handle_key(&mut self, event: KeyEvent, now: Timestamp) -> Control {
        if event.code == KeyCode::Esc && self.state == AppState::Typing {
            return Control::Quit;
        }
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            return self.handle_chord(event.code, now);
        }

        match self.state {
            AppState::Typing => {
                if let Some(key) = Key::from_event(&event) {
                    if self.engine.submit_key_press(key, now) == KeyOutcome::Finished
                        && self.store.is_some()
                    {
                        self.pending_refresh = REFRESH_TICKS;
                    }
                }
            }
            AppState::KeyPicker => self.pick_key(event.code),
            AppState::KeyStats => self.state = AppState::Typing,
        }
        Control::Continue
    }

    fn handle_chord(&mut self, code: KeyCode, now: Timestamp) -> Control {
        match code {
            KeyCode::Char('c') => return Control::Quit,
            KeyCode::Char('r') => self.restart(now),
            KeyCode::Char('k') => {
                if self.engine.source().key_set().is_some() {
                    self.state = AppState::KeyPicker;
                }
            }
            KeyCode::Char('s') => self.open_key_stats(),
            _ => {}
        }
        Control::Continue
    }

    /// Abandon the current text and credit the time spent to today's goal.
    pub fn restart(&mut self, now: Timestamp) {
        let minutes = self.engine.restart(now);
        if minutes == 0 {
            return;
        }
        if let Some(store) = &self.store {
            match store.add_practice_minutes(Local::now().date_naive(), minutes) {
                Ok(goal) => self.goal = Some(goal),
                Err(e) => warn!(error = %e, "failed to credit daily goal"),
            }
        }
    }

    fn pick_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter | KeyCode::Esc => {
                self.state = AppState::Typing;
                self.engine.reload();
                self.save_config();
            }
            KeyCode::Char('*') => {
                if let Some(keys) = self.engine.source_mut().key_set_mut() {
                    keys.toggle_all();
                }
            }
            KeyCode::Char(c) => {
                if let Some(keys) = self.engine.source_mut().key_set_mut() {
                    if keys.toggle(c) {
                        self.config.current_key = c.to_ascii_lowercase();
                    }
                }
            }
            _ => {}
        }
    }

    fn open_key_stats(&mut self) {
        if let Some(store) = &self.store {
            match store.key_performance() {
                Ok(stats) => self.key_stats = stats,
                Err(e) => warn!(error = %e, "failed to read key performance"),
            }
            match store.problem_keys(PROBLEM_KEYS) {
                Ok(keys) => self.problem_keys = keys,
                Err(e) => warn!(error = %e, "failed to read problem keys"),
            }
            match store.goal_streak(Local::now().date_naive()) {
                Ok(streak) => self.goal_streak = streak,
                Err(e) => warn!(error = %e, "failed to read goal streak"),
            }
        }
        self.state = AppState::KeyStats;
    }

    fn save_config(&mut self) {
        if let Some(keys) = self.engine.source().key_set() {
            self.config.selected_keys = keys.clone();
        }
        if let Some(store) = &self.config_store {
            if let Err(e) = store.save(&self.config) {
                warn!(error = %e, "failed to save config");
            }
        }
    }

    pub fn active_keys(&self) -> String {
        self.engine.source().active_keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::KeySet;
    use crate::language::Language;
    use crate::report::CompletionReport;
    use crate::word_source::{FixedSource, KeySetSource};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn prompt_app(prompt: &str) -> App<Vec<CompletionReport>> {
        App::new(
            PracticeSource::Prompt(FixedSource::new(prompt)),
            Vec::new(),
            Config::default(),
        )
    }

    fn keys_app() -> App<Vec<CompletionReport>> {
        let lang = Language {
            name: "t".to_string(),
            size: 3,
            words: vec!["rain".to_string(), "line".to_string(), "zoo".to_string()],
        };
        let source = KeySetSource::new(lang, KeySet::default(), 10).with_seed(3);
        App::new(PracticeSource::Keys(source), Vec::new(), Config::default())
    }

    #[test]
    fn test_typing_completes_session() {
        let mut app = prompt_app("hi");
        for (i, c) in "hi ".chars().enumerate() {
            let ctl = app.handle_key(key(KeyCode::Char(c)), i as u64 * 100);
            assert_eq!(ctl, Control::Continue);
        }
        assert_eq!(app.engine.reporter().len(), 1);
        // nothing to poll without a store
        assert!(!app.is_refresh_pending());
    }

    #[test]
    fn test_refresh_waits_for_the_session_to_be_stored() {
        let store = StatsDb::open_in_memory().unwrap();
        let mut app = prompt_app("hi").with_store(store);
        for c in "hi ".chars() {
            app.handle_key(key(KeyCode::Char(c)), 0);
        }
        assert!(app.is_refresh_pending());

        // the worker has not written yet
        app.on_tick();
        assert!(app.is_refresh_pending());
        assert_eq!(app.goal.unwrap().completed_seconds, 0);

        let today = Local::now().date_naive();
        app.store().unwrap().add_practice_seconds(today, 30).unwrap();
        app.on_tick();
        assert!(!app.is_refresh_pending());
        assert_eq!(app.goal.unwrap().completed_seconds, 30);
    }

    #[test]
    fn test_refresh_resets_stale_daily_experience() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let store = StatsDb::open(&path).unwrap();
        store.apply_due_resets(Local::now()).unwrap();
        store.add_experience(40).unwrap();

        let yesterday = Local::now().date_naive().pred_opt().unwrap();
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute(
                "UPDATE experience SET last_daily_reset = ?1 WHERE id = 1",
                [yesterday.format("%Y-%m-%d").to_string()],
            )
            .unwrap();

        let app = prompt_app("hi").with_store(store);
        let xp = app.experience.unwrap();
        assert_eq!(xp.daily, 0);
        assert_eq!(xp.total, 40);
    }

    #[test]
    fn test_refresh_gives_up_after_retry_budget() {
        let store = StatsDb::open_in_memory().unwrap();
        let mut app = prompt_app("hi").with_store(store);
        for c in "hi ".chars() {
            app.handle_key(key(KeyCode::Char(c)), 0);
        }
        for _ in 0..REFRESH_TICKS {
            app.on_tick();
        }
        assert!(!app.is_refresh_pending());
    }

    #[test]
    fn test_escape_and_ctrl_c_quit() {
        let mut app = prompt_app("hi");
        assert_eq!(app.handle_key(key(KeyCode::Esc), 0), Control::Quit);
        assert_eq!(app.handle_key(ctrl('c'), 0), Control::Quit);
    }

    #[test]
    fn test_ctrl_r_restarts_and_credits_goal() {
        let store = StatsDb::open_in_memory().unwrap();
        let mut app = prompt_app("hello").with_store(store);
        app.handle_key(key(KeyCode::Char('h')), 0);
        app.handle_key(ctrl('r'), 120_000);

        assert_eq!(app.engine.session().counters().keystrokes, 0);
        assert_eq!(app.goal.unwrap().completed_minutes(), 2);
    }

    #[test]
    fn test_key_picker_toggles_and_reloads() {
        let mut app = keys_app();
        app.handle_key(ctrl('k'), 0);
        assert_eq!(app.state, AppState::KeyPicker);

        app.handle_key(key(KeyCode::Char('z')), 0);
        app.handle_key(key(KeyCode::Char('o')), 0);
        assert_eq!(app.config.current_key, 'o');
        app.handle_key(key(KeyCode::Enter), 0);

        assert_eq!(app.state, AppState::Typing);
        assert!(app.config.selected_keys.contains('z'));
        let words: Vec<String> = app.engine.session().words().collect();
        assert!(words.contains(&"zoo".to_string()));
    }

    #[test]
    fn test_key_picker_unavailable_for_prompt() {
        let mut app = prompt_app("hi");
        app.handle_key(ctrl('k'), 0);
        assert_eq!(app.state, AppState::Typing);
    }

    #[test]
    fn test_key_stats_view() {
        let store = StatsDb::open_in_memory().unwrap();
        let delta = crate::report::KeyDelta {
            character: 'h',
            correct: 1,
            incorrect: 0,
        };
        store
            .update_key_performance(&delta, 20, Local::now().date_naive())
            .unwrap();
        let mut app = prompt_app("hi").with_store(store);

        app.handle_key(ctrl('s'), 0);
        assert_eq!(app.state, AppState::KeyStats);
        assert_eq!(app.key_stats.len(), 1);
        assert_eq!(app.problem_keys.len(), 1);
        assert_eq!(app.goal_streak, 0);

        app.handle_key(key(KeyCode::Char('x')), 0);
        assert_eq!(app.state, AppState::Typing);
        assert_eq!(app.engine.session().counters().keystrokes, 0);
    }

    #[test]
    fn test_with_store_seeds_speed_history() {
        let store = StatsDb::open_in_memory().unwrap();
        let summary = crate::report::SessionSummary {
            duration_secs: 10,
            wpm: 33,
            accuracy: 100,
            score: 33,
            keystrokes: 30,
            errors: 0,
            selected_keys: "custom".to_string(),
        };
        store
            .insert_session(&summary, Local::now().date_naive())
            .unwrap();
        let app = prompt_app("hi").with_store(store);
        assert_eq!(app.engine.last_speed(), 33);
        assert_eq!(app.engine.top_speed(), 33);
        assert!(app.goal.is_some());
        assert_eq!(app.experience, Some(Experience::default()));
    }
}

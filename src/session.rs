use crate::key::Key;
use crate::metrics::Metrics;
use crate::report::KeyDelta;
use std::collections::BTreeMap;

/// Monotonic milliseconds, as read from a [`crate::runtime::Clock`].
pub type Timestamp = u64;

const SEPARATOR: char = ' ';

/// Current word under test and the offset within it.
///
/// `letter == word length` means the word is complete and the separator is
/// expected next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor {
    pub word: usize,
    pub letter: usize,
}

impl Cursor {
    pub fn new(word: usize, letter: usize) -> Self {
        Self { word, letter }
    }

    fn slot(self) -> Slot {
        Slot {
            word: self.word,
            position: self.letter,
        }
    }
}

/// One trackable position: a letter of a word, or the separator after it
/// (`position == word length`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub word: usize,
    pub position: usize,
}

/// What happened at a slot: the character that currently stands there,
/// whether it matched, and every wrong character typed there before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub char: char,
    pub correct: bool,
    pub previous_attempts: Vec<char>,
}

impl AttemptRecord {
    fn correct(c: char) -> Self {
        Self {
            char: c,
            correct: true,
            previous_attempts: Vec::new(),
        }
    }

    fn incorrect(c: char) -> Self {
        Self {
            char: c,
            correct: false,
            previous_attempts: Vec::new(),
        }
    }

    /// Correct now, but only after at least one miss.
    pub fn was_corrected(&self) -> bool {
        self.correct && !self.previous_attempts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub keystrokes: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    InProgress,
}

/// Result of reconciling one key press against the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// No target text loaded; nothing changed and nothing was counted.
    Ignored,
    /// The key matched and the cursor moved forward.
    Advanced,
    /// The key did not match; the cursor stayed put.
    Mismatch,
    /// Backspace moved the cursor back.
    Retreated,
    /// Counted, but nothing else changed (space mid-word, backspace at start).
    NoEffect,
    /// The final separator was typed; the session is complete.
    Finished,
}

/// Everything one typing session owns: the target words, the cursor, the
/// per-slot attempt records and the raw counters.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    words: Vec<Vec<char>>,
    cursor: Cursor,
    attempts: BTreeMap<Slot, AttemptRecord>,
    counters: Counters,
    started_at: Option<Timestamp>,
    last_keystroke_at: Option<Timestamp>,
}

impl SessionState {
    /// Empty words are dropped; they have no slots to type.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().chars().collect::<Vec<char>>())
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            words,
            ..Self::default()
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.words.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = String> + '_ {
        self.words.iter().map(|w| w.iter().collect())
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn word_len(&self, word: usize) -> usize {
        self.words.get(word).map_or(0, Vec::len)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn phase(&self) -> Phase {
        match self.started_at {
            Some(_) => Phase::InProgress,
            None => Phase::Idle,
        }
    }

    pub fn attempt(&self, slot: Slot) -> Option<&AttemptRecord> {
        self.attempts.get(&slot)
    }

    pub fn attempts(&self) -> &BTreeMap<Slot, AttemptRecord> {
        &self.attempts
    }

    /// The character expected at the cursor: a letter, or the separator once
    /// the word is complete. `None` after the last letter of the last word.
    pub fn expected_char(&self) -> Option<char> {
        let word = self.words.get(self.cursor.word)?;
        match word.get(self.cursor.letter) {
            Some(c) => Some(*c),
            None if self.cursor.word + 1 < self.words.len() => Some(SEPARATOR),
            None => None,
        }
    }

    /// Milliseconds between the first and the latest accepted keystroke.
    pub fn elapsed_ms(&self) -> u64 {
        match (self.started_at, self.last_keystroke_at) {
            (Some(start), Some(last)) => last.saturating_sub(start),
            _ => 0,
        }
    }

    /// Live metrics as of the latest keystroke.
    pub fn metrics(&self) -> Option<Metrics> {
        self.started_at?;
        Metrics::compute(
            self.counters.keystrokes,
            self.counters.errors,
            self.elapsed_ms(),
        )
    }

    /// Reconcile one key press. Each call is a single state transition.
    pub fn apply(&mut self, key: Key, now: Timestamp) -> KeyOutcome {
        if !self.is_loaded() {
            return KeyOutcome::Ignored;
        }
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.last_keystroke_at = Some(now);
        self.counters.keystrokes += 1;

        match key {
            Key::Space => self.separator(),
            Key::Backspace => self.backspace(),
            Key::Char(c) => self.printable(c),
        }
    }

    fn current_word_len(&self) -> usize {
        self.word_len(self.cursor.word)
    }

    fn is_last_word(&self) -> bool {
        self.cursor.word + 1 == self.words.len()
    }

    fn separator(&mut self) -> KeyOutcome {
        if self.cursor.letter < self.current_word_len() {
            return KeyOutcome::NoEffect;
        }
        if self.is_last_word() {
            return KeyOutcome::Finished;
        }
        self.accept(SEPARATOR);
        self.cursor = Cursor::new(self.cursor.word + 1, 0);
        KeyOutcome::Advanced
    }

    fn backspace(&mut self) -> KeyOutcome {
        if self.cursor.letter > 0 {
            self.cursor.letter -= 1;
            self.attempts.remove(&self.cursor.slot());
            KeyOutcome::Retreated
        } else if self.cursor.word > 0 {
            let word = self.cursor.word - 1;
            self.cursor = Cursor::new(word, self.word_len(word));
            self.attempts.remove(&self.cursor.slot());
            KeyOutcome::Retreated
        } else {
            KeyOutcome::NoEffect
        }
    }

    fn printable(&mut self, c: char) -> KeyOutcome {
        let word = &self.words[self.cursor.word];
        if word.get(self.cursor.letter) == Some(&c) {
            self.accept(c);
            self.cursor.letter += 1;
            KeyOutcome::Advanced
        } else {
            self.reject(c);
            self.counters.errors += 1;
            KeyOutcome::Mismatch
        }
    }

    /// Mark the cursor slot correct, keeping any earlier misses as history.
    fn accept(&mut self, c: char) {
        let slot = self.cursor.slot();
        match self.attempts.get_mut(&slot) {
            Some(record) if !record.correct => {
                let missed = record.char;
                record.previous_attempts.push(missed);
                record.char = c;
                record.correct = true;
            }
            _ => {
                self.attempts.insert(slot, AttemptRecord::correct(c));
            }
        }
    }

    fn reject(&mut self, c: char) {
        let slot = self.cursor.slot();
        match self.attempts.get_mut(&slot) {
            Some(record) if !record.correct => {
                let missed = record.char;
                record.previous_attempts.push(missed);
                record.char = c;
            }
            _ => {
                self.attempts.insert(slot, AttemptRecord::incorrect(c));
            }
        }
    }

    /// Per-character correct/incorrect counts over every attempt record.
    /// The standing character counts by its record's outcome; every history
    /// entry counts as incorrect.
    pub fn key_deltas(&self) -> Vec<KeyDelta> {
        let mut tally: BTreeMap<char, (u32, u32)> = BTreeMap::new();
        for record in self.attempts.values() {
            let entry = tally.entry(record.char).or_default();
            if record.correct {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
            for missed in &record.previous_attempts {
                tally.entry(*missed).or_default().1 += 1;
            }
        }
        tally
            .into_iter()
            .map(|(character, (correct, incorrect))| KeyDelta {
                character,
                correct,
                incorrect,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_keys(state: &mut SessionState, keys: &str) -> Vec<KeyOutcome> {
        keys.chars()
            .enumerate()
            .map(|(i, c)| {
                let key = match c {
                    ' ' => Key::Space,
                    '<' => Key::Backspace,
                    c => Key::Char(c),
                };
                state.apply(key, 1_000 + i as u64 * 100)
            })
            .collect()
    }

    #[test]
    fn test_new_drops_empty_words() {
        let state = SessionState::new(["cat", "", "dog"]);
        assert_eq!(state.word_count(), 2);
        assert_eq!(state.words().collect::<Vec<_>>(), vec!["cat", "dog"]);
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_unloaded_is_ignored() {
        let mut state = SessionState::new(Vec::<String>::new());
        assert_eq!(state.apply(Key::Char('a'), 10), KeyOutcome::Ignored);
        assert_eq!(state.counters(), Counters::default());
        assert_eq!(state.started_at(), None);
    }

    #[test]
    fn test_first_keystroke_starts_timer() {
        let mut state = SessionState::new(["cat"]);
        state.apply(Key::Char('c'), 500);
        assert_eq!(state.started_at(), Some(500));
        assert_eq!(state.phase(), Phase::InProgress);
        state.apply(Key::Char('a'), 900);
        assert_eq!(state.started_at(), Some(500));
        assert_eq!(state.elapsed_ms(), 400);
    }

    #[test]
    fn test_match_advances() {
        let mut state = SessionState::new(["cat"]);
        assert_eq!(state.apply(Key::Char('c'), 0), KeyOutcome::Advanced);
        assert_eq!(state.cursor(), Cursor::new(0, 1));
        let record = state.attempt(Slot { word: 0, position: 0 }).unwrap();
        assert_eq!(record, &AttemptRecord::correct('c'));
    }

    #[test]
    fn test_mismatch_holds_cursor_and_counts_error() {
        let mut state = SessionState::new(["cat"]);
        assert_eq!(state.apply(Key::Char('x'), 0), KeyOutcome::Mismatch);
        assert_eq!(state.cursor(), Cursor::new(0, 0));
        assert_eq!(state.counters(), Counters { keystrokes: 1, errors: 1 });
        let record = state.attempt(Slot { word: 0, position: 0 }).unwrap();
        assert!(!record.correct);
        assert_eq!(record.char, 'x');
        assert!(record.previous_attempts.is_empty());
    }

    #[test]
    fn test_repeated_misses_build_history() {
        let mut state = SessionState::new(["cat"]);
        type_keys(&mut state, "xyc");
        let record = state.attempt(Slot { word: 0, position: 0 }).unwrap();
        assert!(record.correct);
        assert_eq!(record.char, 'c');
        assert_eq!(record.previous_attempts, vec!['x', 'y']);
        assert!(record.was_corrected());
        assert_eq!(state.counters(), Counters { keystrokes: 3, errors: 2 });
    }

    #[test]
    fn test_space_mid_word_is_counted_only() {
        let mut state = SessionState::new(["cat", "dog"]);
        type_keys(&mut state, "c");
        assert_eq!(state.apply(Key::Space, 5_000), KeyOutcome::NoEffect);
        assert_eq!(state.cursor(), Cursor::new(0, 1));
        assert_eq!(state.counters(), Counters { keystrokes: 2, errors: 0 });
        assert_eq!(state.attempts().len(), 1);
    }

    #[test]
    fn test_space_at_word_end_advances_with_separator_record() {
        let mut state = SessionState::new(["cat", "dog"]);
        let outcomes = type_keys(&mut state, "cat ");
        assert_eq!(outcomes[3], KeyOutcome::Advanced);
        assert_eq!(state.cursor(), Cursor::new(1, 0));
        let sep = state.attempt(Slot { word: 0, position: 3 }).unwrap();
        assert_eq!(sep, &AttemptRecord::correct(' '));
    }

    #[test]
    fn test_space_on_last_word_finishes() {
        let mut state = SessionState::new(["ab"]);
        let outcomes = type_keys(&mut state, "ab ");
        assert_eq!(
            outcomes,
            vec![
                KeyOutcome::Advanced,
                KeyOutcome::Advanced,
                KeyOutcome::Finished
            ]
        );
        assert_eq!(state.counters().keystrokes, 3);
    }

    #[test]
    fn test_letter_where_separator_expected_is_a_miss() {
        let mut state = SessionState::new(["ab", "cd"]);
        type_keys(&mut state, "abz ");
        assert_eq!(state.cursor(), Cursor::new(1, 0));
        let sep = state.attempt(Slot { word: 0, position: 2 }).unwrap();
        assert!(sep.correct);
        assert_eq!(sep.char, ' ');
        assert_eq!(sep.previous_attempts, vec!['z']);
        assert_eq!(state.counters().errors, 1);
    }

    #[test]
    fn test_backspace_within_word() {
        let mut state = SessionState::new(["cat"]);
        type_keys(&mut state, "ca");
        assert_eq!(state.apply(Key::Backspace, 9_000), KeyOutcome::Retreated);
        assert_eq!(state.cursor(), Cursor::new(0, 1));
        assert!(state.attempt(Slot { word: 0, position: 1 }).is_none());
        assert!(state.attempt(Slot { word: 0, position: 0 }).is_some());
    }

    #[test]
    fn test_backspace_across_separator() {
        let mut state = SessionState::new(["cat", "dog"]);
        type_keys(&mut state, "cat d<");
        assert_eq!(state.cursor(), Cursor::new(1, 0));
        assert!(state.attempt(Slot { word: 1, position: 0 }).is_none());

        assert_eq!(state.apply(Key::Backspace, 9_000), KeyOutcome::Retreated);
        assert_eq!(state.cursor(), Cursor::new(0, 3));
        assert!(state.attempt(Slot { word: 0, position: 3 }).is_none());
        assert_eq!(state.attempts().len(), 3);
    }

    #[test]
    fn test_backspace_at_start_is_counted_noop() {
        let mut state = SessionState::new(["cat"]);
        assert_eq!(state.apply(Key::Backspace, 0), KeyOutcome::NoEffect);
        assert_eq!(state.cursor(), Cursor::default());
        assert_eq!(state.counters(), Counters { keystrokes: 1, errors: 0 });
    }

    #[test]
    fn test_backspace_then_retype_matches_fresh_state() {
        let text = ["cat", "dog", "emu"];
        let typed = "cat dog em";
        for n in 1..=typed.len() {
            let mut with_backspace = SessionState::new(text);
            type_keys(&mut with_backspace, &typed[..n]);
            with_backspace.apply(Key::Backspace, 99_000);

            let mut fresh = SessionState::new(text);
            type_keys(&mut fresh, &typed[..n - 1]);

            assert_eq!(with_backspace.cursor(), fresh.cursor(), "prefix {n}");
            assert_eq!(with_backspace.attempts(), fresh.attempts(), "prefix {n}");
        }
    }

    #[test]
    fn test_keystrokes_increase_by_one_per_key() {
        let mut state = SessionState::new(["cat", "dog"]);
        let mut last = 0;
        for (i, c) in "cx<at  dpog".chars().enumerate() {
            let key = match c {
                ' ' => Key::Space,
                '<' => Key::Backspace,
                c => Key::Char(c),
            };
            state.apply(key, i as u64);
            assert_eq!(state.counters().keystrokes, last + 1);
            last = state.counters().keystrokes;
        }
    }

    #[test]
    fn test_expected_char() {
        let mut state = SessionState::new(["ab", "c"]);
        assert_eq!(state.expected_char(), Some('a'));
        type_keys(&mut state, "ab");
        assert_eq!(state.expected_char(), Some(' '));
        type_keys(&mut state, " c");
        assert_eq!(state.expected_char(), None);
    }

    #[test]
    fn test_metrics_after_keystrokes() {
        let mut state = SessionState::new(["cat"]);
        assert_eq!(state.metrics(), None);
        state.apply(Key::Char('c'), 0);
        state.apply(Key::Char('x'), 6_000);
        state.apply(Key::Char('a'), 12_000);
        // 3 keystrokes over 12s: 0.6 words / 0.2 min = 3 wpm
        let m = state.metrics().unwrap();
        assert_eq!(m.speed, 3);
        assert_eq!(m.accuracy, 67);
        assert_eq!(m.score, 2);
    }

    #[test]
    fn test_key_deltas() {
        let mut state = SessionState::new(["cat", "at"]);
        type_keys(&mut state, "cxat a");
        let deltas = state.key_deltas();
        assert_eq!(
            deltas,
            vec![
                KeyDelta { character: ' ', correct: 1, incorrect: 0 },
                KeyDelta { character: 'a', correct: 2, incorrect: 0 },
                KeyDelta { character: 'c', correct: 1, incorrect: 0 },
                KeyDelta { character: 't', correct: 1, incorrect: 0 },
                KeyDelta { character: 'x', correct: 0, incorrect: 1 },
            ]
        );
    }
}

use crate::{
    keyset::KeySet,
    language::{Language, Lesson},
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

pub const DEFAULT_NUMBER_OF_WORDS: usize = 30;

/// Supplies the words of the next session.
pub trait WordSource {
    fn target_text(&mut self) -> Vec<String>;

    /// Label stored with each session summary.
    fn active_keys(&self) -> String;
}

/// Shuffled words whose letters are all in the selected key set.
#[derive(Debug, Clone)]
pub struct KeySetSource {
    language: Language,
    keys: KeySet,
    number_of_words: usize,
    rng: StdRng,
}

impl KeySetSource {
    pub fn new(language: Language, keys: KeySet, number_of_words: usize) -> Self {
        Self {
            language,
            keys,
            number_of_words,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeySet {
        &mut self.keys
    }

    /// Every word in the list that can be typed with the selected keys.
    pub fn matching_words(&self) -> Vec<&str> {
        self.language
            .words
            .iter()
            .map(String::as_str)
            .filter(|w| self.keys.allows(w))
            .collect()
    }
}

impl WordSource for KeySetSource {
    fn target_text(&mut self) -> Vec<String> {
        let mut words: Vec<String> = self
            .matching_words()
            .into_iter()
            .map(str::to_string)
            .collect();
        words.shuffle(&mut self.rng);
        words.truncate(self.number_of_words);
        words
    }

    fn active_keys(&self) -> String {
        self.keys.label()
    }
}

/// One programming lesson, repeated every session.
#[derive(Debug, Clone)]
pub struct LessonSource {
    language_name: String,
    lesson: Lesson,
}

impl LessonSource {
    pub fn new(language_name: impl Into<String>, lesson: Lesson) -> Self {
        Self {
            language_name: language_name.into(),
            lesson,
        }
    }

    pub fn title(&self) -> String {
        format!("{}: {}", self.language_name, self.lesson.title)
    }
}

impl WordSource for LessonSource {
    fn target_text(&mut self) -> Vec<String> {
        self.lesson.words()
    }

    fn active_keys(&self) -> String {
        self.title()
    }
}

/// A fixed, user-supplied prompt.
#[derive(Debug, Clone)]
pub struct FixedSource {
    words: Vec<String>,
}

impl FixedSource {
    pub fn new(prompt: &str) -> Self {
        Self {
            words: prompt.split_whitespace().map(str::to_string).collect(),
        }
    }
}

impl WordSource for FixedSource {
    fn target_text(&mut self) -> Vec<String> {
        self.words.clone()
    }

    fn active_keys(&self) -> String {
        "custom".to_string()
    }
}

/// The source the application practices from.
#[derive(Debug, Clone)]
pub enum PracticeSource {
    Keys(KeySetSource),
    Lesson(LessonSource),
    Prompt(FixedSource),
}

impl PracticeSource {
    pub fn key_set_mut(&mut self) -> Option<&mut KeySet> {
        match self {
            PracticeSource::Keys(source) => Some(source.keys_mut()),
            _ => None,
        }
    }

    pub fn key_set(&self) -> Option<&KeySet> {
        match self {
            PracticeSource::Keys(source) => Some(source.keys()),
            _ => None,
        }
    }
}

impl WordSource for PracticeSource {
    fn target_text(&mut self) -> Vec<String> {
        match self {
            PracticeSource::Keys(s) => s.target_text(),
            PracticeSource::Lesson(s) => s.target_text(),
            PracticeSource::Prompt(s) => s.target_text(),
        }
    }

    fn active_keys(&self) -> String {
        match self {
            PracticeSource::Keys(s) => s.active_keys(),
            PracticeSource::Lesson(s) => s.active_keys(),
            PracticeSource::Prompt(s) => s.active_keys(),
        }
    }
}

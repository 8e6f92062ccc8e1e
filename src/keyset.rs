use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const ALPHABET: [char; 26] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Beginner set: the first keys a learner practices.
pub const DEFAULT_KEYS: [char; 6] = ['e', 'n', 'i', 'a', 'r', 'l'];

/// Letters selected for practice, in selection order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct KeySet {
    keys: Vec<char>,
}

impl Default for KeySet {
    fn default() -> Self {
        Self {
            keys: DEFAULT_KEYS.to_vec(),
        }
    }
}

impl KeySet {
    /// Letters outside `a..=z` are dropped; an empty result falls back to the
    /// default set.
    pub fn parse(s: &str) -> Self {
        let keys: Vec<char> = s
            .chars()
            .map(|c| c.to_ascii_lowercase())
            .filter(|c| c.is_ascii_lowercase())
            .unique()
            .collect();
        if keys.is_empty() {
            Self::default()
        } else {
            Self { keys }
        }
    }

    pub fn all() -> Self {
        Self {
            keys: ALPHABET.to_vec(),
        }
    }

    pub fn keys(&self) -> &[char] {
        &self.keys
    }

    pub fn contains(&self, c: char) -> bool {
        self.keys.contains(&c)
    }

    pub fn is_all(&self) -> bool {
        self.keys.len() == ALPHABET.len()
    }

    /// Add or remove a letter. The last remaining letter cannot be removed.
    /// Returns whether the set changed.
    pub fn toggle(&mut self, c: char) -> bool {
        let c = c.to_ascii_lowercase();
        if !c.is_ascii_lowercase() {
            return false;
        }
        if let Some(pos) = self.keys.iter().position(|k| *k == c) {
            if self.keys.len() == 1 {
                return false;
            }
            self.keys.remove(pos);
        } else {
            self.keys.push(c);
        }
        true
    }

    /// Switch between the full alphabet and the default set.
    pub fn toggle_all(&mut self) {
        *self = if self.is_all() {
            Self::default()
        } else {
            Self::all()
        };
    }

    /// True when every letter of `word` is selected.
    pub fn allows(&self, word: &str) -> bool {
        word.chars().all(|c| self.contains(c))
    }

    /// Comma-separated, e.g. `e, n, i`.
    pub fn label(&self) -> String {
        self.keys.iter().join(", ")
    }
}

impl From<String> for KeySet {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<KeySet> for String {
    fn from(k: KeySet) -> Self {
        k.keys.into_iter().collect()
    }
}

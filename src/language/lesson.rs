use super::core::read_embedded;
use crate::error::LanguageError;
use serde::Deserialize;

const CATALOGUE_FILE: &str = "lessons.json";

/// A programming language and its lessons.
#[derive(Deserialize, Clone, Debug)]
pub struct LessonLanguage {
    pub id: String,
    pub name: String,
    pub description: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Lesson {
    pub title: String,
    pub content: String,
}

impl Lesson {
    /// Lesson text as words; line breaks and indentation collapse to single
    /// separators.
    pub fn words(&self) -> Vec<String> {
        self.content.split_whitespace().map(str::to_string).collect()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct LessonCatalogue {
    pub languages: Vec<LessonLanguage>,
}

impl LessonCatalogue {
    pub fn load() -> Result<Self, LanguageError> {
        Ok(serde_json::from_str(read_embedded(CATALOGUE_FILE)?)?)
    }

    pub fn language(&self, id: &str) -> Option<&LessonLanguage> {
        self.languages
            .iter()
            .find(|l| l.id.eq_ignore_ascii_case(id))
    }

    /// Case-insensitive substring match on language names.
    pub fn search(&self, term: &str) -> Vec<&LessonLanguage> {
        let term = term.to_lowercase();
        self.languages
            .iter()
            .filter(|l| l.name.to_lowercase().contains(&term))
            .collect()
    }

    /// Resolve `id` or `id:N` (1-based lesson number, default 1). An id that
    /// matches no language falls back to a name search with a single hit.
    pub fn resolve(&self, selector: &str) -> Result<(&LessonLanguage, &Lesson), LanguageError> {
        let (id, number) = match selector.split_once(':') {
            Some((id, n)) => (id, n.parse::<usize>().ok()),
            None => (selector, Some(1)),
        };
        let unknown = || LanguageError::UnknownLesson(selector.to_string());
        let language = self
            .language(id)
            .or_else(|| match self.search(id).as_slice() {
                [only] => Some(*only),
                _ => None,
            })
            .ok_or_else(unknown)?;
        let index = number.and_then(|n| n.checked_sub(1)).ok_or_else(unknown)?;
        let lesson = language.lessons.get(index).ok_or_else(unknown)?;
        Ok((language, lesson))
    }
}

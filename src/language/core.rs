use crate::error::LanguageError;
use include_dir::{include_dir, Dir};
use serde::Deserialize;
use serde_json::from_str;

pub(crate) static LANG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/lang");

/// A word list bundled with the binary.
#[derive(Deserialize, Clone, Debug)]
pub struct Language {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

impl Language {
    pub fn new(name: &str) -> Result<Self, LanguageError> {
        let json = read_embedded(&format!("{name}.json"))?;
        Ok(from_str(json)?)
    }

    pub fn english() -> Result<Self, LanguageError> {
        Self::new("english")
    }
}

pub(crate) fn read_embedded(file_name: &str) -> Result<&'static str, LanguageError> {
    let file = LANG_DIR
        .get_file(file_name)
        .ok_or_else(|| LanguageError::NotFound(file_name.to_string()))?;
    file.contents_utf8()
        .ok_or_else(|| LanguageError::NotUtf8(file_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_english() {
        let lang = Language::english().unwrap();

        assert_eq!(lang.name, "english");
        assert!(!lang.words.is_empty());
        assert_eq!(lang.size as usize, lang.words.len());
    }

    #[test]
    fn test_english_words_are_lowercase_letters() {
        let lang = Language::english().unwrap();
        for word in &lang.words {
            assert!(
                word.chars().all(|c| c.is_ascii_lowercase()),
                "unexpected word {word:?}"
            );
        }
    }

    #[test]
    fn test_language_deserialization() {
        let json_data = r#"
        {
            "name": "test",
            "size": 3,
            "words": ["hello", "world", "test"]
        }
        "#;

        let lang: Language = from_str(json_data).expect("Failed to deserialize test language");

        assert_eq!(lang.name, "test");
        assert_eq!(lang.size, 3);
        assert_eq!(lang.words, vec!["hello", "world", "test"]);
    }

    #[test]
    fn test_missing_language() {
        let err = Language::new("klingon").unwrap_err();
        assert!(matches!(err, LanguageError::NotFound(name) if name == "klingon.json"));
    }
}

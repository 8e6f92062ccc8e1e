use crate::app_dirs::AppDirs;
use crate::keyset::KeySet;
use crate::stats::DEFAULT_GOAL_MINUTES;
use crate::word_source::DEFAULT_NUMBER_OF_WORDS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub number_of_words: usize,
    pub selected_keys: KeySet,
    pub current_key: char,
    pub daily_goal_minutes: u32,
    pub session_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            number_of_words: DEFAULT_NUMBER_OF_WORDS,
            selected_keys: KeySet::default(),
            current_key: 'r',
            daily_goal_minutes: DEFAULT_GOAL_MINUTES,
            session_log: false,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("tapwise_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable files yield the defaults.
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "tapwise";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/tapwise`, or the platform data dir without `$HOME`.
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join(APP_NAME))
        } else {
            ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("stats.db"))
    }

    pub fn session_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sessions.csv"))
    }

    pub fn log_file_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("tapwise.log"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.json"))
    }
}

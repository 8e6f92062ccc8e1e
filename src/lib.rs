// Library surface for the binary, headless and integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod keyset;
pub mod language;
pub mod metrics;
pub mod report;
pub mod runtime;
pub mod session;
pub mod session_log;
pub mod stats;
pub mod ui;
pub mod util;
pub mod word_source;

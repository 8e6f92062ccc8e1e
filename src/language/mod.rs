pub mod core;
pub mod lesson;

pub use core::Language;
pub use lesson::{Lesson, LessonCatalogue, LessonLanguage};

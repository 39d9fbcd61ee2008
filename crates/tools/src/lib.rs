//! Lookup collaborators the responders rely on.
//!
//! Currently the lesson library: a pre-extracted lesson document searched by
//! topic, cached once per process.

pub mod lesson_library;

pub use lesson_library::{LessonDocument, LessonLibrary, LessonPage};

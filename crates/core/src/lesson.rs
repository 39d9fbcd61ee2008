//! Lesson source trait: lookup over pre-extracted lesson material.

use crate::error::ResponderError;
use async_trait::async_trait;

#[async_trait]
pub trait LessonSource: Send + Sync {
    /// Case-insensitive lookup. `Ok(None)` means nothing matched;
    /// `Err` means the material itself could not be read.
    async fn search(&self, query: &str) -> std::result::Result<Option<String>, ResponderError>;

    /// Topic names worth suggesting when a lookup misses.
    fn topics(&self) -> &[String];
}

//! Lesson library: topic search over a pre-extracted lesson document.
//!
//! The document is plain text whose pages start with `--- Page N ---` lines.
//! It is read once, on first search, into an immutable [`LessonDocument`]
//! owned by the library. Nothing mutates it afterwards; a restart is the only
//! way to pick up a new document.

use async_trait::async_trait;
use carnaticguru_core::error::ResponderError;
use carnaticguru_core::lesson::LessonSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Lesson metadata marker ("Raagam: Mayamalavagowla").
const RAGA_MARKER: &str = "raagam";
/// Scale marker present on full lesson pages.
const SCALE_MARKER: &str = "aarohana";
/// Separator between exercise lines.
const EXERCISE_MARKER: &str = "||";
/// Table-of-contents pages mention every topic; skip them in the fallback pass.
const CONTENTS_MARKER: &str = "Contents";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonPage {
    pub number: usize,
    pub text: String,
}

/// The parsed document.
#[derive(Debug, Clone, Default)]
pub struct LessonDocument {
    pages: Vec<LessonPage>,
}

impl LessonDocument {
    /// Split on `--- Page N ---` lines. Text before the first marker becomes
    /// page 0; a document without markers is a single page.
    pub fn parse(text: &str) -> Self {
        let mut pages = Vec::new();
        let mut current = LessonPage {
            number: 0,
            text: String::new(),
        };

        for line in text.lines() {
            if let Some(number) = page_marker(line) {
                if !current.text.trim().is_empty() {
                    pages.push(current);
                }
                current = LessonPage {
                    number,
                    text: String::new(),
                };
                continue;
            }
            current.text.push_str(line);
            current.text.push('\n');
        }
        if !current.text.trim().is_empty() {
            pages.push(current);
        }

        Self { pages }
    }

    pub fn pages(&self) -> &[LessonPage] {
        &self.pages
    }

    /// Two passes over the pages whose text contains `query`
    /// (case-insensitive):
    /// 1. a full lesson page (raga, scale and exercise markers), cut to `max_chars`
    /// 2. any exercise page with a raga marker that is not a contents page,
    ///    cut to `fallback_chars`
    pub fn search(&self, query: &str, max_chars: usize, fallback_chars: usize) -> Option<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let matching: Vec<(&LessonPage, String)> = self
            .pages
            .iter()
            .map(|p| (p, p.text.to_lowercase()))
            .filter(|(_, lower)| lower.contains(&needle))
            .collect();

        let full = matching.iter().find(|(page, lower)| {
            lower.contains(RAGA_MARKER)
                && lower.contains(SCALE_MARKER)
                && page.text.contains(EXERCISE_MARKER)
        });
        if let Some((page, _)) = full {
            debug!(page = page.number, "Lesson page matched");
            return Some(truncate_chars(&page.text, max_chars));
        }

        let fallback = matching.iter().find(|(page, lower)| {
            lower.contains(RAGA_MARKER)
                && page.text.contains(EXERCISE_MARKER)
                && !page.text.contains(CONTENTS_MARKER)
        });
        fallback.map(|(page, _)| {
            debug!(page = page.number, "Lesson page matched on fallback pass");
            truncate_chars(&page.text, fallback_chars)
        })
    }
}

fn page_marker(line: &str) -> Option<usize> {
    line.trim()
        .strip_prefix("--- Page ")?
        .strip_suffix(" ---")?
        .trim()
        .parse()
        .ok()
}

/// Cut at a character boundary, never inside a multi-byte symbol.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

enum DocumentSource {
    File(PathBuf),
    Inline(String),
}

pub struct LessonLibrary {
    source: DocumentSource,
    max_chars: usize,
    fallback_chars: usize,
    topics: Vec<String>,
    document: OnceCell<Arc<LessonDocument>>,
}

impl LessonLibrary {
    /// A library backed by a text file, read lazily on first search.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::with_source(DocumentSource::File(path.into()))
    }

    /// A library over text already in memory.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::with_source(DocumentSource::Inline(text.into()))
    }

    fn with_source(source: DocumentSource) -> Self {
        Self {
            source,
            max_chars: 2000,
            fallback_chars: 1500,
            topics: Vec::new(),
            document: OnceCell::new(),
        }
    }

    pub fn with_limits(mut self, max_chars: usize, fallback_chars: usize) -> Self {
        self.max_chars = max_chars;
        self.fallback_chars = fallback_chars;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// The parsed document, loading it on first use.
    pub async fn document(&self) -> Result<Arc<LessonDocument>, ResponderError> {
        self.document
            .get_or_try_init(|| async {
                let text = match &self.source {
                    DocumentSource::Inline(text) => text.clone(),
                    DocumentSource::File(path) => {
                        tokio::fs::read_to_string(path).await.map_err(|e| {
                            warn!(path = %path.display(), error = %e, "Lesson document unreadable");
                            ResponderError::LessonUnavailable(format!(
                                "{}: {e}",
                                path.display()
                            ))
                        })?
                    }
                };
                let document = LessonDocument::parse(&text);
                info!(pages = document.pages().len(), "Lesson document loaded");
                Ok(Arc::new(document))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl LessonSource for LessonLibrary {
    async fn search(&self, query: &str) -> Result<Option<String>, ResponderError> {
        let document = self.document().await?;
        Ok(document.search(query, self.max_chars, self.fallback_chars))
    }

    fn topics(&self) -> &[String] {
        &self.topics
    }
}

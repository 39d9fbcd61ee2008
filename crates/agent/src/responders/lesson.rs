//! Lesson responder: returns lesson material verbatim.
//!
//! The text found by the lesson source is passed through untouched except
//! for the `||` exercise separators, which become line breaks.

use async_trait::async_trait;
use carnaticguru_core::error::{ResponderError, Result};
use carnaticguru_core::lesson::LessonSource;
use carnaticguru_core::responder::{Answer, Reply, Responder, ResponderKind, ResponderRequest};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const SEPARATOR: &str = "||";

pub struct LessonResponder {
    source: Arc<dyn LessonSource>,
}

impl LessonResponder {
    pub fn new(source: Arc<dyn LessonSource>) -> Self {
        Self { source }
    }

    /// Search terms in the order they are tried. An explicit `topic` field
    /// is used alone; otherwise known topics named in the query come first,
    /// then the query itself.
    fn candidates(&self, request: &ResponderRequest) -> Vec<String> {
        if let Some(topic) = request.field_str("topic") {
            return vec![topic.to_string()];
        }
        let lowered = request.query.to_lowercase();
        let mut out: Vec<String> = self
            .source
            .topics()
            .iter()
            .filter(|t| lowered.contains(&t.to_lowercase()))
            .cloned()
            .collect();
        let query = request.query.trim();
        if !query.is_empty() {
            out.push(query.to_string());
        }
        out
    }
}

#[async_trait]
impl Responder for LessonResponder {
    fn kind(&self) -> ResponderKind {
        ResponderKind::Lesson
    }

    async fn respond(&self, request: ResponderRequest) -> Result<Reply> {
        for candidate in self.candidates(&request) {
            if let Some(text) = self.source.search(&candidate).await? {
                debug!(topic = %candidate, chars = text.chars().count(), "Lesson found");
                return Ok(Answer::text(normalize_lesson_text(&text))
                    .with_data(json!({ "topic": candidate }))
                    .into());
            }
        }
        Err(ResponderError::LessonNotFound {
            query: request.query.trim().to_string(),
            suggestions: self.source.topics().to_vec(),
        }
        .into())
    }
}

/// Replace each `||` with a line break, dropping only the spaces and tabs
/// that pad the separator.
pub fn normalize_lesson_text(text: &str) -> String {
    let segments: Vec<&str> = text.split(SEPARATOR).collect();
    let last = segments.len().saturating_sub(1);
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let mut s = *segment;
            if i > 0 {
                s = s.trim_start_matches([' ', '\t']);
            }
            if i < last {
                s = s.trim_end_matches([' ', '\t']);
            }
            s
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! Raga information responder.
//!
//! Answers general raga questions through the language model. When another
//! responder asks for a raga in `swara_pattern` mode the answer narrows to
//! the scale, parsed into `Answer.data`.

use crate::instructions;
use crate::llm::LlmClient;
use async_trait::async_trait;
use carnaticguru_core::error::{ResponderError, Result};
use carnaticguru_core::responder::{Answer, Reply, Responder, ResponderKind, ResponderRequest};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

pub const SWARA_PATTERN_MODE: &str = "swara_pattern";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    General,
    SwaraPattern,
}

pub struct RagaInfoResponder {
    llm: LlmClient,
}

impl RagaInfoResponder {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    async fn general(&self, raga: &str, request: &ResponderRequest) -> Result<Reply> {
        let text = self
            .llm
            .invoke(instructions::RAGA_INFO, &request.query, None)
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ResponderError::RagaNotFound(raga.to_string()).into());
        }
        Ok(Answer::text(text).with_data(json!({ "raga": raga })).into())
    }

    async fn scale(&self, raga: &str) -> Result<Reply> {
        let text = self
            .llm
            .invoke(instructions::RAGA_SCALE, &format!("Raga: {raga}"), None)
            .await?;
        if text.trim().is_empty() {
            return Err(ResponderError::RagaNotFound(raga.to_string()).into());
        }

        let (arohanam, avarohanam, notes) = parse_scale(&text);
        if arohanam.is_empty() || avarohanam.is_empty() {
            warn!(raga, "Scale reply is missing a direction");
        }
        debug!(
            raga,
            arohanam = arohanam.len(),
            avarohanam = avarohanam.len(),
            "Scale parsed"
        );

        let answer = Answer::text(format!(
            "Arohanam: {}\nAvarohanam: {}",
            arohanam.join(" "),
            avarohanam.join(" ")
        ))
        .with_data(json!({
            "raga": raga,
            "arohanam": arohanam,
            "avarohanam": avarohanam,
            "notes": notes,
        }));
        Ok(answer.into())
    }
}

#[async_trait]
impl Responder for RagaInfoResponder {
    fn kind(&self) -> ResponderKind {
        ResponderKind::RagaInfo
    }

    async fn respond(&self, request: ResponderRequest) -> Result<Reply> {
        let raga = request
            .field_str("raga")
            .map(str::to_string)
            .unwrap_or_else(|| request.query.trim().to_string());
        let mode = match request.field_str("mode") {
            Some(SWARA_PATTERN_MODE) => Mode::SwaraPattern,
            _ => Mode::General,
        };

        match mode {
            Mode::General => self.general(&raga, &request).await,
            Mode::SwaraPattern => self.scale(&raga).await,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Notes {
    List(Vec<String>),
    Text(String),
}

impl Notes {
    fn into_symbols(self) -> Vec<String> {
        match self {
            Self::List(items) => items
                .into_iter()
                .flat_map(|item| split_symbols(&item))
                .collect(),
            Self::Text(text) => split_symbols(&text),
        }
    }
}

#[derive(Deserialize)]
struct ScaleReply {
    #[serde(default)]
    arohanam: Option<Notes>,
    #[serde(default)]
    avarohanam: Option<Notes>,
    #[serde(default)]
    notes: Option<Notes>,
}

/// Pull arohanam, avarohanam and the raw note text out of a model reply.
///
/// The reply is read as a JSON object first (the outermost `{...}`), and
/// otherwise as `Arohanam: ...` / `Avarohanam: ...` lines. Missing
/// directions come back empty.
pub fn parse_scale(text: &str) -> (Vec<String>, Vec<String>, Option<String>) {
    if let Some(parsed) = parse_json_scale(text) {
        return parsed;
    }

    let mut arohanam = Vec::new();
    let mut avarohanam = Vec::new();
    for line in text.lines() {
        let line = line.trim_start_matches(['*', '-', '#', ' ', '\t']);
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim_matches(['*', ' ']).to_lowercase();
        let value = value.trim_matches(|c: char| c == '*' || c.is_whitespace());
        if key.contains("avaroha") {
            avarohanam = split_symbols(value);
        } else if key.contains("aroha") {
            arohanam = split_symbols(value);
        }
    }
    (arohanam, avarohanam, None)
}

fn parse_json_scale(text: &str) -> Option<(Vec<String>, Vec<String>, Option<String>)> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let reply: ScaleReply = serde_json::from_str(&text[start..=end]).ok()?;
    let notes = reply
        .notes
        .map(|n| match n {
            Notes::Text(t) => t.trim().to_string(),
            Notes::List(items) => items.join(" "),
        })
        .filter(|n| !n.is_empty());
    Some((
        reply.arohanam.map(Notes::into_symbols).unwrap_or_default(),
        reply.avarohanam.map(Notes::into_symbols).unwrap_or_default(),
        notes,
    ))
}

fn split_symbols(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

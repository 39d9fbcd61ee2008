//! Swara pattern responder.
//!
//! Never talks to the model itself: it asks the orchestrator to fetch the
//! raga's scale from the raga info responder, then builds patterns from the
//! returned arohanam and avarohanam in [`PROCESS_RAGA_INFO`].

use crate::pattern::{PatternSynthesizer, format_patterns};
use crate::responders::raga_info::{SWARA_PATTERN_MODE, parse_scale};
use async_trait::async_trait;
use carnaticguru_core::error::{ResponderError, Result, RoutingError};
use carnaticguru_core::raga::Raga;
use carnaticguru_core::responder::{
    Answer, Reply, Responder, ResponderKind, ResponderRequest, ToolCallDescriptor,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Callback invoked with the raga info answer.
pub const PROCESS_RAGA_INFO: &str = "process_raga_info";

pub struct SwaraPatternResponder {
    synthesizer: Arc<PatternSynthesizer>,
    lengths: Vec<usize>,
}

impl SwaraPatternResponder {
    pub fn new(synthesizer: Arc<PatternSynthesizer>, lengths: Vec<usize>) -> Self {
        Self {
            synthesizer,
            lengths,
        }
    }

    fn patterns_for(&self, raga: &Raga) -> Result<Reply> {
        let alphabet = raga.alphabet()?;
        let patterns = self.synthesizer.generate(&alphabet, &self.lengths)?;
        debug!(
            raga = %raga.name,
            alphabet = alphabet.len(),
            lengths = ?self.lengths,
            "Patterns generated"
        );
        Ok(Answer::text(format_patterns(&patterns)).into())
    }
}

#[async_trait]
impl Responder for SwaraPatternResponder {
    fn kind(&self) -> ResponderKind {
        ResponderKind::SwaraPattern
    }

    async fn respond(&self, request: ResponderRequest) -> Result<Reply> {
        let Some(raga) = request.field_str("raga") else {
            return Ok(Answer::text(ResponderError::MissingRagaName.user_message()).into());
        };

        Ok(Reply::ToolCall(ToolCallDescriptor {
            target: ResponderKind::RagaInfo,
            input: ResponderRequest::new(raga)
                .with_field("raga", raga)
                .with_field("mode", SWARA_PATTERN_MODE),
            callback: PROCESS_RAGA_INFO.to_string(),
        }))
    }

    async fn resume(
        &self,
        callback: &str,
        origin: &ResponderRequest,
        result: Answer,
    ) -> Result<Reply> {
        if callback != PROCESS_RAGA_INFO {
            return Err(RoutingError::ToolResolution(format!(
                "{} has no callback '{callback}'",
                self.kind().agent_name()
            ))
            .into());
        }

        let (arohanam, avarohanam) = match &result.data {
            Some(data) => (symbols(data, "arohanam"), symbols(data, "avarohanam")),
            None => {
                let (a, d, _) = parse_scale(&result.text);
                (a, d)
            }
        };
        let name = origin.field_str("raga").unwrap_or_default();
        let raga = Raga::new(name, arohanam, avarohanam);
        if !raga.is_complete() {
            return Ok(Answer::text(ResponderError::RagaInfoIncomplete.user_message()).into());
        }
        self.patterns_for(&raga)
    }
}

fn symbols(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::DEFAULT_LENGTHS;
    use carnaticguru_core::error::Error;
    use serde_json::json;

    fn responder() -> SwaraPatternResponder {
        SwaraPatternResponder::new(
            Arc::new(PatternSynthesizer::seeded(7)),
            DEFAULT_LENGTHS.to_vec(),
        )
    }

    fn answer_text(reply: Reply) -> String {
        match reply {
            Reply::Answer(answer) => answer.text,
            Reply::ToolCall(call) => panic!("unexpected tool call: {call:?}"),
        }
    }

    #[tokio::test]
    async fn scenario_missing_raga_answers_directly() {
        let reply = responder().respond(ResponderRequest::default()).await.unwrap();
        assert_eq!(answer_text(reply), "Error: Missing raga name.");
    }

    #[tokio::test]
    async fn raga_emits_tool_call() {
        let reply = responder()
            .respond(ResponderRequest::new("patterns for Mohanam").with_field("raga", "Mohanam"))
            .await
            .unwrap();
        let Reply::ToolCall(call) = reply else {
            panic!("expected a tool call");
        };
        assert_eq!(call.target, ResponderKind::RagaInfo);
        assert_eq!(call.callback, PROCESS_RAGA_INFO);
        assert_eq!(call.input.field_str("raga"), Some("Mohanam"));
        assert_eq!(call.input.field_str("mode"), Some(SWARA_PATTERN_MODE));
    }

    #[tokio::test]
    async fn scenario_empty_arohanam_is_incomplete() {
        let result = Answer::text("Arohanam: \nAvarohanam: P M G R S").with_data(json!({
            "arohanam": [],
            "avarohanam": ["P", "M", "G", "R", "S"],
        }));
        let reply = responder()
            .resume(PROCESS_RAGA_INFO, &ResponderRequest::default(), result)
            .await
            .unwrap();
        assert_eq!(answer_text(reply), "Raga information incomplete.");
    }

    #[tokio::test]
    async fn callback_formats_one_line_per_length() {
        let result = Answer::text("").with_data(json!({
            "arohanam": ["S", "R", "G", "M", "P"],
            "avarohanam": ["P", "M", "G", "R", "S"],
        }));
        let text = answer_text(
            responder()
                .resume(PROCESS_RAGA_INFO, &ResponderRequest::default(), result)
                .await
                .unwrap(),
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        for (line, len) in lines.iter().zip(DEFAULT_LENGTHS) {
            let (prefix, pattern) = line.split_once(": ").unwrap();
            assert_eq!(prefix, format!("{len}-swars"));
            let notes: Vec<&str> = pattern.split(' ').collect();
            assert_eq!(notes.len(), len);
            assert!(notes.iter().all(|n| ["S", "R", "G", "M", "P"].contains(n)));
        }
    }

    #[tokio::test]
    async fn callback_parses_text_without_data() {
        let result = Answer::text("Arohanam: S R G P D\nAvarohanam: D P G R S");
        let text = answer_text(
            responder()
                .resume(PROCESS_RAGA_INFO, &ResponderRequest::default(), result)
                .await
                .unwrap(),
        );
        assert!(text.starts_with("5-swars: "));
    }

    #[tokio::test]
    async fn configured_lengths_are_used() {
        let responder =
            SwaraPatternResponder::new(Arc::new(PatternSynthesizer::seeded(1)), vec![12, 3]);
        let result = Answer::text("").with_data(json!({
            "arohanam": ["S", "G", "P"],
            "avarohanam": ["P", "G", "S"],
        }));
        let text = answer_text(
            responder
                .resume(PROCESS_RAGA_INFO, &ResponderRequest::default(), result)
                .await
                .unwrap(),
        );
        let prefixes: Vec<&str> = text.lines().map(|l| l.split(':').next().unwrap()).collect();
        assert_eq!(prefixes, vec!["3-swars", "12-swars"]);
    }

    #[tokio::test]
    async fn unknown_callback_is_resolution_error() {
        let err = responder()
            .resume("process_lesson", &ResponderRequest::default(), Answer::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Routing(RoutingError::ToolResolution(_))
        ));
    }
}

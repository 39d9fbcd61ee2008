//! Responder trait: the uniform capability every specialized agent implements.
//!
//! A responder either answers directly or hands back a [`ToolCallDescriptor`]
//! asking the orchestrator to run another responder first and feed its answer
//! into a named callback. Responders never call each other directly.

use crate::error::{Result, RoutingError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of responders. New responders extend this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderKind {
    Lesson,
    RagaInfo,
    SwaraPattern,
}

impl ResponderKind {
    pub const ALL: [ResponderKind; 3] = [Self::Lesson, Self::RagaInfo, Self::SwaraPattern];

    /// Agent name recorded as the author of answer events.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Self::Lesson => "BasicLessonAgent",
            Self::RagaInfo => "RagaInfoAgent",
            Self::SwaraPattern => "SwaraPatternAgent",
        }
    }

    /// Session state key a top-level answer from this responder is stored under.
    pub fn output_key(&self) -> Option<&'static str> {
        match self {
            Self::RagaInfo => Some("raga_info"),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.agent_name())
    }
}

impl std::str::FromStr for ResponderKind {
    type Err = RoutingError;

    /// Accepts either the snake_case tag or the agent name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lesson" | "BasicLessonAgent" => Ok(Self::Lesson),
            "raga_info" | "RagaInfoAgent" => Ok(Self::RagaInfo),
            "swara_pattern" | "SwaraPatternAgent" => Ok(Self::SwaraPattern),
            other => Err(RoutingError::ToolResolution(format!(
                "unknown responder '{other}'"
            ))),
        }
    }
}

/// Structured input to a responder: free text plus named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponderRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl ResponderRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// A non-blank string field, trimmed.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A final answer. `data` carries structured output for callbacks
/// (for example a parsed raga scale).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Answer {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A request to run `target` with `input`, then resume the emitting
/// responder at `callback` with the target's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDescriptor {
    #[serde(rename = "tool")]
    pub target: ResponderKind,
    #[serde(rename = "tool_input")]
    pub input: ResponderRequest,
    pub callback: String,
}

/// What a responder produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Answer(Answer),
    ToolCall(ToolCallDescriptor),
}

impl From<Answer> for Reply {
    fn from(answer: Answer) -> Self {
        Self::Answer(answer)
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    fn kind(&self) -> ResponderKind;

    /// Handle a request dispatched by the orchestrator or by a tool call.
    async fn respond(&self, request: ResponderRequest) -> Result<Reply>;

    /// Continue after a tool call this responder emitted has been answered.
    ///
    /// `origin` is the request that produced the tool call.
    async fn resume(
        &self,
        callback: &str,
        _origin: &ResponderRequest,
        _result: Answer,
    ) -> Result<Reply> {
        Err(RoutingError::ToolResolution(format!(
            "{} has no callback '{callback}'",
            self.kind().agent_name()
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Echo;

    #[async_trait]
    impl Responder for Echo {
        fn kind(&self) -> ResponderKind {
            ResponderKind::Lesson
        }

        async fn respond(&self, request: ResponderRequest) -> Result<Reply> {
            Ok(Answer::text(request.query).into())
        }
    }

    #[tokio::test]
    async fn default_resume_is_a_resolution_error() {
        let err = Echo
            .resume("process_raga_info", &ResponderRequest::default(), Answer::default())
            .await
            .unwrap_err();
        match err {
            Error::Routing(RoutingError::ToolResolution(msg)) => {
                assert!(msg.contains("BasicLessonAgent"));
                assert!(msg.contains("process_raga_info"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn kind_parses_tag_and_agent_name() {
        assert_eq!("raga_info".parse::<ResponderKind>().unwrap(), ResponderKind::RagaInfo);
        assert_eq!(
            "SwaraPatternAgent".parse::<ResponderKind>().unwrap(),
            ResponderKind::SwaraPattern
        );
        assert!("ShellAgent".parse::<ResponderKind>().is_err());
    }

    #[test]
    fn only_raga_info_has_output_key() {
        assert_eq!(ResponderKind::RagaInfo.output_key(), Some("raga_info"));
        assert_eq!(ResponderKind::Lesson.output_key(), None);
        assert_eq!(ResponderKind::SwaraPattern.output_key(), None);
    }

    #[test]
    fn field_str_ignores_blank_values() {
        let req = ResponderRequest::new("q")
            .with_field("raga", "  Kalyani ")
            .with_field("mode", "")
            .with_field("count", 3);
        assert_eq!(req.field_str("raga"), Some("Kalyani"));
        assert_eq!(req.field_str("mode"), None);
        assert_eq!(req.field_str("count"), None);
        assert_eq!(req.field_str("missing"), None);
    }

    #[test]
    fn descriptor_serializes_with_tool_wire_names() {
        let call = ToolCallDescriptor {
            target: ResponderKind::RagaInfo,
            input: ResponderRequest::new("Kalyani").with_field("mode", "swara_pattern"),
            callback: "process_raga_info".into(),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["tool"], "raga_info");
        assert_eq!(json["tool_input"]["fields"]["mode"], "swara_pattern");
        assert_eq!(json["callback"], "process_raga_info");
    }
}

//! The query pipeline: the heart of CarnaticGuru.
//!
//! A learner turn follows a **Classify → Dispatch → Resolve** cycle:
//!
//! 1. **Receive** a query (from the CLI or the gateway) and record it
//! 2. **Classify** it against the lesson / raga / pattern rules
//! 3. **Dispatch** to exactly one responder
//! 4. **If a tool call comes back**: run the target responder, feed its
//!    answer to the named callback, repeat within the hop limit
//! 5. **If an answer comes back**: record it and return it to the learner

pub mod bootstrap;
pub mod classify;
pub mod instructions;
pub mod llm;
pub mod orchestrator;
pub mod pattern;
pub mod responders;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bootstrap::{assemble, build_from_config, open_session_store};
pub use classify::{QueryClassifier, Route};
pub use llm::LlmClient;
pub use orchestrator::{
    FALLBACK_MESSAGE, ORCHESTRATOR_AGENT, Orchestrator, Phase, QUOTA_MESSAGE, QueryReply,
    QueryRequest, Responders, TurnStatus, UNAVAILABLE_MESSAGE, default_session_id,
};
pub use pattern::{DEFAULT_LENGTHS, PatternSet, PatternSynthesizer, format_patterns};
pub use responders::{
    LessonResponder, PROCESS_RAGA_INFO, RagaInfoResponder, SwaraPatternResponder,
    normalize_lesson_text, parse_scale,
};

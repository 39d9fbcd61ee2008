//! The three responders behind the orchestrator.
//!
//! Each one implements [`Responder`](carnaticguru_core::responder::Responder)
//! for a single [`ResponderKind`](carnaticguru_core::responder::ResponderKind).
//! Only the swara pattern responder emits tool calls.

pub mod lesson;
pub mod raga_info;
pub mod swara_pattern;

pub use lesson::{LessonResponder, normalize_lesson_text};
pub use raga_info::{RagaInfoResponder, parse_scale};
pub use swara_pattern::{PROCESS_RAGA_INFO, SwaraPatternResponder};

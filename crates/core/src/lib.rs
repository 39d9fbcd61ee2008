//! # CarnaticGuru Core
//!
//! Domain types, traits, and error definitions for the CarnaticGuru tutoring
//! agents. This crate has no framework dependencies; every other crate
//! implements against the traits defined here.
//!
//! - [`Responder`]: the capability each specialized agent implements
//! - [`SessionStore`]: append-only session persistence
//! - [`Provider`]: the opaque language-model capability
//! - [`LessonSource`]: lookup over lesson material

pub mod error;
pub mod event;
pub mod lesson;
pub mod message;
pub mod provider;
pub mod raga;
pub mod responder;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, ResponderError, Result, RoutingError, SessionError};
pub use event::{DomainEvent, EventBus};
pub use lesson::LessonSource;
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use raga::{NoteAlphabet, Raga};
pub use responder::{Answer, Reply, Responder, ResponderKind, ResponderRequest, ToolCallDescriptor};
pub use session::{Event, Session, SessionKey, SessionStore, SessionSummary, USER_AUTHOR};

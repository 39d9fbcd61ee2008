//! Error types for the CarnaticGuru domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all CarnaticGuru operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Responder errors ---
    #[error("Responder error: {0}")]
    Responder(#[from] ResponderError),

    // --- Routing errors ---
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// The model signalled resource exhaustion (quota or rate limit).
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }

    /// The model could not be reached or answered with a server-side failure.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable(_) | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// Failures raised inside a responder.
///
/// Every variant is recoverable: the orchestrator turns it into an answer
/// via [`ResponderError::user_message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponderError {
    #[error("arohanam or avarohanam is missing")]
    IncompleteRagaData,

    #[error("note alphabet is empty")]
    EmptyAlphabet,

    #[error("no lesson found for '{query}'")]
    LessonNotFound {
        query: String,
        suggestions: Vec<String>,
    },

    #[error("lesson material unavailable: {0}")]
    LessonUnavailable(String),

    #[error("no raga information found for '{0}'")]
    RagaNotFound(String),

    #[error("Missing raga name.")]
    MissingRagaName,

    #[error("Raga information incomplete.")]
    RagaInfoIncomplete,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ResponderError {
    /// The text shown to the learner when this error ends a turn.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingRagaName => "Error: Missing raga name.".into(),
            Self::IncompleteRagaData | Self::EmptyAlphabet | Self::RagaInfoIncomplete => {
                "Raga information incomplete.".into()
            }
            Self::LessonNotFound { query, suggestions } => {
                let quoted: Vec<String> = suggestions.iter().map(|s| format!("'{s}'")).collect();
                format!(
                    "No detailed lesson found for '{query}'. Try: {}",
                    quoted.join(", ")
                )
            }
            Self::LessonUnavailable(_) => "Lesson material is not available right now.".into(),
            Self::RagaNotFound(name) => format!("No raga information found for '{name}'."),
            Self::InvalidRequest(reason) => format!("Error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("query could not be routed: {0}")]
    UnroutableQuery(String),

    #[error("tool call resolution failed: {0}")]
    ToolResolution(String),

    #[error("query timed out after {timeout_secs}s")]
    QueryTimeout { timeout_secs: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("session already exists: {key}")]
    AlreadyExists { key: String },

    #[error("session not found: {key}")]
    NotFound { key: String },

    #[error("persistence failed: {0}")]
    Persistence(String),
}

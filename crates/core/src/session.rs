//! Session model and the `SessionStore` trait.
//!
//! A session is an append-only event log plus a state map, addressed by the
//! (app, user, session) triple. The store owns sessions exclusively; callers
//! hold only keys and snapshots.

use crate::error::SessionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Author tag for events written on behalf of the learner.
pub const USER_AUTHOR: &str = "user";

/// Composite session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// One turn's contribution to a session. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,

    /// `"user"` or the name of the agent that answered.
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Zero-based ordinal, assigned by the store on append.
    #[serde(default)]
    pub position: u64,

    pub timestamp: DateTime<Utc>,

    /// Keys merged into the session state when this event is appended.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state_delta: Map<String, Value>,
}

impl Event {
    pub fn new(author: impl Into<String>, content: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            content,
            position: 0,
            timestamp: Utc::now(),
            state_delta: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(USER_AUTHOR, Some(content.into()))
    }

    pub fn agent(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(author, Some(content.into()))
    }

    pub fn with_state_delta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state_delta.insert(key.into(), value);
        self
    }

    pub fn is_user(&self) -> bool {
        self.author == USER_AUTHOR
    }
}

/// A snapshot of a stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub events: Vec<Event>,
    pub state: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, state: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            key,
            events: Vec::new(),
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign the next position, merge the delta and record the event.
    ///
    /// Shared by store implementations so ordering rules live in one place.
    pub fn apply(&mut self, mut event: Event) -> Event {
        event.position = self.events.len() as u64;
        for (k, v) in &event.state_delta {
            self.state.insert(k.clone(), v.clone());
        }
        self.updated_at = event.timestamp.max(self.updated_at);
        self.events.push(event.clone());
        event
    }

    pub fn last_event(&self) -> Option<&Event> {
        self.events.last()
    }
}

/// Lightweight listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub key: SessionKey,
    pub event_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Durable home of sessions.
///
/// Implementations: in-memory (tests, ephemeral runs) and SQLite.
/// Appends to one key are serialized; reads observe every committed append.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Create a session. Fails with `AlreadyExists` when the key is taken.
    async fn create_session(
        &self,
        key: &SessionKey,
        state: Map<String, Value>,
    ) -> std::result::Result<Session, SessionError>;

    async fn get_session(
        &self,
        key: &SessionKey,
    ) -> std::result::Result<Option<Session>, SessionError>;

    /// Append atomically. Returns the event with its assigned position.
    async fn append_event(
        &self,
        key: &SessionKey,
        event: Event,
    ) -> std::result::Result<Event, SessionError>;

    /// Sessions of one user, most recently updated first.
    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> std::result::Result<Vec<SessionSummary>, SessionError>;

    /// Return the session, creating an empty one when absent.
    async fn get_or_create(&self, key: &SessionKey) -> std::result::Result<Session, SessionError> {
        if let Some(session) = self.get_session(key).await? {
            return Ok(session);
        }
        match self.create_session(key, Map::new()).await {
            Ok(session) => Ok(session),
            // Lost a creation race; the winner's session is what we want.
            Err(SessionError::AlreadyExists { .. }) => {
                self.get_session(key)
                    .await?
                    .ok_or_else(|| SessionError::NotFound {
                        key: key.to_string(),
                    })
            }
            Err(e) => Err(e),
        }
    }
}

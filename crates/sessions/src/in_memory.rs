//! In-memory session store: used by tests and ephemeral runs.

use async_trait::async_trait;
use carnaticguru_core::error::SessionError;
use carnaticguru_core::session::{Event, Session, SessionKey, SessionStore, SessionSummary};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Sessions held in a map; each session sits behind its own lock so appends
/// to one key serialize without blocking other keys.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<Session>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn slot(&self, key: &SessionKey) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(key).cloned()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_session(
        &self,
        key: &SessionKey,
        state: Map<String, Value>,
    ) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            return Err(SessionError::AlreadyExists {
                key: key.to_string(),
            });
        }
        let session = Session::new(key.clone(), state);
        sessions.insert(key.clone(), Arc::new(Mutex::new(session.clone())));
        Ok(session)
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        match self.slot(key).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<Event, SessionError> {
        let slot = self.slot(key).await.ok_or_else(|| SessionError::NotFound {
            key: key.to_string(),
        })?;
        let mut session = slot.lock().await;
        Ok(session.apply(event))
    }

    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        let slots: Vec<Arc<Mutex<Session>>> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.app_name == app_name && k.user_id == user_id)
            .map(|(_, v)| v.clone())
            .collect();

        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            let session = slot.lock().await;
            out.push(SessionSummary {
                key: session.key.clone(),
                event_count: session.events.len(),
                updated_at: session.updated_at,
            });
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }
}

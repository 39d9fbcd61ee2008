//! SQLite session store.
//!
//! Two tables:
//! - `sessions`: one row per (app, user, session) with the JSON state blob
//! - `events`: the append-only log, unique on (key, position)
//!
//! An append reads the next position, inserts the event and merges the state
//! delta inside one `BEGIN IMMEDIATE` transaction, so it either lands
//! completely or not at all. Taking the write lock up front serializes
//! appends across every session key and connection; concurrent writers
//! wait on `busy_timeout` instead of failing a lock upgrade.

use async_trait::async_trait;
use carnaticguru_core::error::SessionError;
use carnaticguru_core::session::{Event, Session, SessionKey, SessionStore, SessionSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if needed) a database file.
    pub async fn open(path: &Path) -> Result<Self, SessionError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Persistence(format!("create {}: {e}", parent.display()))
            })?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .pragma("foreign_keys", "ON");
        let store = Self::connect(options, SqlitePoolOptions::new().max_connections(4)).await?;
        info!("SQLite session store initialized at {}", path.display());
        Ok(store)
    }

    /// An ephemeral database private to this store.
    pub async fn in_memory() -> Result<Self, SessionError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SessionError::Persistence(format!("Invalid SQLite path: {e}")))?
            .pragma("foreign_keys", "ON");
        // The database lives only as long as its single connection.
        let pool_options = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::connect(options, pool_options).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        pool_options: SqlitePoolOptions,
    ) -> Result<Self, SessionError> {
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| SessionError::Persistence(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                app_name    TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                state       TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (app_name, user_id, session_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Persistence(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id           TEXT PRIMARY KEY,
                app_name     TEXT NOT NULL,
                user_id      TEXT NOT NULL,
                session_id   TEXT NOT NULL,
                position     INTEGER NOT NULL,
                author       TEXT NOT NULL,
                content      TEXT,
                state_delta  TEXT NOT NULL DEFAULT '{}',
                timestamp    TEXT NOT NULL,
                UNIQUE (app_name, user_id, session_id, position),
                FOREIGN KEY (app_name, user_id, session_id)
                    REFERENCES sessions (app_name, user_id, session_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Persistence(format!("events table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(app_name, user_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Persistence(format!("sessions index: {e}")))?;

        debug!("SQLite session migrations complete");
        Ok(())
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event, SessionError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| SessionError::Persistence(format!("id column: {e}")))?;
        let author: String = row
            .try_get("author")
            .map_err(|e| SessionError::Persistence(format!("author column: {e}")))?;
        let content: Option<String> = row
            .try_get("content")
            .map_err(|e| SessionError::Persistence(format!("content column: {e}")))?;
        let position: i64 = row
            .try_get("position")
            .map_err(|e| SessionError::Persistence(format!("position column: {e}")))?;
        let delta_json: String = row
            .try_get("state_delta")
            .map_err(|e| SessionError::Persistence(format!("state_delta column: {e}")))?;
        let timestamp: String = row
            .try_get("timestamp")
            .map_err(|e| SessionError::Persistence(format!("timestamp column: {e}")))?;

        Ok(Event {
            id,
            author,
            content,
            position: position as u64,
            timestamp: parse_time(&timestamp)?,
            state_delta: parse_map(&delta_json)?,
        })
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, SessionError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SessionError::Persistence(format!("bad timestamp '{s}': {e}")))
}

fn parse_map(s: &str) -> Result<Map<String, Value>, SessionError> {
    serde_json::from_str(s).map_err(|e| SessionError::Persistence(format!("bad state JSON: {e}")))
}

fn to_json(map: &Map<String, Value>) -> Result<String, SessionError> {
    serde_json::to_string(map).map_err(|e| SessionError::Persistence(format!("encode state: {e}")))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_session(
        &self,
        key: &SessionKey,
        state: Map<String, Value>,
    ) -> Result<Session, SessionError> {
        let session = Session::new(key.clone(), state);
        let now = format_time(session.created_at);

        let result = sqlx::query(
            r#"
            INSERT INTO sessions (app_name, user_id, session_id, state, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (app_name, user_id, session_id) DO NOTHING
            "#,
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .bind(to_json(&session.state)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Persistence(format!("create session: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(SessionError::AlreadyExists {
                key: key.to_string(),
            });
        }
        debug!(session = %key, "Session created");
        Ok(session)
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        // One read transaction, so state and events come from the same snapshot.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SessionError::Persistence(format!("begin: {e}")))?;

        let row = sqlx::query(
            "SELECT state, created_at, updated_at FROM sessions WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| SessionError::Persistence(format!("get session: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state: String = row
            .try_get("state")
            .map_err(|e| SessionError::Persistence(format!("state column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| SessionError::Persistence(format!("created_at column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| SessionError::Persistence(format!("updated_at column: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT id, author, content, position, state_delta, timestamp FROM events
            WHERE app_name = ? AND user_id = ? AND session_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| SessionError::Persistence(format!("load events: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| SessionError::Persistence(format!("commit: {e}")))?;

        let events = rows
            .iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Session {
            key: key.clone(),
            events,
            state: parse_map(&state)?,
            created_at: parse_time(&created_at)?,
            updated_at: parse_time(&updated_at)?,
        }))
    }

    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<Event, SessionError> {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| SessionError::Persistence(format!("begin: {e}")))?;

        let row = sqlx::query(
            r#"
            SELECT s.state AS state, s.updated_at AS updated_at,
                   (SELECT COUNT(*) FROM events e
                     WHERE e.app_name = s.app_name AND e.user_id = s.user_id
                       AND e.session_id = s.session_id) AS event_count
            FROM sessions s
            WHERE s.app_name = ? AND s.user_id = ? AND s.session_id = ?
            "#,
        )
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| SessionError::Persistence(format!("read session: {e}")))?
        .ok_or_else(|| SessionError::NotFound {
            key: key.to_string(),
        })?;

        let state_json: String = row
            .try_get("state")
            .map_err(|e| SessionError::Persistence(format!("state column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| SessionError::Persistence(format!("updated_at column: {e}")))?;
        let event_count: i64 = row
            .try_get("event_count")
            .map_err(|e| SessionError::Persistence(format!("event_count column: {e}")))?;

        let mut state = parse_map(&state_json)?;
        let mut event = event;
        event.position = event_count as u64;
        for (k, v) in &event.state_delta {
            state.insert(k.clone(), v.clone());
        }
        let updated = event.timestamp.max(parse_time(&updated_at)?);

        sqlx::query(
            r#"
            INSERT INTO events (id, app_name, user_id, session_id, position, author, content, state_delta, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .bind(event.position as i64)
        .bind(&event.author)
        .bind(&event.content)
        .bind(to_json(&event.state_delta)?)
        .bind(format_time(event.timestamp))
        .execute(&mut *tx)
        .await
        .map_err(|e| SessionError::Persistence(format!("insert event: {e}")))?;

        sqlx::query(
            "UPDATE sessions SET state = ?, updated_at = ? WHERE app_name = ? AND user_id = ? AND session_id = ?",
        )
        .bind(to_json(&state)?)
        .bind(format_time(updated))
        .bind(&key.app_name)
        .bind(&key.user_id)
        .bind(&key.session_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| SessionError::Persistence(format!("update session: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| SessionError::Persistence(format!("commit: {e}")))?;

        debug!(session = %key, position = event.position, author = %event.author, "Event appended");
        Ok(event)
    }

    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        let rows = sqlx::query(
            r#"
            SELECT s.session_id AS session_id, s.updated_at AS updated_at,
                   (SELECT COUNT(*) FROM events e
                     WHERE e.app_name = s.app_name AND e.user_id = s.user_id
                       AND e.session_id = s.session_id) AS event_count
            FROM sessions s
            WHERE s.app_name = ? AND s.user_id = ?
            ORDER BY s.updated_at DESC
            "#,
        )
        .bind(app_name)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionError::Persistence(format!("list sessions: {e}")))?;

        rows.iter()
            .map(|row| {
                let session_id: String = row
                    .try_get("session_id")
                    .map_err(|e| SessionError::Persistence(format!("session_id column: {e}")))?;
                let updated_at: String = row
                    .try_get("updated_at")
                    .map_err(|e| SessionError::Persistence(format!("updated_at column: {e}")))?;
                let event_count: i64 = row
                    .try_get("event_count")
                    .map_err(|e| SessionError::Persistence(format!("event_count column: {e}")))?;
                Ok(SessionSummary {
                    key: SessionKey::new(app_name, user_id, session_id),
                    event_count: event_count as usize,
                    updated_at: parse_time(&updated_at)?,
                })
            })
            .collect()
    }
}

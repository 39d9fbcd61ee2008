//! The orchestrator: routes a learner query to one responder, resolves any
//! tool calls it emits, and records the turn in the session store.
//!
//! A turn moves through
//! `Idle → Classifying → Dispatched → ResolvingToolCall* → Responding → Idle`.
//! The user event is appended before dispatch and the answer event after
//! resolution, so replaying a session reproduces the exact turn order.
//! [`Orchestrator::handle`] never fails: every error becomes reply text with
//! a [`TurnStatus`].

use crate::classify::{QueryClassifier, Route};
use carnaticguru_core::error::{Error, Result, RoutingError, SessionError};
use carnaticguru_core::event::{DomainEvent, EventBus};
use carnaticguru_core::responder::{Answer, Reply, Responder, ResponderKind, ResponderRequest};
use carnaticguru_core::session::{Event, Session, SessionKey, SessionStore, SessionSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Author of answers produced without a responder.
pub const ORCHESTRATOR_AGENT: &str = "OrchestratorAgent";

pub const QUOTA_MESSAGE: &str = "Sorry, the music knowledge service has reached its usage limit \
for now. Please try again in a little while.";

pub const UNAVAILABLE_MESSAGE: &str = "Sorry, the music knowledge service cannot be reached \
right now. Please try again shortly.";

pub const FALLBACK_MESSAGE: &str = "I can help with Carnatic music lessons (for example \
'Sarali Varisai lesson'), raga information ('Tell me about Kalyani raga') and swara practice \
patterns ('practice patterns for Mohanam').";

/// One responder per kind.
#[derive(Clone)]
pub struct Responders {
    pub lesson: Arc<dyn Responder>,
    pub raga_info: Arc<dyn Responder>,
    pub swara_pattern: Arc<dyn Responder>,
}

impl Responders {
    pub fn get(&self, kind: ResponderKind) -> &Arc<dyn Responder> {
        match kind {
            ResponderKind::Lesson => &self.lesson,
            ResponderKind::RagaInfo => &self.raga_info,
            ResponderKind::SwaraPattern => &self.swara_pattern,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Classifying,
    Dispatched,
    ResolvingToolCall,
    Responding,
}

/// A learner query as it arrives from the CLI or the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl QueryRequest {
    pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            category: None,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// The text the classifier sees: `"[<category>] <query>"` when tagged.
    pub fn presented_query(&self) -> String {
        match self.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => format!("[{category}] {}", self.query),
            _ => self.query.clone(),
        }
    }

    fn resolved_session_id(&self) -> String {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_session_id(&self.user_id))
    }
}

pub fn default_session_id(user_id: &str) -> String {
    format!("{user_id}_session")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// A responder produced the answer.
    Answered,
    /// The query could not be served as asked; the reply guides the learner.
    Fallback,
    /// The language model was out of quota or unreachable.
    Degraded,
    /// The turn failed (timeout, tool resolution, persistence).
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReply {
    pub response: String,
    pub agent_name: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: TurnStatus,
    /// Events stored in the session after this turn.
    pub event_count: u64,
}

/// What a turn produced before it is persisted.
struct TurnOutcome {
    kind: Option<ResponderKind>,
    text: String,
    status: TurnStatus,
}

impl TurnOutcome {
    fn author(&self) -> &'static str {
        self.kind.map_or(ORCHESTRATOR_AGENT, |k| k.agent_name())
    }
}

/// A responder waiting on a tool call it emitted.
struct Frame {
    kind: ResponderKind,
    request: ResponderRequest,
    callback: String,
}

struct PhaseLog<'a> {
    session_id: &'a str,
    phase: Phase,
}

impl<'a> PhaseLog<'a> {
    fn new(session_id: &'a str) -> Self {
        Self {
            session_id,
            phase: Phase::Idle,
        }
    }

    fn enter(&mut self, next: Phase) {
        debug!(session = self.session_id, from = ?self.phase, to = ?next, "Router phase");
        self.phase = next;
    }
}

pub struct Orchestrator {
    app_name: String,
    classifier: QueryClassifier,
    responders: Responders,
    sessions: Arc<dyn SessionStore>,
    event_bus: Arc<EventBus>,
    timeout: Duration,
    max_tool_hops: usize,
}

impl Orchestrator {
    pub fn new(
        app_name: impl Into<String>,
        classifier: QueryClassifier,
        responders: Responders,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            classifier,
            responders,
            sessions,
            event_bus: Arc::new(EventBus::default()),
            timeout: Duration::from_secs(30),
            max_tool_hops: 2,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tool_hops(mut self, max: usize) -> Self {
        self.max_tool_hops = max;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    fn key(&self, user_id: &str, session_id: &str) -> SessionKey {
        SessionKey::new(&self.app_name, user_id, session_id)
    }

    /// Run one learner turn end to end.
    pub async fn handle(&self, request: QueryRequest) -> QueryReply {
        let session_id = request.resolved_session_id();
        let key = self.key(&request.user_id, &session_id);
        let query = request.presented_query();

        info!(user = %request.user_id, session = %session_id, "Query received");
        self.event_bus.publish(DomainEvent::QueryReceived {
            user_id: request.user_id.clone(),
            session_id: session_id.clone(),
            query_preview: query.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        // Positions recorded so far, readable after the turn is abandoned.
        let recorded = AtomicU64::new(0);
        match tokio::time::timeout(
            self.timeout,
            self.complete_turn(&key, &query, &session_id, &recorded),
        )
        .await
        {
            Ok(reply) => reply,
            Err(_) => {
                let err = RoutingError::QueryTimeout {
                    timeout_secs: self.timeout.as_secs(),
                };
                warn!(session = %session_id, error = %err, "Turn abandoned");
                self.publish_error("timeout", &err.to_string());
                // Events already appended stay; no answer is recorded.
                self.reply(
                    &session_id,
                    TurnOutcome {
                        kind: None,
                        text: format!("Error: {err}"),
                        status: TurnStatus::Failed,
                    },
                    recorded.load(Ordering::SeqCst),
                )
            }
        }
    }

    /// Record the query, answer it and record the answer.
    async fn complete_turn(
        &self,
        key: &SessionKey,
        query: &str,
        session_id: &str,
        recorded: &AtomicU64,
    ) -> QueryReply {
        let user_event = match self.record_query(key, query).await {
            Ok(event) => event,
            Err(e) => {
                error!(session = %key, error = %e, "Could not record query");
                self.publish_error("session", &e.to_string());
                return self.reply(
                    session_id,
                    TurnOutcome {
                        kind: None,
                        text: format!("Error: {e}"),
                        status: TurnStatus::Failed,
                    },
                    0,
                );
            }
        };
        recorded.store(user_event.position + 1, Ordering::SeqCst);

        let outcome = self.run_turn(query, session_id).await;

        let mut answer_event = Event::agent(outcome.author(), outcome.text.clone());
        if outcome.status == TurnStatus::Answered {
            if let Some(output_key) = outcome.kind.and_then(|k| k.output_key()) {
                answer_event = answer_event.with_state_delta(output_key, outcome.text.clone().into());
            }
        }

        match self.sessions.append_event(key, answer_event).await {
            Ok(stored) => {
                self.event_bus.publish(DomainEvent::AnswerPersisted {
                    session_id: session_id.to_string(),
                    author: stored.author.clone(),
                    position: stored.position,
                    timestamp: Utc::now(),
                });
                info!(
                    session = %session_id,
                    responder = outcome.author(),
                    status = ?outcome.status,
                    "Turn complete"
                );
                self.reply(session_id, outcome, stored.position + 1)
            }
            Err(e) => {
                error!(session = %key, error = %e, "Could not record answer");
                self.publish_error("session", &e.to_string());
                self.reply(
                    session_id,
                    TurnOutcome {
                        kind: outcome.kind,
                        text: format!("Error: {e}"),
                        status: TurnStatus::Failed,
                    },
                    user_event.position + 1,
                )
            }
        }
    }

    async fn record_query(
        &self,
        key: &SessionKey,
        query: &str,
    ) -> std::result::Result<Event, SessionError> {
        self.sessions.get_or_create(key).await?;
        self.sessions.append_event(key, Event::user(query)).await
    }

    fn reply(&self, session_id: &str, outcome: TurnOutcome, event_count: u64) -> QueryReply {
        QueryReply {
            agent_name: outcome.author().to_string(),
            response: outcome.text,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            status: outcome.status,
            event_count,
        }
    }

    /// Classify, dispatch and resolve. Errors are folded into the outcome.
    async fn run_turn(&self, query: &str, session_id: &str) -> TurnOutcome {
        let mut phase = PhaseLog::new(session_id);
        phase.enter(Phase::Classifying);

        let route = match self.classifier.classify(query) {
            Ok(route) => route,
            Err(e) => {
                phase.enter(Phase::Idle);
                return self.recover(None, e.into());
            }
        };

        let kind = route.kind;
        phase.enter(Phase::Dispatched);
        debug!(session = session_id, responder = %kind, fields = ?route.request.fields, "Dispatching");
        self.event_bus.publish(DomainEvent::ResponderDispatched {
            responder: kind.agent_name().to_string(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        });

        let outcome = match self.dispatch(route, &mut phase).await {
            Ok(answer) => {
                phase.enter(Phase::Responding);
                TurnOutcome {
                    kind: Some(kind),
                    text: answer.text,
                    status: TurnStatus::Answered,
                }
            }
            Err(e) => self.recover(Some(kind), e),
        };
        phase.enter(Phase::Idle);
        outcome
    }

    /// Run the routed responder and resolve tool calls until a top-level
    /// answer remains. Each tool call counts as one hop.
    async fn dispatch(&self, route: Route, phase: &mut PhaseLog<'_>) -> Result<Answer> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut hops = 0usize;
        let mut current = route.kind;
        let mut current_request = route.request;
        let mut reply = self
            .responders
            .get(current)
            .respond(current_request.clone())
            .await?;

        loop {
            match reply {
                Reply::Answer(answer) => {
                    let Some(frame) = stack.pop() else {
                        return Ok(answer);
                    };
                    self.event_bus.publish(DomainEvent::ToolCallResolved {
                        origin: frame.kind.agent_name().to_string(),
                        target: current.agent_name().to_string(),
                        callback: frame.callback.clone(),
                        hops,
                        timestamp: Utc::now(),
                    });
                    debug!(
                        origin = %frame.kind,
                        target = %current,
                        callback = %frame.callback,
                        hops,
                        "Resuming after tool call"
                    );
                    reply = self
                        .responders
                        .get(frame.kind)
                        .resume(&frame.callback, &frame.request, answer)
                        .await?;
                    current = frame.kind;
                    current_request = frame.request;
                }
                Reply::ToolCall(call) => {
                    hops += 1;
                    if hops > self.max_tool_hops {
                        return Err(RoutingError::ToolResolution(format!(
                            "more than {} tool hops",
                            self.max_tool_hops
                        ))
                        .into());
                    }
                    if call.target == current || stack.iter().any(|f| f.kind == call.target) {
                        return Err(RoutingError::ToolResolution(format!(
                            "cycle: {current} calls {}",
                            call.target
                        ))
                        .into());
                    }
                    phase.enter(Phase::ResolvingToolCall);

                    stack.push(Frame {
                        kind: current,
                        request: current_request,
                        callback: call.callback,
                    });
                    current = call.target;
                    current_request = call.input;
                    reply = self
                        .responders
                        .get(current)
                        .respond(current_request.clone())
                        .await?;
                }
            }
        }
    }

    fn recover(&self, kind: Option<ResponderKind>, err: Error) -> TurnOutcome {
        let (text, status) = match &err {
            Error::Responder(e) => (e.user_message(), TurnStatus::Fallback),
            Error::Provider(e) if e.is_quota() => (QUOTA_MESSAGE.to_string(), TurnStatus::Degraded),
            Error::Provider(e) if e.is_unavailable() => {
                (UNAVAILABLE_MESSAGE.to_string(), TurnStatus::Degraded)
            }
            Error::Provider(e) => (format!("Error: {e}"), TurnStatus::Failed),
            Error::Routing(RoutingError::UnroutableQuery(_)) => {
                (FALLBACK_MESSAGE.to_string(), TurnStatus::Fallback)
            }
            Error::Routing(e) => (format!("Error: {e}"), TurnStatus::Failed),
            Error::Session(e) => (format!("Error: {e}"), TurnStatus::Failed),
            other => (format!("Error: {other}"), TurnStatus::Failed),
        };

        match status {
            TurnStatus::Failed | TurnStatus::Degraded => {
                warn!(responder = ?kind, error = %err, "Turn did not complete normally");
            }
            _ => debug!(responder = ?kind, error = %err, "Turn recovered"),
        }
        self.publish_error(
            kind.map_or(ORCHESTRATOR_AGENT, |k| k.agent_name()),
            &err.to_string(),
        );
        TurnOutcome { kind, text, status }
    }

    fn publish_error(&self, context: &str, message: &str) {
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// A stored session; `None` session id means the user's default session.
    pub async fn history(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> std::result::Result<Option<Session>, SessionError> {
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| default_session_id(user_id));
        self.sessions
            .get_session(&self.key(user_id, &session_id))
            .await
    }

    pub async fn sessions_for(
        &self,
        user_id: &str,
    ) -> std::result::Result<Vec<SessionSummary>, SessionError> {
        self.sessions.list_sessions(&self.app_name, user_id).await
    }
}

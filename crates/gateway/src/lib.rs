//! HTTP gateway for CarnaticGuru.
//!
//! A thin JSON surface over the orchestrator: health, the user directory,
//! query submission and session history. Built on Axum.

use axum::extract::{DefaultBodyLimit, Path, Query};
use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, header},
    response::Json,
    routing::{get, post},
};
use carnaticguru_agent::{Orchestrator, QueryReply, QueryRequest, default_session_id};
use carnaticguru_config::{AppConfig, UserDirectory, UserProfile};
use carnaticguru_core::session::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub users: UserDirectory,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/users", get(users_handler))
        .route("/api/query", post(query_handler))
        .route("/api/session/{user_id}", get(session_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let orchestrator = carnaticguru_agent::build_from_config(&config).await?;
    let state = Arc::new(GatewayState {
        orchestrator: Arc::new(orchestrator),
        users: config.user_directory(),
    });

    let app = build_router(state);
    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn users_handler(State(state): State<SharedState>) -> Json<Vec<UserProfile>> {
    Json(state.users.all().to_vec())
}

async fn query_handler(
    State(state): State<SharedState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryReply>, ApiError> {
    if !state.users.contains(&payload.user_id) {
        warn!(user = %payload.user_id, "Query from unknown user");
        return Err(bad_request(format!("Unknown user '{}'", payload.user_id)));
    }
    if payload.query.trim().is_empty() {
        return Err(bad_request("Query must not be empty"));
    }

    info!(user = %payload.user_id, query_len = payload.query.len(), "Query via gateway");
    Ok(Json(state.orchestrator.handle(payload).await))
}

#[derive(Deserialize)]
struct SessionParams {
    session_id: Option<String>,
}

#[derive(Serialize)]
struct HistoryEntry {
    position: u64,
    author: String,
    content: Option<String>,
    timestamp: DateTime<Utc>,
}

impl From<Event> for HistoryEntry {
    fn from(event: Event) -> Self {
        Self {
            position: event.position,
            author: event.author,
            content: event.content,
            timestamp: event.timestamp,
        }
    }
}

#[derive(Serialize)]
struct SessionResponse {
    user_id: String,
    session_id: String,
    events: Vec<HistoryEntry>,
    state: Map<String, Value>,
}

async fn session_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(params): Query<SessionParams>,
) -> Result<Json<SessionResponse>, ApiError> {
    if !state.users.contains(&user_id) {
        return Err(bad_request(format!("Unknown user '{user_id}'")));
    }
    let session_id = params
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_session_id(&user_id));

    let session = state
        .orchestrator
        .history(&user_id, Some(session_id.as_str()))
        .await
        .map_err(|e| {
            error!(user = %user_id, error = %e, "History lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;

    // A session that was never started reads as empty history.
    let (events, session_state) = match session {
        Some(s) => (s.events.into_iter().map(HistoryEntry::from).collect(), s.state),
        None => (Vec::new(), Map::new()),
    };
    Ok(Json(SessionResponse {
        user_id,
        session_id,
        events,
        state: session_state,
    }))
}

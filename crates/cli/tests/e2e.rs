//! End-to-end tests for the CarnaticGuru query pipeline.
//!
//! These run full turns from learner query to stored session: routing,
//! tool-call resolution between responders, lesson lookup from a document
//! on disk, and SQLite persistence across restarts.

use std::sync::Arc;

use carnaticguru_agent::{Orchestrator, QueryRequest, TurnStatus, assemble};
use carnaticguru_config::AppConfig;
use carnaticguru_core::error::ProviderError;
use carnaticguru_core::message::Message;
use carnaticguru_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use carnaticguru_core::session::SessionStore;
use carnaticguru_sessions::SqliteSessionStore;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Replays scripted outcomes in order.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<Result<String, ProviderError>>>,
    call_count: std::sync::Mutex<usize>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            call_count: std::sync::Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        if *count >= responses.len() {
            panic!(
                "ScriptedProvider exhausted: call #{}, have {}",
                *count,
                responses.len()
            );
        }
        let outcome = responses[*count].clone();
        *count += 1;
        outcome.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const LESSON_BOOK: &str = "\
--- Page 1 ---
Contents
Sarali Varisai 2
Janta Varisai 3
--- Page 2 ---
Sarali Varisai
Raagam: Mayamalavagowla  Aarohana: S R1 G3 M1 P D1 N3 S'
s r g m || p d n S' || S' n d p || m g r s
--- Page 3 ---
Janta Varisai
Raagam: Mayamalavagowla
s s r r || g g m m || p p d d
";

const MOHANAM: &str = "```json\n{\"arohanam\": [\"S\", \"R2\", \"G3\", \"P\", \"D2\", \"S'\"], \
\"avarohanam\": [\"S'\", \"D2\", \"P\", \"G3\", \"R2\", \"S\"], \"notes\": \"S R2 G3 P D2\"}\n```";

fn config_in(dir: &std::path::Path) -> AppConfig {
    let lesson_path = dir.join("carnatic_basics.txt");
    std::fs::write(&lesson_path, LESSON_BOOK).unwrap();

    let mut config = AppConfig::default();
    config.sessions.path = Some(dir.join("guru.db"));
    config.lessons.document = Some(lesson_path);
    config.patterns.seed = Some(2024);
    config
}

async fn orchestrator(
    config: &AppConfig,
    provider: Arc<ScriptedProvider>,
) -> (Orchestrator, Arc<SqliteSessionStore>) {
    let store = Arc::new(
        SqliteSessionStore::open(&config.sessions.resolved_path())
            .await
            .unwrap(),
    );
    (assemble(config, provider, store.clone()), store)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_three_responders_in_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(MOHANAM.to_string()),
        Ok("Kalyani is the 65th melakarta. Janya: Yamunakalyani.".to_string()),
    ]));
    let (orch, _store) = orchestrator(&config, provider.clone()).await;

    let lesson = orch
        .handle(QueryRequest::new("learner_1", "Show me the Sarali Varisai lesson"))
        .await;
    assert_eq!(lesson.status, TurnStatus::Answered);
    assert_eq!(lesson.agent_name, "BasicLessonAgent");
    assert!(lesson.response.contains("s r g m\np d n S'\nS' n d p\nm g r s"));
    assert!(!lesson.response.contains("||"));

    let patterns = orch
        .handle(QueryRequest::new("learner_1", "Give me practice patterns for Mohanam"))
        .await;
    assert_eq!(patterns.agent_name, "SwaraPatternAgent");
    let alphabet = ["S", "R2", "G3", "P", "D2", "S'"];
    for (line, len) in patterns.response.lines().zip([5usize, 6, 7, 8]) {
        let (prefix, notes) = line.split_once(": ").unwrap();
        assert_eq!(prefix, format!("{len}-swars"));
        let notes: Vec<&str> = notes.split(' ').collect();
        assert_eq!(notes.len(), len);
        assert!(notes.iter().all(|n| alphabet.contains(n)));
    }

    let raga = orch
        .handle(QueryRequest::new("learner_1", "Tell me about Kalyani raga"))
        .await;
    assert_eq!(raga.agent_name, "RagaInfoAgent");
    assert_eq!(raga.event_count, 6);
    assert_eq!(provider.calls(), 2);

    let session = orch.history("learner_1", None).await.unwrap().unwrap();
    let authors: Vec<&str> = session.events.iter().map(|e| e.author.as_str()).collect();
    assert_eq!(
        authors,
        vec![
            "user",
            "BasicLessonAgent",
            "user",
            "SwaraPatternAgent",
            "user",
            "RagaInfoAgent"
        ]
    );
    assert_eq!(
        session.state.get("raga_info").and_then(|v| v.as_str()),
        Some("Kalyani is the 65th melakarta. Janya: Yamunakalyani.")
    );
}

#[tokio::test]
async fn e2e_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (orch, _store) = orchestrator(&config, provider).await;
        orch.handle(QueryRequest::new("learner_2", "janta lesson").with_session("s1"))
            .await;
        orch.handle(QueryRequest::new("learner_2", "what is this?").with_session("s1"))
            .await;
    }

    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (orch, store) = orchestrator(&config, provider).await;
    let reply = orch
        .handle(QueryRequest::new("learner_2", "sarali lesson").with_session("s1"))
        .await;
    assert_eq!(reply.event_count, 6);

    let session = orch.history("learner_2", Some("s1")).await.unwrap().unwrap();
    let positions: Vec<u64> = session.events.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3, 4, 5]);
    assert!(session.events[1].content.as_deref().unwrap().starts_with("Janta Varisai"));
    assert_eq!(session.events[3].author, "OrchestratorAgent");

    let listed = store.list_sessions(&config.app_name, "learner_2").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].event_count, 6);
}

#[tokio::test]
async fn e2e_quota_is_reported_and_session_continues() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let provider = Arc::new(ScriptedProvider::new(vec![
        Err(ProviderError::QuotaExceeded(
            "RESOURCE_EXHAUSTED: You exceeded your current quota".into(),
        )),
        Ok(MOHANAM.to_string()),
    ]));
    let (orch, _store) = orchestrator(&config, provider).await;

    let first = orch
        .handle(QueryRequest::new("learner_3", "practice patterns for Mohanam"))
        .await;
    assert_eq!(first.status, TurnStatus::Degraded);
    assert!(first.response.contains("usage limit"));

    let second = orch
        .handle(QueryRequest::new("learner_3", "practice patterns for Mohanam"))
        .await;
    assert_eq!(second.status, TurnStatus::Answered);
    assert_eq!(second.response.lines().count(), 4);
    assert_eq!(second.event_count, 4);
}

#[tokio::test]
async fn e2e_missing_lesson_suggests_topics() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let (orch, _store) = orchestrator(&config, Arc::new(ScriptedProvider::new(vec![]))).await;

    let reply = orch
        .handle(QueryRequest::new("learner_1", "alankar lesson"))
        .await;
    assert_eq!(reply.status, TurnStatus::Fallback);
    assert!(reply.response.starts_with("No detailed lesson found for 'alankar lesson'."));
    assert!(reply.response.contains("'Sarali'"));
    assert!(reply.response.contains("'Geetham'"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn e2e_concurrent_learners_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let (orch, store) = orchestrator(&config, Arc::new(ScriptedProvider::new(vec![]))).await;
    let orch = Arc::new(orch);

    let mut handles = Vec::new();
    for u in 0..12 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("learner_{u}");
            let mut statuses = Vec::new();
            for _ in 0..5 {
                let reply = orch.handle(QueryRequest::new(&user, "sarali lesson")).await;
                statuses.push(reply.status);
            }
            statuses
        }));
    }
    for h in handles {
        let statuses = h.await.unwrap();
        assert!(statuses.iter().all(|s| *s == TurnStatus::Answered), "{statuses:?}");
    }

    for u in 0..12 {
        let listed = store
            .list_sessions(&config.app_name, &format!("learner_{u}"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_count, 10);
    }
}

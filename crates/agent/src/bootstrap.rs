//! Wire an [`Orchestrator`] from configuration.

use crate::classify::QueryClassifier;
use crate::llm::LlmClient;
use crate::orchestrator::{Orchestrator, Responders};
use crate::pattern::PatternSynthesizer;
use crate::responders::{LessonResponder, RagaInfoResponder, SwaraPatternResponder};
use carnaticguru_config::AppConfig;
use carnaticguru_core::error::{Error, Result};
use carnaticguru_core::provider::Provider;
use carnaticguru_core::session::SessionStore;
use carnaticguru_sessions::{InMemorySessionStore, SqliteSessionStore};
use carnaticguru_tools::LessonLibrary;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build everything the configuration describes: provider, lesson library,
/// synthesizer and session store.
pub async fn build_from_config(config: &AppConfig) -> Result<Orchestrator> {
    let providers = carnaticguru_providers::build_from_config(config);
    let provider = providers.default().ok_or_else(|| Error::Config {
        message: format!("provider '{}' is not available", config.default_provider),
    })?;
    let sessions = open_session_store(config).await?;
    Ok(assemble(config, provider, sessions))
}

/// The store selected by `[sessions].backend`.
pub async fn open_session_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>> {
    match config.sessions.backend.as_str() {
        "memory" => Ok(Arc::new(InMemorySessionStore::new())),
        "sqlite" => {
            let path = config.sessions.resolved_path();
            info!(path = %path.display(), "Opening session database");
            Ok(Arc::new(SqliteSessionStore::open(&path).await?))
        }
        other => Err(Error::Config {
            message: format!("unknown session backend '{other}'"),
        }),
    }
}

/// Build the orchestrator around an already constructed provider and store.
pub fn assemble(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    sessions: Arc<dyn SessionStore>,
) -> Orchestrator {
    let model = config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());
    let llm = LlmClient::new(provider, model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);

    let library = LessonLibrary::from_path(config.lessons.resolved_document())
        .with_limits(
            config.lessons.max_excerpt_chars,
            config.lessons.fallback_excerpt_chars,
        )
        .with_topics(config.lessons.topics.clone());

    let synthesizer = match config.patterns.seed {
        Some(seed) => PatternSynthesizer::seeded(seed),
        None => PatternSynthesizer::from_os_rng(),
    };

    let responders = Responders {
        lesson: Arc::new(LessonResponder::new(Arc::new(library))),
        raga_info: Arc::new(RagaInfoResponder::new(llm)),
        swara_pattern: Arc::new(SwaraPatternResponder::new(
            Arc::new(synthesizer),
            config.patterns.lengths.clone(),
        )),
    };

    info!(
        app = %config.app_name,
        model = %config.default_model,
        sessions = sessions.name(),
        timeout_secs = config.router.timeout_secs,
        "Orchestrator ready"
    );

    Orchestrator::new(
        config.app_name.clone(),
        QueryClassifier::from_config(&config.router),
        responders,
        sessions,
    )
    .with_timeout(Duration::from_secs(config.router.timeout_secs))
    .with_max_tool_hops(config.router.max_tool_hops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{QueryRequest, TurnStatus};
    use crate::test_helpers::SequentialMockProvider;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sessions.backend = "memory".into();
        config.patterns.lengths = vec![4, 9];
        config.patterns.seed = Some(3);
        config
    }

    #[tokio::test]
    async fn memory_backend_is_selectable() {
        let store = open_session_store(&memory_config()).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn unknown_backend_is_a_config_error() {
        let mut config = memory_config();
        config.sessions.backend = "redis".into();
        assert!(matches!(
            open_session_store(&config).await,
            Err(Error::Config { .. })
        ));
    }

    #[tokio::test]
    async fn sqlite_backend_opens_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config();
        config.sessions.backend = "sqlite".into();
        config.sessions.path = Some(dir.path().join("guru.db"));
        let store = open_session_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(dir.path().join("guru.db").exists());
    }

    #[tokio::test]
    async fn assembled_orchestrator_uses_configured_lengths() {
        let config = memory_config();
        let provider = Arc::new(SequentialMockProvider::texts(&[
            r#"{"arohanam": ["S","R2","G3","P","D2","S'"], "avarohanam": ["S'","D2","P","G3","R2","S"]}"#,
        ]));
        let sessions = open_session_store(&config).await.unwrap();
        let orch = assemble(&config, provider.clone(), sessions);

        let reply = orch
            .handle(QueryRequest::new("learner_1", "practice patterns for Mohanam"))
            .await;
        assert_eq!(reply.status, TurnStatus::Answered);
        let prefixes: Vec<&str> = reply
            .response
            .lines()
            .map(|l| l.split(':').next().unwrap())
            .collect();
        assert_eq!(prefixes, vec!["4-swars", "9-swars"]);

        let request = &provider.requests()[0];
        assert_eq!(request.model, "gemini-2.0-flash-lite");
        assert_eq!(request.max_tokens, Some(2048));
    }
}

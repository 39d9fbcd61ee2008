//! Thin wrapper that turns an instruction and learner input into model text.

use carnaticguru_core::error::ProviderError;
use carnaticguru_core::message::Message;
use carnaticguru_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One completion. Tool output, when present, follows the learner input
    /// in the same user turn.
    pub async fn invoke(
        &self,
        instruction: &str,
        input: &str,
        tool_results: Option<&str>,
    ) -> Result<String, ProviderError> {
        let user_turn = match tool_results {
            Some(results) => format!("{input}\n\nTool results:\n{results}"),
            None => input.to_string(),
        };

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(instruction), Message::user(user_turn)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.provider.complete(request).await?;
        debug!(
            provider = self.provider.name(),
            model = %response.model,
            tokens = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
            "Model replied"
        );
        Ok(response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;
    use carnaticguru_core::message::Role;

    #[tokio::test]
    async fn invoke_sends_instruction_then_input() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Kalyani is melakarta 65"]));
        let llm = LlmClient::new(provider.clone(), "mock-model").with_max_tokens(256);

        let text = llm.invoke("You answer raga questions", "Kalyani", None).await.unwrap();
        assert_eq!(text, "Kalyani is melakarta 65");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(256));
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[1].content, "Kalyani");
    }

    #[tokio::test]
    async fn tool_results_are_appended() {
        let provider = Arc::new(SequentialMockProvider::texts(&["ok"]));
        let llm = LlmClient::new(provider.clone(), "mock-model");
        llm.invoke("i", "Mohanam", Some("arohanam: S R G P D S'"))
            .await
            .unwrap();
        let content = &provider.requests()[0].messages[1].content;
        assert!(content.starts_with("Mohanam"));
        assert!(content.contains("Tool results:\narohanam"));
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::QuotaExceeded("RESOURCE_EXHAUSTED".into()),
        )]));
        let llm = LlmClient::new(provider, "mock-model");
        let err = llm.invoke("i", "x", None).await.unwrap_err();
        assert!(err.is_quota());
    }
}

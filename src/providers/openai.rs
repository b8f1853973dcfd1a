//! 托管对话 API A（OpenAI 兼容的 chat completions）

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Persona, Provider, ProviderKind, abstain, classify_status, classify_transport, http_client};
use crate::config::config::ChatApiConfig;
use crate::error::{AppError, Result};
use crate::models::{FailureKind, ProviderResult};

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    config: ChatApiConfig,
    persona: Persona,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenAiProvider {
    /// 凭据缺失时返回配置错误
    pub fn new(config: ChatApiConfig, persona: Persona) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            config,
            persona,
        })
    }

    async fn complete(&self, message: &str) -> std::result::Result<String, FailureKind> {
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": self.persona.system_prompt() },
                { "role": "user", "content": message },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!(target: "provider", %status, error = %error_text, "Chat completion failed");
            return Err(classify_status(status, &error_text));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|_| FailureKind::MalformedResponse)?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(FailureKind::MalformedResponse)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ChatA
    }

    async fn attempt(&self, message: &str) -> ProviderResult {
        match self.complete(message).await {
            Ok(raw) => match self.persona.normalize(&raw) {
                Some(reply) => ProviderResult::Reply(reply),
                None => abstain(self.kind(), FailureKind::MalformedResponse, "empty reply"),
            },
            Err(kind) => abstain(self.kind(), kind, "chat completion failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let mut config = AppConfig::development().openai;
        config.base_url = server.uri();
        config.api_key = Some("sk-test".into());
        OpenAiProvider::new(config, Persona::default()).unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = AppConfig::development().openai;
        assert!(matches!(
            OpenAiProvider::new(config, Persona::default()),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini", "max_tokens": 800 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Cloud is great." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("tell me").await;
        assert_eq!(result, ProviderResult::Reply("Cloudy ☁️: Cloud is great.".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_key_abstains() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("hi").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::AuthInvalid));
    }

    #[tokio::test]
    async fn test_quota_abstains() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("hi").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::RateLimited));
    }

    #[tokio::test]
    async fn test_missing_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("hi").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::MalformedResponse));
    }
}

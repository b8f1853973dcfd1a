//! 托管对话 API B（Gemini generateContent）
//!
//! 人设准则通过 `systemInstruction` 传入。

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Persona, Provider, ProviderKind, abstain, classify_status, classify_transport, http_client};
use crate::config::config::ChatApiConfig;
use crate::error::{AppError, Result};
use crate::models::{FailureKind, ProviderResult};

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    config: ChatApiConfig,
    persona: Persona,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: ChatApiConfig, persona: Persona) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY is not set".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            config,
            persona,
        })
    }

    async fn generate(&self, message: &str) -> std::result::Result<String, FailureKind> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": self.persona.guidelines() }] },
            "contents": [{ "role": "user", "parts": [{ "text": message }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            }
        });

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!(target: "provider", %status, error = %error_text, "Gemini call failed");
            return Err(classify_status(status, &error_text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|_| FailureKind::MalformedResponse)?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .ok_or(FailureKind::MalformedResponse)?;

        Ok(text)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ChatB
    }

    async fn attempt(&self, message: &str) -> ProviderResult {
        match self.generate(message).await {
            Ok(raw) => match self.persona.normalize(&raw) {
                Some(reply) => ProviderResult::Reply(reply),
                None => abstain(self.kind(), FailureKind::MalformedResponse, "empty reply"),
            },
            Err(kind) => abstain(self.kind(), kind, "generate content failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        let mut config = AppConfig::development().gemini;
        config.base_url = server.uri();
        config.api_key = Some("g-test".into());
        GeminiProvider::new(config, Persona::default()).unwrap()
    }

    #[tokio::test]
    async fn test_parts_are_joined_and_prefixed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-pro:generateContent"))
            .and(query_param("key", "g-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Cloudy ☁️: Hello, " }, { "text": "friend!" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("hi").await;
        assert_eq!(result, ProviderResult::Reply("Cloudy ☁️: Hello, friend!".to_string()));
    }

    #[tokio::test]
    async fn test_no_candidates_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("hi").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::MalformedResponse));
    }

    #[tokio::test]
    async fn test_invalid_key_abstains() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("hi").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::AuthInvalid));
    }
}

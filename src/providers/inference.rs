//! 通用托管推理 API（Hugging Face Inference）
//!
//! 生成结果中会回显输入，返回前把原始用户文本从生成文本中去掉。

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Persona, Provider, ProviderKind, abstain, classify_status, classify_transport, http_client};
use crate::config::config::InferenceConfig;
use crate::error::{AppError, Result};
use crate::models::{FailureKind, ProviderResult};

#[derive(Deserialize)]
struct Generation {
    generated_text: Option<String>,
}

pub struct InferenceProvider {
    client: reqwest::Client,
    api_key: String,
    config: InferenceConfig,
    persona: Persona,
}

impl std::fmt::Debug for InferenceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceProvider")
            .field("api_url", &self.config.api_url)
            .finish()
    }
}

impl InferenceProvider {
    pub fn new(config: InferenceConfig, persona: Persona) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("HUGGING_FACE_API_KEY is not set".to_string()))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            config,
            persona,
        })
    }

    async fn generate(&self, message: &str) -> std::result::Result<String, FailureKind> {
        let body = serde_json::json!({
            "inputs": message,
            "parameters": {
                "max_length": self.config.max_length,
                "temperature": self.config.temperature,
                "do_sample": true,
            }
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!(target: "provider", %status, error = %error_text, "Inference call failed");
            return Err(classify_status(status, &error_text));
        }

        let generations: Vec<Generation> = response
            .json()
            .await
            .map_err(|_| FailureKind::MalformedResponse)?;

        generations
            .into_iter()
            .next()
            .and_then(|g| g.generated_text)
            .ok_or(FailureKind::MalformedResponse)
    }
}

/// 去掉生成文本中回显的输入
pub fn strip_echo(generated: &str, input: &str) -> String {
    if input.is_empty() {
        return generated.trim().to_string();
    }
    generated.replace(input, "").trim().to_string()
}

#[async_trait]
impl Provider for InferenceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GenericInference
    }

    async fn attempt(&self, message: &str) -> ProviderResult {
        match self.generate(message).await {
            Ok(generated) => {
                let text = strip_echo(&generated, message);
                match self.persona.normalize(&text) {
                    Some(reply) => ProviderResult::Reply(reply),
                    None => abstain(self.kind(), FailureKind::MalformedResponse, "only echoed input"),
                }
            }
            Err(kind) => abstain(self.kind(), kind, "inference failed"),
        }
    }
}

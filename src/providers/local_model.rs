//! 本地模型适配器（Ollama）
//!
//! 每次尝试前先做就绪检查；服务未响应时尝试启动一次并等待宽限期。
//! 主模型因内存不足失败时，用较小的备用模型重试一次。

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Persona, Provider, ProviderKind, abstain, classify_status, classify_transport, http_client};
use crate::config::config::LocalModelConfig;
use crate::error::Result;
use crate::models::{FailureKind, ProviderResult};

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama 本地模型 provider
pub struct LocalModelProvider {
    client: reqwest::Client,
    probe: reqwest::Client,
    config: LocalModelConfig,
    persona: Persona,
    /// 串行化启动尝试，避免并发请求各自拉起一个服务
    launch_lock: Mutex<()>,
}

impl std::fmt::Debug for LocalModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalModelProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("fallback_model", &self.config.fallback_model)
            .finish()
    }
}

impl LocalModelProvider {
    pub fn new(config: LocalModelConfig, persona: Persona) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            probe: http_client(config.readiness_timeout_secs)?,
            config,
            persona,
            launch_lock: Mutex::new(()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 服务是否在响应
    pub async fn is_ready(&self) -> bool {
        match self.probe.get(self.url("/api/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(target: "provider", error = %e, "Local model service not responding");
                false
            }
        }
    }

    /// 已安装的模型列表，服务不可达时为空
    pub async fn installed_models(&self) -> Vec<String> {
        let response = match self.probe.get(self.url("/api/tags")).send().await {
            Ok(response) if response.status().is_success() => response,
            _ => return Vec::new(),
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// 确保服务可用，必要时启动一次
    ///
    /// 启动后仍未就绪只影响本次尝试，下次请求会重新检查。
    async fn ensure_ready(&self) -> bool {
        if self.is_ready().await {
            return true;
        }

        let _guard = self.launch_lock.lock().await;
        if self.is_ready().await {
            return true;
        }

        let Some(binary) = &self.config.binary else {
            return false;
        };

        info!(target: "provider", binary = %binary.display(), "Starting local model service");
        let spawned = tokio::process::Command::new(binary)
            .arg("serve")
            .env("OLLAMA_NUM_PARALLEL", "1")
            .env("OLLAMA_MAX_LOADED_MODELS", "1")
            .env("OLLAMA_FLASH_ATTENTION", "false")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = spawned {
            warn!(target: "provider", error = %e, "Failed to start local model service");
            return false;
        }

        tokio::time::sleep(Duration::from_secs(self.config.startup_grace_secs)).await;
        self.is_ready().await
    }

    async fn chat(&self, model: &str, message: &str) -> std::result::Result<String, FailureKind> {
        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": self.persona.system_prompt() },
                { "role": "user", "content": message },
            ],
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "num_predict": self.config.num_predict,
                "repeat_penalty": self.config.repeat_penalty,
                "seed": -1,
                "num_ctx": self.config.num_ctx,
            }
        });

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!(target: "provider", %status, error = %error_text, model, "Local model call failed");
            return Err(classify_status(status, &error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| FailureKind::MalformedResponse)?;

        parsed
            .message
            .map(|m| m.content)
            .ok_or(FailureKind::MalformedResponse)
    }

    fn finish(&self, raw: String) -> ProviderResult {
        match self.persona.normalize(&raw) {
            Some(reply) => ProviderResult::Reply(reply),
            None => abstain(self.kind(), FailureKind::MalformedResponse, "empty reply"),
        }
    }
}

#[async_trait]
impl Provider for LocalModelProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalModel
    }

    async fn attempt(&self, message: &str) -> ProviderResult {
        if !self.ensure_ready().await {
            return abstain(self.kind(), FailureKind::NotReady, "service not running");
        }

        match self.chat(&self.config.model, message).await {
            Ok(raw) => self.finish(raw),
            Err(FailureKind::ResourceExhausted) if self.config.fallback_model != self.config.model => {
                info!(
                    target: "provider",
                    model = %self.config.model,
                    fallback = %self.config.fallback_model,
                    "Retrying with smaller model"
                );
                match self.chat(&self.config.fallback_model, message).await {
                    Ok(raw) => self.finish(raw),
                    Err(kind) => abstain(self.kind(), kind, "fallback model failed"),
                }
            }
            Err(kind) => abstain(self.kind(), kind, "primary model failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LocalModelConfig {
        let mut config = AppConfig::development().local_model;
        config.base_url = server.uri();
        config.binary = None;
        config.startup_grace_secs = 0;
        config
    }

    async fn mount_tags(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "models": [{ "name": "llama3.2:1b" }] })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_reply_gets_persona_prefix() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({ "stream": false, "options": { "num_ctx": 2048 } })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "message": { "role": "assistant", "content": " Hi there! " } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = LocalModelProvider::new(config_for(&server), Persona::default()).unwrap();
        let result = provider.attempt("hello").await;
        assert_eq!(result, ProviderResult::Reply("Cloudy ☁️: Hi there!".to_string()));
    }

    #[tokio::test]
    async fn test_memory_error_retries_with_fallback_model() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({ "model": "big" })))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "error": "model requires more system memory than is available" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({ "model": "small" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "message": { "content": "Cloudy ☁️: small model here" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.model = "big".into();
        config.fallback_model = "small".into();
        let provider = LocalModelProvider::new(config, Persona::default()).unwrap();

        let result = provider.attempt("hello").await;
        assert_eq!(result, ProviderResult::Reply("Cloudy ☁️: small model here".to_string()));
    }

    #[tokio::test]
    async fn test_other_errors_do_not_retry() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.fallback_model = "something-else".into();
        let provider = LocalModelProvider::new(config, Persona::default()).unwrap();

        let result = provider.attempt("hello").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::Unknown));
    }

    #[tokio::test]
    async fn test_same_fallback_model_is_not_retried() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = LocalModelProvider::new(config_for(&server), Persona::default()).unwrap();
        let result = provider.attempt("hello").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::ResourceExhausted));
    }

    #[tokio::test]
    async fn test_not_ready_without_binary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = LocalModelProvider::new(config_for(&server), Persona::default()).unwrap();
        assert!(!provider.is_ready().await);
        assert_eq!(
            provider.attempt("hello").await,
            ProviderResult::Abstain(FailureKind::NotReady)
        );
    }

    fn launching_config(server: &MockServer) -> LocalModelConfig {
        let mut config = config_for(server);
        // `true serve` 立即成功退出，只验证启动流程本身
        config.binary = Some(std::path::PathBuf::from("true"));
        config
    }

    #[tokio::test]
    async fn test_launch_then_reprobe_answers() {
        let server = MockServer::start().await;
        // 启动前的两次探测失败，启动后的探测成功
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "message": { "content": "up now" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = LocalModelProvider::new(launching_config(&server), Persona::default()).unwrap();
        assert_eq!(
            provider.attempt("hello").await,
            ProviderResult::Reply("Cloudy ☁️: up now".to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_launch_is_rechecked_next_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .expect(6)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = LocalModelProvider::new(launching_config(&server), Persona::default()).unwrap();
        for _ in 0..2 {
            assert_eq!(
                provider.attempt("hello").await,
                ProviderResult::Abstain(FailureKind::NotReady)
            );
        }
    }

    #[tokio::test]
    async fn test_installed_models() {
        let server = MockServer::start().await;
        mount_tags(&server).await;

        let provider = LocalModelProvider::new(config_for(&server), Persona::default()).unwrap();
        assert_eq!(provider.installed_models().await, vec!["llama3.2:1b".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_content_is_malformed() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": { "content": "   " } })))
            .mount(&server)
            .await;

        let provider = LocalModelProvider::new(config_for(&server), Persona::default()).unwrap();
        assert_eq!(
            provider.attempt("hello").await,
            ProviderResult::Abstain(FailureKind::MalformedResponse)
        );
    }
}

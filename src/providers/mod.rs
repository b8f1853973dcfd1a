//! Provider 模块
//!
//! 每个 provider 把一种外部能力（本地模型、托管对话 API、网页搜索、通用推理 API）
//! 包装成统一契约：给定消息，返回带人设前缀的回复或明确弃权。
//! 适配器内部的任何失败都转换为 [`FailureKind`]，不会越过边界。

pub mod capabilities;
pub mod gemini;
pub mod inference;
pub mod local_model;
pub mod openai;
pub mod persona;
pub mod web_search;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::models::{FailureKind, ProviderResult};

pub use capabilities::{Capabilities, Capability, ProviderSet};
pub use gemini::GeminiProvider;
pub use inference::InferenceProvider;
pub use local_model::LocalModelProvider;
pub use openai::OpenAiProvider;
pub use persona::Persona;
pub use web_search::WebSearchProvider;

/// Provider 类别，顺序即编排器尝试的顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    WebSearch,
    LocalModel,
    ChatA,
    ChatB,
    GenericInference,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::WebSearch,
        ProviderKind::LocalModel,
        ProviderKind::ChatA,
        ProviderKind::ChatB,
        ProviderKind::GenericInference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::WebSearch => "web_search",
            ProviderKind::LocalModel => "local_model",
            ProviderKind::ChatA => "chat_a",
            ProviderKind::ChatB => "chat_b",
            ProviderKind::GenericInference => "generic_inference",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider 统一契约
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider 类别
    fn kind(&self) -> ProviderKind;

    /// 尝试回答一条消息
    ///
    /// 只转发最新一条消息，每次调用都是无状态的。
    async fn attempt(&self, message: &str) -> ProviderResult;
}

/// 创建带超时的 HTTP 客户端
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// 按 HTTP 状态码和响应正文对失败归类
pub fn classify_status(status: StatusCode, body: &str) -> FailureKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return FailureKind::AuthInvalid,
        StatusCode::TOO_MANY_REQUESTS => return FailureKind::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => return FailureKind::Timeout,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            return FailureKind::ServiceUnavailable;
        }
        _ => {}
    }

    classify_message(body)
}

/// 按错误文本归类
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if lower.contains("memory") {
        FailureKind::ResourceExhausted
    } else if lower.contains("invalid") && lower.contains("key") {
        FailureKind::AuthInvalid
    } else if lower.contains("quota") || lower.contains("limit") {
        FailureKind::RateLimited
    } else if lower.contains("timeout") || lower.contains("timed out") {
        FailureKind::Timeout
    } else {
        FailureKind::Unknown
    }
}

/// 对传输层错误归类
pub fn classify_transport(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() {
        FailureKind::ServiceUnavailable
    } else if error.is_decode() {
        FailureKind::MalformedResponse
    } else if let Some(status) = error.status() {
        classify_status(status, &error.to_string())
    } else {
        FailureKind::Unknown
    }
}

/// 记录一次弃权并返回对应结果
pub(crate) fn abstain(kind: ProviderKind, failure: FailureKind, detail: &str) -> ProviderResult {
    tracing::warn!(
        target: "provider",
        provider = %kind,
        failure = %failure,
        detail,
        "Provider abstained"
    );
    ProviderResult::Abstain(failure)
}

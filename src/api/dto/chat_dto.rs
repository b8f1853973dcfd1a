//! 对话 DTO

use serde::{Deserialize, Serialize};

/// 对话请求
///
/// 缺少 `message` 字段时按空字符串处理。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
}

/// 对话响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

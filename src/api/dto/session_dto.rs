//! 会话 DTO
//!
//! 定义会话相关的响应数据结构。

use serde::{Deserialize, Serialize};

use crate::models::Message;

/// 新会话响应
#[derive(Debug, Serialize, Deserialize)]
pub struct NewChatResponse {
    pub success: bool,
    pub message: String,
    /// 新会话标识，同时写入 `session_id` cookie
    pub session_id: String,
}

/// 会话历史响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}

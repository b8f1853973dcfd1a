use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 用户消息
    User,
    /// 助手消息
    Assistant,
}

/// 会话中的一条消息
///
/// 创建后不再修改，只会被追加到会话历史中。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// 角色
    pub role: Role,
    /// 文本内容
    pub content: String,
    /// 创建时间
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// 创建用户消息
    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content)
    }

    /// 创建助手消息
    pub fn assistant(content: &str) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roles() {
        let user = Message::user("hello");
        let reply = Message::assistant("Cloudy ☁️: hi");

        assert_eq!(user.role, Role::User);
        assert_eq!(reply.role, Role::Assistant);
        assert!(reply.timestamp >= user.timestamp);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }
}

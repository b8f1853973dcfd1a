//! 会话历史存储
//!
//! 进程内、并发安全的会话历史表，进程退出即丢失。

use dashmap::DashMap;

use crate::models::Message;

/// 未携带会话标识的请求使用的默认会话
pub const DEFAULT_SESSION: &str = "default";

/// 会话历史存储
///
/// 每个会话一条按时间排序的消息序列。`history_limit` 大于 0 时，
/// 超出上限的最早消息会被丢弃。
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Vec<Message>>,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            history_limit,
        }
    }

    /// 追加一条消息
    pub fn append(&self, session_id: &str, message: Message) {
        let mut history = self.sessions.entry(session_id.to_string()).or_default();
        history.push(message);

        if self.history_limit > 0 && history.len() > self.history_limit {
            let overflow = history.len() - self.history_limit;
            history.drain(..overflow);
        }
    }

    /// 获取会话历史的快照
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .get(session_id)
            .map(|history| history.value().clone())
            .unwrap_or_default()
    }

    /// 开始一个空会话
    pub fn reset(&self, session_id: &str) {
        self.sessions.insert(session_id.to_string(), Vec::new());
    }

    /// 删除会话
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// 当前会话数量
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(0)
    }
}

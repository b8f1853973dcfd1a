//! 用户名记忆
//!
//! 整个进程共享的单槽记忆：同一时刻最多记住一个名字，不区分会话。
//! 多个会话之间会互相看到对方设置的名字，这是已知的跨会话泄漏，
//! 保留它是为了与既有行为一致。

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct UserMemory {
    name: RwLock<Option<String>>,
}

impl UserMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记住的名字
    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    /// 记住新名字，覆盖旧值
    pub fn remember(&self, name: &str) {
        *self.name.write() = Some(name.to_string());
    }
}

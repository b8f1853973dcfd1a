//! 存储模块
//!
//! 会话历史和用户名记忆都只存在于进程内存中，进程重启即丢失。

pub mod session_store;
pub mod user_memory;

pub use session_store::{DEFAULT_SESSION, SessionStore};
pub use user_memory::UserMemory;

//! 数据模型模块

pub mod message;
pub mod provider_result;

pub use message::{Message, Role};
pub use provider_result::{FailureKind, ProviderResult};

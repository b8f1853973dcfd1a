//! 服务模块

pub mod fallback;
pub mod intent;
pub mod orchestrator;
pub mod text;

pub use fallback::{CATCH_ALL_REPLIES, ConversationIntent, FallbackRuleEngine, extract_name};
pub use intent::IntentClassifier;
pub use orchestrator::{AnsweredBy, ChatOutcome, Orchestrator};

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::observability::ChatMetrics;
use crate::providers::{Capabilities, Persona, ProviderSet};
use crate::storage::{SessionStore, UserMemory};

/// 根据配置创建编排器
///
/// 能力在这里解析一次，之后不再检查。
pub fn create_orchestrator(
    config: &AppConfig,
    capabilities: &Capabilities,
    sessions: Arc<SessionStore>,
    memory: Arc<UserMemory>,
    metrics: Arc<ChatMetrics>,
) -> Orchestrator {
    let persona = Persona::from_config(&config.persona);
    let providers = ProviderSet::build(config, capabilities, &persona);
    let deadline = match config.orchestrator.request_deadline_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    Orchestrator::new(persona, providers, sessions, memory, metrics, deadline)
}

//! 编排器
//!
//! 单次请求的处理流程：
//! 记录用户消息 → 意图分类 → （需要实时信息时）网页搜索 → 本地模型 →
//! 对话 API A → 对话 API B → 通用推理 API → 规则兜底 → 记录助手回复。
//!
//! 第一个给出非空回复的阶段即终止，之后的阶段不再调用；规范化后为空的回复
//! 按 `MalformedResponse` 弃权处理，继续尝试下一阶段。整条链受全局截止时间约束，
//! 超时或 provider panic 时直接交给规则兜底。

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::models::{FailureKind, Message, ProviderResult};
use crate::observability::ChatMetrics;
use crate::providers::{Persona, ProviderKind, ProviderSet};
use crate::services::fallback::FallbackRuleEngine;
use crate::services::intent::IntentClassifier;
use crate::storage::{SessionStore, UserMemory};

/// 给出最终回复的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsweredBy {
    Provider(ProviderKind),
    Fallback,
}

impl AnsweredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnsweredBy::Provider(kind) => kind.as_str(),
            AnsweredBy::Fallback => "fallback",
        }
    }
}

/// 一次对话的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub reply: String,
    pub answered_by: AnsweredBy,
    pub needs_live_info: bool,
}

/// Provider 回退编排器
pub struct Orchestrator {
    classifier: IntentClassifier,
    providers: ProviderSet,
    fallback: FallbackRuleEngine,
    sessions: Arc<SessionStore>,
    persona: Persona,
    metrics: Arc<ChatMetrics>,
    /// None 表示不设全局截止时间
    deadline: Option<Duration>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers)
            .field("persona", &self.persona)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        persona: Persona,
        providers: ProviderSet,
        sessions: Arc<SessionStore>,
        memory: Arc<UserMemory>,
        metrics: Arc<ChatMetrics>,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            providers,
            fallback: FallbackRuleEngine::new(persona.clone(), memory),
            sessions,
            persona,
            metrics,
            deadline,
        }
    }

    /// 处理一条消息并返回回复
    ///
    /// 对任何输入都返回以人设前缀开头的非空文本。
    pub async fn handle(&self, session_id: &str, text: &str) -> String {
        self.respond(session_id, text).await.reply
    }

    /// 处理一条消息，返回回复及其来源
    pub async fn respond(&self, session_id: &str, text: &str) -> ChatOutcome {
        let started = Instant::now();
        self.metrics.record_request();
        info!(target: "orchestrator", session = %session_id, input = %text, "Received message");
        self.sessions.append(session_id, Message::user(text));

        let needs_live_info = self.classifier.needs_live_info(text);
        debug!(target: "orchestrator", needs_live_info, "Intent classified");

        let chain = AssertUnwindSafe(self.run_chain(text, needs_live_info)).catch_unwind();
        let guarded = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, chain).await.ok(),
            None => Some(chain.await),
        };

        let answered = match guarded {
            Some(Ok(answered)) => answered,
            Some(Err(_)) => {
                self.metrics.record_panic();
                warn!(target: "orchestrator", "Provider panicked; answering from rules");
                None
            }
            None => {
                self.metrics.record_deadline_overrun();
                warn!(
                    target: "orchestrator",
                    deadline = ?self.deadline,
                    "Request deadline exceeded; answering from rules"
                );
                None
            }
        };

        let (reply, answered_by) = match answered {
            Some((reply, kind)) => (reply, AnsweredBy::Provider(kind)),
            None => (self.fallback.respond(text), AnsweredBy::Fallback),
        };

        self.metrics.record_answer(answered_by);
        self.sessions.append(session_id, Message::assistant(&reply));
        info!(
            target: "orchestrator",
            session = %session_id,
            answered_by = answered_by.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reply produced"
        );

        ChatOutcome {
            reply,
            answered_by,
            needs_live_info,
        }
    }

    /// 依次尝试各个 provider，返回第一个规范化后非空的回复
    async fn run_chain(&self, text: &str, needs_live_info: bool) -> Option<(String, ProviderKind)> {
        for kind in ProviderKind::ALL {
            if kind == ProviderKind::WebSearch && !needs_live_info {
                continue;
            }

            let Some(provider) = self.providers.get(kind) else {
                debug!(target: "orchestrator", provider = %kind, "Stage skipped: unavailable");
                continue;
            };

            let started = Instant::now();
            let result = match provider.attempt(text).await {
                ProviderResult::Reply(reply) => match self.persona.normalize(&reply) {
                    Some(reply) => ProviderResult::Reply(reply),
                    None => ProviderResult::Abstain(FailureKind::MalformedResponse),
                },
                abstain => abstain,
            };

            match result {
                ProviderResult::Reply(reply) => {
                    debug!(
                        target: "orchestrator",
                        provider = %kind,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Stage answered"
                    );
                    return Some((reply, kind));
                }
                ProviderResult::Abstain(failure) => {
                    self.metrics.record_abstain();
                    debug!(
                        target: "orchestrator",
                        provider = %kind,
                        %failure,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Stage abstained"
                    );
                }
            }
        }

        None
    }
}

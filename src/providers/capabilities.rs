//! 启动时能力解析
//!
//! 每个 provider 在启动时解析一次：可用或不可用（附原因）。
//! 不可用的 provider 不会被构造，编排器直接跳过对应阶段。

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    GeminiProvider, InferenceProvider, LocalModelProvider, OpenAiProvider, Persona, Provider,
    ProviderKind, WebSearchProvider,
};
use crate::config::AppConfig;
use crate::error::Result;

/// 单个 provider 的能力状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Capability {
    Available,
    Unavailable(String),
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available)
    }

    fn from_switch(enabled: bool) -> Self {
        if enabled {
            Capability::Available
        } else {
            Capability::Unavailable("disabled in configuration".to_string())
        }
    }

    fn from_credential(enabled: bool, key: Option<&str>, variable: &str) -> Self {
        if !enabled {
            return Self::from_switch(false);
        }
        match key {
            Some(k) if !k.trim().is_empty() => Capability::Available,
            _ => Capability::Unavailable(format!("{variable} is not set")),
        }
    }
}

/// 全部 provider 的能力
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub web_search: Capability,
    pub local_model: Capability,
    pub chat_a: Capability,
    pub chat_b: Capability,
    pub generic_inference: Capability,
}

impl Capabilities {
    pub fn resolve(config: &AppConfig) -> Self {
        Self {
            web_search: Capability::from_switch(config.web_search.enabled),
            local_model: Capability::from_switch(config.local_model.enabled),
            chat_a: Capability::from_credential(
                config.openai.enabled,
                config.openai.api_key.as_deref(),
                "OPENAI_API_KEY",
            ),
            chat_b: Capability::from_credential(
                config.gemini.enabled,
                config.gemini.api_key.as_deref(),
                "GEMINI_API_KEY",
            ),
            generic_inference: Capability::from_credential(
                config.inference.enabled,
                config.inference.api_key.as_deref(),
                "HUGGING_FACE_API_KEY",
            ),
        }
    }

    pub fn get(&self, kind: ProviderKind) -> &Capability {
        match kind {
            ProviderKind::WebSearch => &self.web_search,
            ProviderKind::LocalModel => &self.local_model,
            ProviderKind::ChatA => &self.chat_a,
            ProviderKind::ChatB => &self.chat_b,
            ProviderKind::GenericInference => &self.generic_inference,
        }
    }

    pub fn available_count(&self) -> usize {
        ProviderKind::ALL
            .iter()
            .filter(|kind| self.get(**kind).is_available())
            .count()
    }
}

/// 按阶段组织的 provider 集合，None 表示该阶段被跳过
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub web_search: Option<Arc<dyn Provider>>,
    pub local_model: Option<Arc<dyn Provider>>,
    pub chat_a: Option<Arc<dyn Provider>>,
    pub chat_b: Option<Arc<dyn Provider>>,
    pub generic_inference: Option<Arc<dyn Provider>>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("web_search", &self.web_search.is_some())
            .field("local_model", &self.local_model.is_some())
            .field("chat_a", &self.chat_a.is_some())
            .field("chat_b", &self.chat_b.is_some())
            .field("generic_inference", &self.generic_inference.is_some())
            .finish()
    }
}

impl ProviderSet {
    /// 只构造可用的 provider；构造失败的 provider 记录警告后跳过
    pub fn build(config: &AppConfig, capabilities: &Capabilities, persona: &Persona) -> Self {
        fn construct<P: Provider + 'static>(
            kind: ProviderKind,
            capability: &Capability,
            make: impl FnOnce() -> Result<P>,
        ) -> Option<Arc<dyn Provider>> {
            if !capability.is_available() {
                return None;
            }
            match make() {
                Ok(provider) => {
                    let provider: Arc<dyn Provider> = Arc::new(provider);
                    Some(provider)
                }
                Err(e) => {
                    warn!(provider = %kind, error = %e, "Failed to construct provider");
                    None
                }
            }
        }

        Self {
            web_search: construct(ProviderKind::WebSearch, &capabilities.web_search, || {
                WebSearchProvider::new(config.web_search.clone(), persona.clone())
            }),
            local_model: construct(ProviderKind::LocalModel, &capabilities.local_model, || {
                LocalModelProvider::new(config.local_model.clone(), persona.clone())
            }),
            chat_a: construct(ProviderKind::ChatA, &capabilities.chat_a, || {
                OpenAiProvider::new(config.openai.clone(), persona.clone())
            }),
            chat_b: construct(ProviderKind::ChatB, &capabilities.chat_b, || {
                GeminiProvider::new(config.gemini.clone(), persona.clone())
            }),
            generic_inference: construct(
                ProviderKind::GenericInference,
                &capabilities.generic_inference,
                || InferenceProvider::new(config.inference.clone(), persona.clone()),
            ),
        }
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn Provider>> {
        match kind {
            ProviderKind::WebSearch => self.web_search.as_ref(),
            ProviderKind::LocalModel => self.local_model.as_ref(),
            ProviderKind::ChatA => self.chat_a.as_ref(),
            ProviderKind::ChatB => self.chat_b.as_ref(),
            ProviderKind::GenericInference => self.generic_inference.as_ref(),
        }
    }
}

/// 启动横幅：记录每个 provider 的能力，以及本地模型是否已安装
pub async fn log_startup_banner(config: &AppConfig, capabilities: &Capabilities) {
    info!(
        "{} starting with {}/{} providers available",
        config.persona.name,
        capabilities.available_count(),
        ProviderKind::ALL.len()
    );

    for kind in ProviderKind::ALL {
        match capabilities.get(kind) {
            Capability::Available => info!(provider = %kind, "Provider available"),
            Capability::Unavailable(reason) => {
                info!(provider = %kind, %reason, "Provider unavailable")
            }
        }
    }

    if !capabilities.local_model.is_available() {
        return;
    }

    let probe = match LocalModelProvider::new(config.local_model.clone(), Persona::from_config(&config.persona)) {
        Ok(probe) => probe,
        Err(e) => {
            warn!(error = %e, "Could not create local model probe");
            return;
        }
    };

    if !probe.is_ready().await {
        info!("Local model service is not running yet; it will be started on first use");
        return;
    }

    let installed = probe.installed_models().await;
    if installed.iter().any(|name| name == &config.local_model.model) {
        info!(model = %config.local_model.model, "Local model installed");
    } else {
        warn!(
            model = %config.local_model.model,
            installed = ?installed,
            "Local model not installed; run `ollama pull {}`",
            config.local_model.model
        );
    }
}

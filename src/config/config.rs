use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 调试日志文件（每个请求追加写入），None 表示不写文件
    pub debug_log: Option<PathBuf>,
}

/// 助手人设配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PersonaConfig {
    /// 显示名称
    pub name: String,
    /// 每条回复必须携带的前缀
    pub prefix: String,
}

/// 本地模型（Ollama）配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LocalModelConfig {
    /// 是否启用
    pub enabled: bool,
    /// Ollama 服务器地址
    pub base_url: String,
    /// 主模型
    pub model: String,
    /// 内存不足时的降级模型
    pub fallback_model: String,
    /// 服务未启动时用于拉起的可执行文件，None 表示不尝试启动
    pub binary: Option<PathBuf>,
    /// 启动后的等待时间（秒）
    pub startup_grace_secs: u64,
    /// 就绪检查超时（秒）
    pub readiness_timeout_secs: u64,
    /// 对话请求超时（秒）
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    /// 最大生成 token 数
    pub num_predict: u32,
    pub repeat_penalty: f32,
    /// 上下文窗口大小
    pub num_ctx: u32,
}

/// 托管对话 API 配置（OpenAI / Gemini 共用）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChatApiConfig {
    /// 是否启用
    pub enabled: bool,
    /// API 地址
    pub base_url: String,
    /// API 密钥，未配置时 provider 不可用
    pub api_key: Option<String>,
    /// 模型名称
    pub model: String,
    pub temperature: f32,
    /// 最大输出 token 数
    pub max_tokens: u32,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

/// 网页搜索配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebSearchConfig {
    /// 是否启用
    pub enabled: bool,
    /// DuckDuckGo API 地址
    pub api_endpoint: String,
    /// 收集的最大结果数
    pub max_results: usize,
    /// 汇总进回复的结果数
    pub summary_results: usize,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// 通用推理 API（Hugging Face）配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InferenceConfig {
    /// 是否启用
    pub enabled: bool,
    /// 模型推理地址
    pub api_url: String,
    /// API 密钥，未配置时 provider 不可用
    pub api_key: Option<String>,
    pub max_length: u32,
    pub temperature: f32,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

/// 编排器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 整条降级链的总时限（秒），0 表示不限制
    pub request_deadline_secs: u64,
    /// 每个会话保留的最大消息数，0 表示不限制
    pub history_limit: usize,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 人设配置
    pub persona: PersonaConfig,
    /// 本地模型配置
    pub local_model: LocalModelConfig,
    /// OpenAI 配置
    pub openai: ChatApiConfig,
    /// Gemini 配置
    pub gemini: ChatApiConfig,
    /// 网页搜索配置
    pub web_search: WebSearchConfig,
    /// 通用推理 API 配置
    pub inference: InferenceConfig,
    /// 编排器配置
    pub orchestrator: OrchestratorConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 5000,
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                debug_log: Some(PathBuf::from("debug.log")),
            },
            persona: PersonaConfig {
                name: "Cloudy".into(),
                prefix: "Cloudy ☁️:".into(),
            },
            local_model: LocalModelConfig {
                enabled: true,
                base_url: "http://localhost:11434".into(),
                model: "llama3.2:1b".into(),
                fallback_model: "llama3.2:1b".into(),
                binary: Some(PathBuf::from("ollama")),
                startup_grace_secs: 5,
                readiness_timeout_secs: 3,
                timeout_secs: 60,
                temperature: 0.8,
                top_p: 0.9,
                num_predict: 1000,
                repeat_penalty: 1.1,
                num_ctx: 2048,
            },
            openai: ChatApiConfig {
                enabled: true,
                base_url: "https://api.openai.com".into(),
                api_key: None,
                model: "gpt-4o-mini".into(),
                temperature: 0.7,
                max_tokens: 800,
                timeout_secs: 15,
            },
            gemini: ChatApiConfig {
                enabled: true,
                base_url: "https://generativelanguage.googleapis.com".into(),
                api_key: None,
                model: "gemini-pro".into(),
                temperature: 0.7,
                max_tokens: 800,
                timeout_secs: 15,
            },
            web_search: WebSearchConfig {
                enabled: true,
                api_endpoint: "https://api.duckduckgo.com/".into(),
                max_results: 5,
                summary_results: 3,
                timeout_secs: 10,
                user_agent: "cloudy-assistant/0.1".into(),
            },
            inference: InferenceConfig {
                enabled: true,
                api_url: "https://api-inference.huggingface.co/models/microsoft/DialoGPT-medium"
                    .into(),
                api_key: None,
                max_length: 500,
                temperature: 0.7,
                timeout_secs: 10,
            },
            orchestrator: OrchestratorConfig {
                request_deadline_secs: 90,
                history_limit: 200,
            },
            app_name: "cloudy".into(),
            environment: "development".into(),
        }
    }

    /// 所有网络 provider 均关闭的配置，只剩规则引擎兜底
    pub fn offline() -> Self {
        let mut config = Self::development();
        config.local_model.enabled = false;
        config.openai.enabled = false;
        config.gemini.enabled = false;
        config.web_search.enabled = false;
        config.inference.enabled = false;
        config.logging.debug_log = None;
        config
    }
}

use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序（后者覆盖前者）：
    /// 1. 内置开发默认值，加上常规环境变量（OPENAI_API_KEY、OPENAI_MODEL 等）
    /// 2. ./cloudy.toml
    /// 3. `CLOUDY_` 前缀的环境变量（`__` 作为层级分隔符）
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        // .env 不存在不是错误
        let _ = dotenvy::dotenv();

        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// 用给定的环境查找函数加载配置
    ///
    /// 常规环境变量只作为默认值，配置文件中的设置优先。
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<AppConfig, figment::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaults = AppConfig::development();
        apply_credential_env(&mut defaults, lookup);

        Figment::from(Serialized::defaults(defaults))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CLOUDY_").split("__"))
            .extract()
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.persona.prefix.trim().is_empty() {
            return Err(ConfigValidationError::MissingPersonaPrefix);
        }

        let timeouts = [
            ("local_model.timeout_secs", config.local_model.timeout_secs),
            ("openai.timeout_secs", config.openai.timeout_secs),
            ("gemini.timeout_secs", config.gemini.timeout_secs),
            ("web_search.timeout_secs", config.web_search.timeout_secs),
            ("inference.timeout_secs", config.inference.timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigValidationError::InvalidTimeout(name.to_string()));
        }

        let search = &config.web_search;
        if search.summary_results == 0 || search.max_results < search.summary_results {
            return Err(ConfigValidationError::InvalidSearchLimits {
                max_results: search.max_results,
                summary_results: search.summary_results,
            });
        }

        Ok(())
    }
}

/// 用常规环境变量补全尚未设置的凭据，并覆盖默认模型
///
/// 在合并配置文件之前作用于默认值，因此文件中的设置总是优先。
pub fn apply_credential_env<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if config.openai.api_key.is_none() {
        config.openai.api_key = non_empty("OPENAI_API_KEY");
    }
    if let Some(model) = non_empty("OPENAI_MODEL") {
        config.openai.model = model;
    }
    if config.gemini.api_key.is_none() {
        config.gemini.api_key = non_empty("GEMINI_API_KEY");
    }
    if let Some(model) = non_empty("GEMINI_MODEL") {
        config.gemini.model = model;
    }
    if config.inference.api_key.is_none() {
        config.inference.api_key = non_empty("HUGGING_FACE_API_KEY");
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("服务端口无效，必须大于 0")]
    InvalidPort,

    #[error("人设回复前缀未配置")]
    MissingPersonaPrefix,

    #[error("超时配置无效，必须大于 0: {0}")]
    InvalidTimeout(String),

    #[error("搜索结果数量无效: max_results={max_results}, summary_results={summary_results}")]
    InvalidSearchLimits {
        max_results: usize,
        summary_results: usize,
    },
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("cloudy.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_development_config_is_valid() {
        assert!(ConfigLoader::validate(&AppConfig::development()).is_ok());
        assert!(ConfigLoader::validate(&AppConfig::offline()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::development();
        config.server.port = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidPort)
        ));

        let mut config = AppConfig::development();
        config.openai.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidTimeout(name)) if name == "openai.timeout_secs"
        ));

        let mut config = AppConfig::development();
        config.web_search.max_results = 2;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidSearchLimits { .. })
        ));
    }

    #[test]
    fn test_credential_env_fills_missing_keys() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("GEMINI_API_KEY", "   "),
            ("GEMINI_MODEL", "gemini-1.5-flash"),
        ]);
        let mut config = AppConfig::development();
        config.inference.api_key = Some("from-file".into());

        apply_credential_env(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.inference.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_file_settings_win_over_conventional_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloudy.toml");
        std::fs::write(
            &path,
            "[openai]\nmodel = \"gpt-4o\"\napi_key = \"sk-file\"\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("OPENAI_MODEL", "gpt-3.5-turbo"),
            ("GEMINI_API_KEY", "g-env"),
            ("GEMINI_MODEL", "gemini-1.5-flash"),
        ]);
        let config =
            ConfigLoader::load_with(&path, |key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.gemini.api_key.as_deref(), Some("g-env"));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = ConfigLoader::load_from("does-not-exist.toml").unwrap();
        assert_eq!(config.persona.prefix, "Cloudy ☁️:");
        assert_eq!(config.web_search.max_results, 5);
    }
}

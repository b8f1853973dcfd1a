//! 助手人设
//!
//! 所有回复都以人设前缀开头，各 provider 的输出在这里统一规范化。

use crate::config::config::PersonaConfig;

/// 助手人设
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    name: String,
    prefix: String,
}

impl Persona {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.trim().to_string(),
        }
    }

    pub fn from_config(config: &PersonaConfig) -> Self {
        Self::new(&config.name, &config.prefix)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 以人设口吻说出一段正文
    pub fn speak(&self, body: &str) -> String {
        format!("{} {}", self.prefix, body.trim())
    }

    /// 规范化模型原始输出：去空白，缺前缀时补上
    ///
    /// 去掉前缀后没有正文的输出视为无效，返回 None。
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix(&self.prefix).unwrap_or(trimmed).trim();
        if body.is_empty() {
            return None;
        }

        if trimmed.starts_with(&self.prefix) {
            Some(trimmed.to_string())
        } else {
            Some(self.speak(trimmed))
        }
    }

    /// 对话型 API 使用的 system 指令
    pub fn system_prompt(&self) -> String {
        format!(
            r#"You are {name}, a friendly, intelligent, and engaging cloud-themed chatbot assistant. You should:
- Always respond as "{prefix}" followed by your message
- Be helpful, friendly, conversational, and enthusiastic
- Provide detailed, well-structured, and informative responses
- Use clear formatting with bullet points or numbered lists when appropriate
- Include relevant examples and practical insights
- If someone tells you their name, use it in your response
- Be knowledgeable about cloud computing, technology, science, and general topics
- Provide comprehensive answers (2-4 sentences minimum, can be longer for complex topics)
- Use cloud and weather emojis occasionally ☁️ ⛅ 🌤️ 💨 🌩️
- Format code examples with proper syntax highlighting when needed
- Ask follow-up questions to clarify or deepen understanding"#,
            name = self.name,
            prefix = self.prefix,
        )
    }

    /// 仅接受单段指令的 API 使用的准则版本
    pub fn guidelines(&self) -> String {
        format!(
            r#"You are {name}, a friendly, intelligent, and engaging cloud-themed chatbot assistant. Respond to the user's message as {name}.

Guidelines:
- Always start with "{prefix}"
- Provide detailed, well-structured, and informative responses
- Use clear formatting with bullet points or numbered lists when appropriate
- Include relevant examples and practical insights
- Provide comprehensive answers (2-4 sentences minimum, can be longer for complex topics)
- Use cloud and weather emojis occasionally ☁️ ⛅ 🌤️ 💨 🌩️
- Format code examples with proper syntax highlighting when needed
- Ask follow-up questions to clarify or deepen understanding
- Be helpful, friendly, conversational, and enthusiastic"#,
            name = self.name,
            prefix = self.prefix,
        )
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new("Cloudy", "Cloudy ☁️:")
    }
}

//! 文本匹配辅助
//!
//! 规则按词边界匹配，而不是裸子串：`hi` 不会命中 "this"，`ai` 不会命中 "explain"。

/// 小写化并切分为词的文本
#[derive(Debug, Clone)]
pub struct NormalizedText {
    lower: String,
    words: Vec<String>,
    /// 以空格包围、以单个空格连接的词序列，用于短语匹配
    joined: String,
}

impl NormalizedText {
    pub fn new(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        let words: Vec<String> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        let joined = format!(" {} ", words.join(" "));

        Self {
            lower,
            words,
            joined,
        }
    }

    /// 小写、去首尾空白后的原文
    pub fn as_str(&self) -> &str {
        &self.lower
    }

    pub fn is_blank(&self) -> bool {
        self.words.is_empty()
    }

    /// 完整词匹配
    pub fn has_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    /// 词前缀匹配，用于词干（`benefit` 命中 `benefits`）
    pub fn has_stem(&self, stem: &str) -> bool {
        self.words.iter().any(|w| w.starts_with(stem))
    }

    /// 按词边界的短语匹配
    pub fn has_phrase(&self, phrase: &str) -> bool {
        let phrase = NormalizedText::new(phrase);
        !phrase.is_blank() && self.joined.contains(&phrase.joined)
    }

    pub fn any_word(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.has_word(w))
    }

    pub fn any_stem(&self, stems: &[&str]) -> bool {
        stems.iter().any(|s| self.has_stem(s))
    }

    pub fn any_phrase(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.has_phrase(p))
    }
}

//! 意图分类：判断消息是否需要实时网页信息
//!
//! 纯函数，无 I/O。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::text::NormalizedText;

/// 需要整词匹配的时效/话题关键词
const LIVE_WORDS: &[&str] = &[
    "today", "now", "current", "currently", "latest", "recent", "recently", "news", "weather",
    "happening", "best", "top", "find",
];

/// 按词干匹配的关键词
const LIVE_STEMS: &[&str] = &["stock", "price", "score", "update", "search", "compar"];

/// 短语关键词
const LIVE_PHRASES: &[&str] = &[
    "this year",
    "what happened",
    "when did",
    "look up",
    "tell me about",
    "information about",
    "list of",
];

/// 疑问句式，可被排除词抑制
const QUESTION_PATTERNS: &[&str] = &["what is", "who is", "where is", "when is", "how to", "why is"];

/// 封闭式/技术性问题的排除词干
const EXCLUSION_STEMS: &[&str] = &["function", "code", "program", "algorithm", "theorem", "formula"];

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b20\d{2}\b").expect("valid year regex"));

/// 意图分类器
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// 消息是否需要实时信息
    ///
    /// 关键词命中总是为真；疑问句式命中时，若同时含有排除词则不计。
    pub fn needs_live_info(&self, text: &str) -> bool {
        let text = NormalizedText::new(text);
        if text.is_blank() {
            return false;
        }

        Self::has_live_keyword(&text) || Self::is_open_question(&text)
    }

    fn has_live_keyword(text: &NormalizedText) -> bool {
        text.any_word(LIVE_WORDS)
            || text.any_stem(LIVE_STEMS)
            || text.any_phrase(LIVE_PHRASES)
            || YEAR.is_match(text.as_str())
    }

    fn is_open_question(text: &NormalizedText) -> bool {
        text.any_phrase(QUESTION_PATTERNS) && !text.any_stem(EXCLUSION_STEMS)
    }
}

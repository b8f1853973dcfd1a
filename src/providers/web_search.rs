//! 网页搜索适配器
//!
//! 使用 DuckDuckGo Instant Answer API 做一次实时查询，把前几条结果拼成回复。
//! 没有结果时弃权，不会返回空的成功。

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Persona, Provider, ProviderKind, abstain, classify_status, classify_transport};
use crate::config::config::WebSearchConfig;
use crate::error::Result;
use crate::models::{FailureKind, ProviderResult};

const FOOTER: &str = "💡 *Information sourced from the web in real-time*";

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct DuckDuckGoResponse {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Result {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

impl DuckDuckGoResponse {
    fn into_hits(self, limit: usize) -> Vec<SearchHit> {
        fn collect(topics: Vec<RelatedTopic>, hits: &mut Vec<SearchHit>, limit: usize) {
            for topic in topics {
                if hits.len() >= limit {
                    break;
                }
                match topic {
                    RelatedTopic::Result { text, first_url } => {
                        // "标题 - 描述" 形式的文本拆成两部分
                        let (title, snippet) = match text.split_once(" - ") {
                            Some((title, snippet)) => (non_empty(title), non_empty(snippet)),
                            None => (non_empty(&text), None),
                        };
                        if title.is_some() || snippet.is_some() {
                            hits.push(SearchHit {
                                title,
                                snippet,
                                url: first_url,
                            });
                        }
                    }
                    RelatedTopic::Group { topics } => collect(topics, hits, limit),
                }
            }
        }

        let mut hits = Vec::new();
        if limit > 0 && !self.abstract_text.trim().is_empty() {
            hits.push(SearchHit {
                title: non_empty(&self.heading),
                snippet: non_empty(&self.abstract_text),
                url: self.abstract_url,
            });
        }
        collect(self.related_topics, &mut hits, limit);
        hits
    }
}

/// 网页搜索 provider
pub struct WebSearchProvider {
    client: reqwest::Client,
    config: WebSearchConfig,
    persona: Persona,
}

impl std::fmt::Debug for WebSearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchProvider")
            .field("api_endpoint", &self.config.api_endpoint)
            .finish()
    }
}

impl WebSearchProvider {
    pub fn new(config: WebSearchConfig, persona: Persona) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            persona,
        })
    }

    /// 执行搜索，最多返回 `max_results` 条
    pub async fn search(&self, query: &str) -> std::result::Result<Vec<SearchHit>, FailureKind> {
        debug!(target: "web_search", %query, "Performing DuckDuckGo search");

        let url = format!(
            "{}?q={}&format=json&no_html=1&skip_disambig=1",
            self.config.api_endpoint,
            urlencoding::encode(query)
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(target: "web_search", error = %e, "Search request failed");
            classify_transport(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(target: "web_search", %status, "Search API returned error");
            return Err(classify_status(status, &error_text));
        }

        // DuckDuckGo 有时以 application/x-javascript 返回 JSON，按文本解析
        let body = response.text().await.map_err(|e| classify_transport(&e))?;
        let parsed: DuckDuckGoResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(target: "web_search", error = %e, "Failed to parse search response");
            FailureKind::MalformedResponse
        })?;

        Ok(parsed.into_hits(self.config.max_results))
    }

    /// 把前 `summary_results` 条结果拼成回复
    pub fn summarize(&self, hits: &[SearchHit]) -> String {
        let mut reply = format!(
            "{} Based on my web search, here's what I found:\n\n",
            self.persona.prefix()
        );

        for (i, hit) in hits.iter().take(self.config.summary_results).enumerate() {
            let title = hit.title.as_deref().unwrap_or("No title");
            let snippet = hit.snippet.as_deref().unwrap_or("No description");
            let _ = writeln!(reply, "**{}. {}**", i + 1, title);
            let _ = writeln!(reply, "{}", snippet);
            if !hit.url.is_empty() {
                let _ = writeln!(reply, "🔗 Source: {}", hit.url);
            }
            reply.push('\n');
        }

        reply.push_str(FOOTER);
        reply
    }
}

#[async_trait]
impl Provider for WebSearchProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WebSearch
    }

    async fn attempt(&self, message: &str) -> ProviderResult {
        match self.search(message).await {
            Ok(hits) if hits.is_empty() => {
                abstain(self.kind(), FailureKind::MalformedResponse, "no search results")
            }
            Ok(hits) => {
                debug!(target: "web_search", count = hits.len(), "Search results found");
                ProviderResult::Reply(self.summarize(&hits))
            }
            Err(kind) => abstain(self.kind(), kind, "search failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> WebSearchProvider {
        let mut config = AppConfig::development().web_search;
        config.api_endpoint = format!("{}/", server.uri());
        WebSearchProvider::new(config, Persona::default()).unwrap()
    }

    fn hit(title: &str, snippet: &str, url: &str) -> SearchHit {
        SearchHit {
            title: non_empty(title),
            snippet: non_empty(snippet),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_summary_format() {
        let server_less = WebSearchProvider::new(
            AppConfig::development().web_search,
            Persona::default(),
        )
        .unwrap();
        let hits = vec![
            hit("Rust", "A language", "https://rust-lang.org"),
            hit("", "", ""),
            hit("Third", "Snippet", "https://c.example"),
            hit("Fourth", "Never shown", "https://d.example"),
        ];

        let reply = server_less.summarize(&hits);
        assert_eq!(
            reply,
            "Cloudy ☁️: Based on my web search, here's what I found:\n\n\
             **1. Rust**\nA language\n🔗 Source: https://rust-lang.org\n\n\
             **2. No title**\nNo description\n\n\
             **3. Third**\nSnippet\n🔗 Source: https://c.example\n\n\
             💡 *Information sourced from the web in real-time*"
        );
    }

    #[test]
    fn test_hits_from_abstract_and_nested_topics() {
        let response: DuckDuckGoResponse = serde_json::from_value(json!({
            "Heading": "Rust",
            "AbstractText": "Rust is a systems language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust",
            "RelatedTopics": [
                { "Text": "Cargo - The Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo" },
                { "Name": "Tools", "Topics": [
                    { "Text": "Clippy", "FirstURL": "https://duckduckgo.com/Clippy" },
                    { "Text": "Rustfmt", "FirstURL": "https://duckduckgo.com/Rustfmt" }
                ] }
            ]
        }))
        .unwrap();

        let hits = response.into_hits(3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title.as_deref(), Some("Rust"));
        assert_eq!(hits[1], hit("Cargo", "The Rust package manager", "https://duckduckgo.com/Cargo"));
        assert_eq!(hits[2].title.as_deref(), Some("Clippy"));
        assert_eq!(hits[2].snippet, None);
    }

    #[tokio::test]
    async fn test_zero_results_abstains() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "nothing here"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Heading": "", "AbstractText": "", "AbstractURL": "", "RelatedTopics": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("nothing here").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::MalformedResponse));
    }

    #[tokio::test]
    async fn test_results_become_reply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                json!({
                    "Heading": "Weather",
                    "AbstractText": "Weather is the state of the atmosphere.",
                    "AbstractURL": "https://en.wikipedia.org/wiki/Weather",
                    "RelatedTopics": []
                })
                .to_string(),
            ))
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("weather today").await;
        let ProviderResult::Reply(reply) = result else {
            panic!("expected a reply, got {result:?}");
        };
        assert!(reply.starts_with("Cloudy ☁️: Based on my web search"));
        assert!(reply.contains("**1. Weather**"));
        assert!(reply.ends_with(FOOTER));
    }

    #[tokio::test]
    async fn test_server_error_abstains() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = provider_for(&server).attempt("news").await;
        assert_eq!(result, ProviderResult::Abstain(FailureKind::ServiceUnavailable));
    }
}

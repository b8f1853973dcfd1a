// End-to-end tests for the chat flow
//
// Tests cover:
// - Name memory round-trip through the HTTP surface
// - Session isolation and the shared name slot
// - Provider ordering against fake upstream services
// - Bounded fallback when every provider is unavailable

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudy::api::{app_state::AppState, create_router};
use cloudy::config::AppConfig;
use cloudy::observability::ChatMetrics;
use cloudy::providers::Capabilities;
use cloudy::services::{AnsweredBy, Orchestrator, create_orchestrator};
use cloudy::storage::{SessionStore, UserMemory};

struct Harness {
    router: Router,
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionStore>,
    memory: Arc<UserMemory>,
}

fn harness(config: AppConfig) -> Harness {
    let capabilities = Capabilities::resolve(&config);
    let sessions = Arc::new(SessionStore::new(config.orchestrator.history_limit));
    let memory = Arc::new(UserMemory::new());
    let metrics = Arc::new(ChatMetrics::default());
    let orchestrator = create_orchestrator(
        &config,
        &capabilities,
        sessions.clone(),
        memory.clone(),
        metrics.clone(),
    );
    let state = AppState::new(orchestrator, sessions.clone(), metrics);

    Harness {
        router: create_router(state.clone()),
        orchestrator: state.orchestrator,
        sessions,
        memory,
    }
}

async fn send(router: &Router, session: &str, message: &str) -> String {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/get")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("session_id={session}"))
                .body(Body::from(json!({ "message": message }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    json["reply"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_name_round_trip() {
    let h = harness(AppConfig::offline());

    let reply = send(&h.router, "tab-1", "My name is Sam").await;
    assert!(reply.contains("Sam"), "{reply}");

    let reply = send(&h.router, "tab-1", "What is my name?").await;
    assert!(reply.contains("Sam"), "{reply}");
}

#[tokio::test]
async fn test_sessions_isolated_but_name_shared() {
    let h = harness(AppConfig::offline());

    let (first, second) = tokio::join!(
        send(&h.router, "tab-a", "My name is Priya"),
        send(&h.router, "tab-b", "Tell me a fun fact")
    );
    assert!(first.contains("Priya"));
    assert!(second.starts_with("Cloudy ☁️:"));

    let a = h.sessions.history("tab-a");
    let b = h.sessions.history("tab-b");
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 2);
    assert_eq!(a[0].content, "My name is Priya");
    assert_eq!(b[0].content, "Tell me a fun fact");

    // 名字记忆是进程级共享的
    let reply = send(&h.router, "tab-b", "what's my name").await;
    assert!(reply.contains("Priya"), "{reply}");
    assert_eq!(h.memory.name().as_deref(), Some("Priya"));
}

#[tokio::test]
async fn test_all_unavailable_terminates_quickly() {
    let h = harness(AppConfig::offline());

    let started = Instant::now();
    for input in ["", "   ", "latest news today", "What is the capital of France?", "zzz"] {
        let outcome = h.orchestrator.respond("default", input).await;
        assert_eq!(outcome.answered_by, AnsweredBy::Fallback);
        assert!(outcome.reply.starts_with("Cloudy ☁️:"));
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_empty_search_falls_through_to_rules() {
    let search = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Heading": "", "AbstractText": "", "AbstractURL": "", "RelatedTopics": []
        })))
        .expect(1)
        .mount(&search)
        .await;

    let mut config = AppConfig::offline();
    config.web_search.enabled = true;
    config.web_search.api_endpoint = format!("{}/", search.uri());
    let h = harness(config);

    let outcome = h.orchestrator.respond("default", "latest weather news").await;
    assert!(outcome.needs_live_info);
    assert_eq!(outcome.answered_by, AnsweredBy::Fallback);
}

#[tokio::test]
async fn test_chat_b_not_called_after_chat_a_succeeds() {
    let chat_a = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Cloudy ☁️: hello from A" } }]
        })))
        .expect(1)
        .mount(&chat_a)
        .await;

    let chat_b = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&chat_b)
        .await;

    let mut config = AppConfig::offline();
    config.openai.enabled = true;
    config.openai.base_url = chat_a.uri();
    config.openai.api_key = Some("sk-test".into());
    config.gemini.enabled = true;
    config.gemini.base_url = chat_b.uri();
    config.gemini.api_key = Some("g-test".into());
    let h = harness(config);

    let reply = send(&h.router, "tab-1", "Tell me a joke").await;
    assert_eq!(reply, "Cloudy ☁️: hello from A");
}

#[tokio::test]
async fn test_chat_b_answers_when_chat_a_fails() {
    let chat_a = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit reached"))
        .expect(1)
        .mount(&chat_a)
        .await;

    let chat_b = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "hello from B" }] } }]
        })))
        .expect(1)
        .mount(&chat_b)
        .await;

    let mut config = AppConfig::offline();
    config.openai.enabled = true;
    config.openai.base_url = chat_a.uri();
    config.openai.api_key = Some("sk-test".into());
    config.gemini.enabled = true;
    config.gemini.base_url = chat_b.uri();
    config.gemini.api_key = Some("g-test".into());
    let h = harness(config);

    let reply = send(&h.router, "tab-1", "Tell me a joke").await;
    assert_eq!(reply, "Cloudy ☁️: hello from B");
}

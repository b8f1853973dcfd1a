//! 可观测性模块
//!
//! 提供 Prometheus 指标、结构化日志、调试日志文件和健康检查。

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::config::LoggingConfig;
use crate::providers::{Capabilities, Capability, ProviderKind};
use crate::services::AnsweredBy;
use crate::storage::SessionStore;

// ===== Chat Metrics =====

/// 对话指标
#[derive(Debug, Default)]
pub struct ChatMetrics {
    http_requests_total: AtomicU64,
    http_request_duration_sum: AtomicU64,
    chat_requests_total: AtomicU64,
    replies_web_search: AtomicU64,
    replies_local_model: AtomicU64,
    replies_chat_a: AtomicU64,
    replies_chat_b: AtomicU64,
    replies_generic_inference: AtomicU64,
    replies_fallback: AtomicU64,
    provider_abstains_total: AtomicU64,
    deadline_overruns_total: AtomicU64,
    recovered_panics_total: AtomicU64,
}

impl ChatMetrics {
    /// 记录 HTTP 请求
    pub fn record_http_request(&self, duration_ms: u64) {
        self.http_requests_total.fetch_add(1, Ordering::SeqCst);
        self.http_request_duration_sum
            .fetch_add(duration_ms, Ordering::SeqCst);
    }

    /// 记录一次对话请求
    pub fn record_request(&self) {
        self.chat_requests_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录给出回复的阶段
    pub fn record_answer(&self, answered_by: AnsweredBy) {
        let counter = match answered_by {
            AnsweredBy::Provider(ProviderKind::WebSearch) => &self.replies_web_search,
            AnsweredBy::Provider(ProviderKind::LocalModel) => &self.replies_local_model,
            AnsweredBy::Provider(ProviderKind::ChatA) => &self.replies_chat_a,
            AnsweredBy::Provider(ProviderKind::ChatB) => &self.replies_chat_b,
            AnsweredBy::Provider(ProviderKind::GenericInference) => &self.replies_generic_inference,
            AnsweredBy::Fallback => &self.replies_fallback,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_abstain(&self) {
        self.provider_abstains_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_deadline_overrun(&self) {
        self.deadline_overruns_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_panic(&self) {
        self.recovered_panics_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn chat_requests(&self) -> u64 {
        self.chat_requests_total.load(Ordering::SeqCst)
    }

    pub fn fallback_replies(&self) -> u64 {
        self.replies_fallback.load(Ordering::SeqCst)
    }

    pub fn deadline_overruns(&self) -> u64 {
        self.deadline_overruns_total.load(Ordering::SeqCst)
    }

    pub fn recovered_panics(&self) -> u64 {
        self.recovered_panics_total.load(Ordering::SeqCst)
    }

    /// 生成 Prometheus 格式指标
    pub fn gather(&self, sessions_active: usize) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::SeqCst);

        format!(
            r#"# HELP http_requests_total Total HTTP requests
# TYPE http_requests_total counter
http_requests_total {}
# HELP http_request_duration_seconds HTTP request duration in seconds
# TYPE http_request_duration_seconds summary
http_request_duration_seconds_sum {}
http_request_duration_seconds_count {}
# HELP chat_requests_total Total chat messages handled
# TYPE chat_requests_total counter
chat_requests_total {}
# HELP chat_replies_total Replies by answering stage
# TYPE chat_replies_total counter
chat_replies_total{{stage="web_search"}} {}
chat_replies_total{{stage="local_model"}} {}
chat_replies_total{{stage="chat_a"}} {}
chat_replies_total{{stage="chat_b"}} {}
chat_replies_total{{stage="generic_inference"}} {}
chat_replies_total{{stage="fallback"}} {}
# HELP provider_abstains_total Provider attempts that produced no reply
# TYPE provider_abstains_total counter
provider_abstains_total {}
# HELP deadline_overruns_total Requests that hit the global deadline
# TYPE deadline_overruns_total counter
deadline_overruns_total {}
# HELP recovered_panics_total Provider panics caught by the orchestrator
# TYPE recovered_panics_total counter
recovered_panics_total {}
# HELP sessions_active Sessions with recorded history
# TYPE sessions_active gauge
sessions_active {}
"#,
            load(&self.http_requests_total),
            load(&self.http_request_duration_sum) as f64 / 1000.0,
            load(&self.http_requests_total),
            load(&self.chat_requests_total),
            load(&self.replies_web_search),
            load(&self.replies_local_model),
            load(&self.replies_chat_a),
            load(&self.replies_chat_b),
            load(&self.replies_generic_inference),
            load(&self.replies_fallback),
            load(&self.provider_abstains_total),
            load(&self.deadline_overruns_total),
            load(&self.recovered_panics_total),
            sessions_active,
        )
    }
}

// ===== Health Check =====

/// 健康检查状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<HealthCheck>,
}

/// 单个健康检查项
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
}

/// 可观测性路由共享状态
#[derive(Clone)]
pub struct ObservabilityState {
    pub metrics: Arc<ChatMetrics>,
    pub capabilities: Arc<Capabilities>,
    pub sessions: Arc<SessionStore>,
    pub start_time: DateTime<Utc>,
    pub version: String,
}

impl ObservabilityState {
    pub fn new(
        version: &str,
        metrics: Arc<ChatMetrics>,
        capabilities: Arc<Capabilities>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            metrics,
            capabilities,
            sessions,
            start_time: Utc::now(),
            version: version.to_string(),
        }
    }

    /// 获取应用正常运行时间
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_seconds() as f64
    }

    fn checks(&self) -> Vec<HealthCheck> {
        let mut checks: Vec<HealthCheck> = ProviderKind::ALL
            .iter()
            .map(|kind| match self.capabilities.get(*kind) {
                Capability::Available => HealthCheck {
                    name: kind.to_string(),
                    status: "available".to_string(),
                    message: None,
                },
                Capability::Unavailable(reason) => HealthCheck {
                    name: kind.to_string(),
                    status: "unavailable".to_string(),
                    message: Some(reason.clone()),
                },
            })
            .collect();

        checks.push(HealthCheck {
            name: "fallback_rules".to_string(),
            status: "available".to_string(),
            message: None,
        });
        checks
    }
}

// ===== Health Check Handlers =====

/// 获取完整健康状态
///
/// 规则兜底总是可用，所以服务始终能回复；没有网络 provider 时状态为 degraded。
pub async fn health_check(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let status = if state.capabilities.available_count() > 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
        checks: state.checks(),
    })
}

/// 简单存活检查
pub async fn liveness() -> impl IntoResponse {
    "OK"
}

/// 就绪检查
pub async fn readiness() -> impl IntoResponse {
    (StatusCode::OK, "Ready")
}

/// Prometheus 指标端点
pub async fn metrics(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let output = state.metrics.gather(state.sessions.session_count());
    (StatusCode::OK, output)
}

/// 版本信息端点
pub async fn version(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "version": state.version,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 创建可观测性路由
pub fn create_observability_router(state: Arc<ObservabilityState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .with_state(state)
}

// ===== Structured Logging =====

/// 初始化日志
///
/// 控制台输出按配置选择纯文本或 JSON；配置了 `debug_log` 时额外把所有事件
/// 追加写入该文件。返回的 guard 必须在进程生命周期内持有，否则缓冲的日志会丢失。
pub fn init_tracing(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=info,reqwest=info", config.level)));

    let json = config
        .structured
        .then(|| fmt::layer().json().with_target(true).with_line_number(true));
    let plain = (!config.structured).then(|| fmt::layer().with_target(true).with_line_number(true));

    let (file, guard) = match config.debug_log.as_deref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(debug_log_appender(path));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(plain)
        .with(file)
        .try_init()?;

    Ok(guard)
}

fn debug_log_appender(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "debug.log".into());

    tracing_appender::rolling::never(directory, file_name)
}

// ===== Request Metrics Middleware =====

/// 记录请求指标的中间件
pub async fn track_requests(
    State(metrics): State<Arc<ChatMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let start = std::time::Instant::now();
    let response = next.run(req).await;
    metrics.record_http_request(start.elapsed().as_millis() as u64);
    response
}

//! 错误处理模块
//!
//! 注意：Provider 的失败不会以 `AppError` 的形式到达 HTTP 层，
//! 它们在适配器内部被归类为 [`crate::models::FailureKind`]。
//! 这里只覆盖启动期的构造错误和请求本身不合法的情况。

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 请求体无法解析
    #[error("请求无效: {message}")]
    InvalidRequest { message: String, details: String },

    /// 配置错误（如缺少凭据）
    #[error("配置错误: {0}")]
    Config(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 上游服务错误
    #[error("上游服务错误: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout(e.to_string())
        } else {
            AppError::Upstream(e.to_string())
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest {
            message: "request body must be a JSON object".to_string(),
            details: rejection.body_text(),
        }
    }
}

impl AppError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let mut body = ErrorResponse::new(code, &self.to_string());
        if let AppError::InvalidRequest { details, .. } = &self {
            body = body.with_details(details);
        }
        (status, Json(body)).into_response()
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 详细信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

//! Chat Routes
//!
//! 定义对话 API 路由，以及网页前端使用的根路径路由。

use crate::api::handlers::{chat_handler::chat, session_handler::new_session};
use axum::{routing::post, Router};

use crate::api::app_state::AppState;

/// 创建对话路由器（挂在 /api/v1 下）
pub fn create_chat_router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

/// 创建网页前端使用的路由器
pub fn create_web_router() -> Router<AppState> {
    Router::new()
        .route("/get", post(chat))
        .route("/new-chat", post(new_session))
}

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    api::{app_state::AppState, dto::session_dto::*},
    error::AppError,
    storage::DEFAULT_SESSION,
};

/// 会话 cookie 名
pub const SESSION_COOKIE: &str = "session_id";

/// 会话标识请求头，供不使用 cookie 的客户端使用
pub const SESSION_HEADER: &str = "x-session-id";

/// 从请求中取出会话标识
///
/// 依次查找 `session_id` cookie 和 `X-Session-Id` 头，都没有时使用 "default"。
pub fn session_id_from(headers: &HeaderMap) -> String {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    from_cookie
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
        })
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

pub async fn new_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let previous = session_id_from(&headers);
    let session_id = Uuid::new_v4().simple().to_string();
    debug!("Starting new chat session {} (replacing {})", session_id, previous);

    // 没有携带会话标识的客户端共享 "default"，不能替它们清空
    if previous != DEFAULT_SESSION {
        state.sessions.remove(&previous);
    }
    state.sessions.reset(&session_id);

    let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
    let response = NewChatResponse {
        success: true,
        message: "New chat started!".to_string(),
        session_id,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(response)))
}

pub async fn session_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session_id = session_id_from(&headers);
    debug!("Fetching history for session {}", session_id);

    let messages = state.sessions.history(&session_id);
    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

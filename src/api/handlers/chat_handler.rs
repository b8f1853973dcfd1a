use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::chat_dto::*, handlers::session_handler::session_id_from},
    error::AppError,
};

/// 处理一条用户消息
///
/// 请求体合法时总是返回 200 和一条回复，provider 的失败不会暴露给调用方。
/// 请求体不是 JSON 对象时返回 400。
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let session_id = session_id_from(&headers);
    debug!("Chat message for session {}", session_id);

    let reply = state.orchestrator.handle(&session_id, &request.message).await;

    Ok(Json(ChatResponse { reply }))
}

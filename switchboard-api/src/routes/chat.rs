//! Chat Routes
//!
//! Agent-initiated close of a chat conversation.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::TaskLifecycle,
    state::AppState,
    types::CloseConversationResponse,
};

/// POST /chat/conversations/{sid}/close - Close a conversation and settle its task
#[utoipa::path(
    post,
    path = "/chat/conversations/{sid}/close",
    tag = "Chat",
    params(
        ("sid" = String, Path, description = "Conversation SID")
    ),
    responses(
        (status = 200, description = "Conversation closed", body = CloseConversationResponse),
        (status = 404, description = "Conversation not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn close_conversation(
    State(lifecycle): State<TaskLifecycle>,
    AuthExtractor(agent): AuthExtractor,
    Path(sid): Path<String>,
) -> ApiResult<Json<CloseConversationResponse>> {
    let outcome = lifecycle.close_conversation(&sid).await?;
    tracing::info!(
        conversation_sid = %sid,
        agent_id = %agent.agent_id,
        outcome = outcome.as_str(),
        "Agent closed conversation"
    );
    Ok(Json(CloseConversationResponse {
        ok: true,
        task_sid: outcome.task_sid().map(str::to_string),
        outcome: outcome.as_str().to_string(),
        conversation_sid: sid,
    }))
}

/// Create the chat routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/conversations/:sid/close", post(close_conversation))
        .with_state(state)
}

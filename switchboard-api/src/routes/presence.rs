//! Presence Routes

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use switchboard_core::{PresenceSnapshot, WorkerPresence};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::PresenceService,
    state::AppState,
    types::SetActivityRequest,
};

/// GET /presence - Availability of every worker
#[utoipa::path(
    get,
    path = "/presence",
    tag = "Presence",
    responses(
        (status = 200, description = "Current presence snapshot", body = PresenceSnapshot),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_presence(
    State(presence): State<PresenceService>,
    AuthExtractor(_agent): AuthExtractor,
) -> ApiResult<Json<PresenceSnapshot>> {
    Ok(Json(presence.snapshot().await?))
}

/// POST /presence/activity - Change the signed-in agent's activity
#[utoipa::path(
    post,
    path = "/presence/activity",
    tag = "Presence",
    request_body = SetActivityRequest,
    responses(
        (status = 200, description = "Activity changed", body = WorkerPresence),
        (status = 400, description = "Missing activity", body = ApiError),
        (status = 404, description = "Unknown activity", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_activity(
    State(presence): State<PresenceService>,
    AuthExtractor(agent): AuthExtractor,
    Json(req): Json<SetActivityRequest>,
) -> ApiResult<Json<WorkerPresence>> {
    let worker = presence
        .set_activity(&agent.worker_sid, &req.activity_sid)
        .await?;
    Ok(Json(WorkerPresence::from(&worker)))
}

/// Create the presence routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_presence))
        .route("/activity", post(set_activity))
        .with_state(state)
}

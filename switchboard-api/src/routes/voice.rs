//! Hold and Recording Routes
//!
//! Hold and unhold of a conference leg, and control of the call's latest
//! recording. Reconciliation timeouts on hold surface as a generic
//! "Cannot hold" / "Cannot unhold" failure.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use switchboard_core::RecordingAction;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{HoldService, RecordingService},
    state::AppState,
    types::{
        HoldRequest, HoldResponse, RecordingRequest, RecordingResponse, RecordingStatusQuery,
        RecordingStatusResponse,
    },
};

// ============================================================================
// HOLD
// ============================================================================

/// POST /voice/hold/start - Put a conference leg on hold
#[utoipa::path(
    post,
    path = "/voice/hold/start",
    tag = "Voice",
    request_body = HoldRequest,
    responses(
        (status = 200, description = "Leg on hold", body = HoldResponse),
        (status = 400, description = "Missing call or conference linkage", body = ApiError),
        (status = 500, description = "Conference or leg did not converge", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn hold_start(
    State(holds): State<HoldService>,
    AuthExtractor(_agent): AuthExtractor,
    Json(req): Json<HoldRequest>,
) -> ApiResult<Json<HoldResponse>> {
    holds
        .start(&req)
        .await
        .map(Json)
        .map_err(|e| ApiError::for_operation("hold", e))
}

/// POST /voice/hold/stop - Take a conference leg off hold
#[utoipa::path(
    post,
    path = "/voice/hold/stop",
    tag = "Voice",
    request_body = HoldRequest,
    responses(
        (status = 200, description = "Leg resumed", body = HoldResponse),
        (status = 400, description = "Missing call or conference linkage", body = ApiError),
        (status = 500, description = "Conference or leg did not converge", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn hold_stop(
    State(holds): State<HoldService>,
    AuthExtractor(_agent): AuthExtractor,
    Json(req): Json<HoldRequest>,
) -> ApiResult<Json<HoldResponse>> {
    holds
        .stop(&req)
        .await
        .map(Json)
        .map_err(|e| ApiError::for_operation("unhold", e))
}

// ============================================================================
// RECORDINGS
// ============================================================================

/// POST /voice/recordings/start - Start recording unless one is active
#[utoipa::path(
    post,
    path = "/voice/recordings/start",
    tag = "Voice",
    request_body = RecordingRequest,
    responses(
        (status = 200, description = "Recording started or already active", body = RecordingResponse),
        (status = 400, description = "Missing call SID", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recording_start(
    State(recordings): State<RecordingService>,
    AuthExtractor(_agent): AuthExtractor,
    Json(req): Json<RecordingRequest>,
) -> ApiResult<Json<RecordingResponse>> {
    Ok(Json(recordings.start(&req.call_sid).await?))
}

async fn apply_recording(
    recordings: &RecordingService,
    req: &RecordingRequest,
    action: RecordingAction,
) -> ApiResult<Json<RecordingResponse>> {
    Ok(Json(recordings.apply(&req.call_sid, action).await?))
}

/// POST /voice/recordings/pause - Pause the latest recording
#[utoipa::path(
    post,
    path = "/voice/recordings/pause",
    tag = "Voice",
    request_body = RecordingRequest,
    responses(
        (status = 200, description = "Recording paused", body = RecordingResponse),
        (status = 404, description = "No recording on the call", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recording_pause(
    State(recordings): State<RecordingService>,
    AuthExtractor(_agent): AuthExtractor,
    Json(req): Json<RecordingRequest>,
) -> ApiResult<Json<RecordingResponse>> {
    apply_recording(&recordings, &req, RecordingAction::Pause).await
}

/// POST /voice/recordings/resume - Resume the latest recording
#[utoipa::path(
    post,
    path = "/voice/recordings/resume",
    tag = "Voice",
    request_body = RecordingRequest,
    responses(
        (status = 200, description = "Recording resumed", body = RecordingResponse),
        (status = 404, description = "No recording on the call", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recording_resume(
    State(recordings): State<RecordingService>,
    AuthExtractor(_agent): AuthExtractor,
    Json(req): Json<RecordingRequest>,
) -> ApiResult<Json<RecordingResponse>> {
    apply_recording(&recordings, &req, RecordingAction::Resume).await
}

/// POST /voice/recordings/stop - Stop the latest recording
#[utoipa::path(
    post,
    path = "/voice/recordings/stop",
    tag = "Voice",
    request_body = RecordingRequest,
    responses(
        (status = 200, description = "Recording stopped", body = RecordingResponse),
        (status = 404, description = "No recording on the call", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recording_stop(
    State(recordings): State<RecordingService>,
    AuthExtractor(_agent): AuthExtractor,
    Json(req): Json<RecordingRequest>,
) -> ApiResult<Json<RecordingResponse>> {
    apply_recording(&recordings, &req, RecordingAction::Stop).await
}

/// GET /voice/recordings/status - Status of the call's latest recording
#[utoipa::path(
    get,
    path = "/voice/recordings/status",
    tag = "Voice",
    params(RecordingStatusQuery),
    responses(
        (status = 200, description = "Recording status, `inactive` when none", body = RecordingStatusResponse),
        (status = 400, description = "Missing call SID", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recording_status(
    State(recordings): State<RecordingService>,
    AuthExtractor(_agent): AuthExtractor,
    Query(query): Query<RecordingStatusQuery>,
) -> ApiResult<Json<RecordingStatusResponse>> {
    Ok(Json(recordings.status(&query.call_sid).await?))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the voice routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/hold/start", post(hold_start))
        .route("/hold/stop", post(hold_stop))
        .route("/recordings/start", post(recording_start))
        .route("/recordings/pause", post(recording_pause))
        .route("/recordings/resume", post(recording_resume))
        .route("/recordings/stop", post(recording_stop))
        .route("/recordings/status", get(recording_status))
        .with_state(state)
}

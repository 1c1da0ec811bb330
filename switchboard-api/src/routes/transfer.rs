//! Transfer Routes
//!
//! Cold and warm transfers of the customer leg, and completion of a warm
//! handoff.

use axum::{extract::State, routing::post, Json, Router};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::TransferService,
    state::AppState,
    types::{
        ColdTransferRequest, CompleteTransferRequest, CompleteTransferResponse, TransferResponse,
        WarmTransferRequest,
    },
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /transfer/cold - Redirect the customer straight to the target
#[utoipa::path(
    post,
    path = "/transfer/cold",
    tag = "Transfers",
    request_body = ColdTransferRequest,
    responses(
        (status = 200, description = "Customer redirected", body = TransferResponse),
        (status = 400, description = "Invalid target or missing call", body = ApiError),
        (status = 409, description = "Customer leg cannot be redirected", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn cold_transfer(
    State(transfers): State<TransferService>,
    AuthExtractor(agent): AuthExtractor,
    Json(req): Json<ColdTransferRequest>,
) -> ApiResult<Json<TransferResponse>> {
    tracing::info!(
        agent_id = %agent.agent_id,
        customer_call_sid = %req.customer_call_sid,
        target = %req.target_identity,
        "Cold transfer requested"
    );
    Ok(Json(transfers.cold(&req).await?))
}

/// POST /transfer/warm - Bridge customer, agent and target in a conference
#[utoipa::path(
    post,
    path = "/transfer/warm",
    tag = "Transfers",
    request_body = WarmTransferRequest,
    responses(
        (status = 200, description = "Legs moved into the transfer conference", body = TransferResponse),
        (status = 400, description = "Invalid target or missing call", body = ApiError),
        (status = 409, description = "A leg cannot be redirected", body = ApiError),
        (status = 500, description = "Transfer conference did not come up", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn warm_transfer(
    State(transfers): State<TransferService>,
    AuthExtractor(agent): AuthExtractor,
    Json(req): Json<WarmTransferRequest>,
) -> ApiResult<Json<TransferResponse>> {
    tracing::info!(
        agent_id = %agent.agent_id,
        task_sid = ?req.task_sid,
        customer_call_sid = %req.customer_call_sid,
        target = %req.target_identity,
        "Warm transfer requested"
    );
    Ok(Json(transfers.warm(&req).await?))
}

/// POST /transfer/complete - Drop the agent once the target has the customer
#[utoipa::path(
    post,
    path = "/transfer/complete",
    tag = "Transfers",
    request_body = CompleteTransferRequest,
    responses(
        (status = 200, description = "Agent leg released", body = CompleteTransferResponse),
        (status = 400, description = "Missing agent call", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn complete_transfer(
    State(transfers): State<TransferService>,
    AuthExtractor(_agent): AuthExtractor,
    Json(req): Json<CompleteTransferRequest>,
) -> ApiResult<Json<CompleteTransferResponse>> {
    Ok(Json(transfers.complete(&req).await?))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the transfer routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/cold", post(cold_transfer))
        .route("/warm", post(warm_transfer))
        .route("/complete", post(complete_transfer))
        .with_state(state)
}

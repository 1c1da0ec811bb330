//! Recent Events Route
//!
//! Lets a desktop that just connected catch up on what the push channel
//! already sent.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use switchboard_events::{EventHub, EventRecord};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::AppState,
    types::RecentEventsQuery,
};

/// GET /events/recent - Most recent domain events, newest first
#[utoipa::path(
    get,
    path = "/events/recent",
    tag = "Events",
    params(RecentEventsQuery),
    responses(
        (status = 200, description = "Recent events, newest first"),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn recent_events(
    State(events): State<EventHub>,
    AuthExtractor(_agent): AuthExtractor,
    Query(query): Query<RecentEventsQuery>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    Ok(Json(events.log().recent(query.effective_limit()).await))
}

/// Create the events routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/recent", get(recent_events))
        .with_state(state)
}

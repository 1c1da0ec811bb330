//! Client SDK Token Route
//!
//! `GET /token` mints the platform access token the desktop's voice and
//! chat SDKs register with.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    auth::{generate_access_token, AccessToken, AuthConfig},
    config::PlatformConfig,
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::AppState,
};

/// GET /token - Access token for the signed-in agent's client identity
#[utoipa::path(
    get,
    path = "/token",
    tag = "Auth",
    responses(
        (status = 200, description = "Access token minted", body = AccessToken),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 503, description = "API key not configured", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn access_token(
    State(platform): State<Arc<PlatformConfig>>,
    State(auth_config): State<Arc<AuthConfig>>,
    AuthExtractor(agent): AuthExtractor,
) -> ApiResult<Json<AccessToken>> {
    let token = generate_access_token(&platform, &agent, auth_config.clock.as_ref())?;
    tracing::debug!(agent_id = %agent.agent_id, expires_at = token.expires_at, "Access token minted");
    Ok(Json(token))
}

/// Create the token router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/token", get(access_token))
        .with_state(state)
}

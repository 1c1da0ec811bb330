//! Agent Session Routes
//!
//! `POST /auth/login` exchanges an agent id, worker SID and client identity
//! for a session token. This is the only agent route without a bearer token.

use axum::{extract::State, routing::post, Json, Router};
use serde_json::json;
use std::sync::Arc;
use switchboard_core::normalize_identity;
use switchboard_platform::PlatformGateway;

use crate::{
    auth::{generate_session_token, AgentContext, AuthConfig},
    error::{ApiError, ApiResult, ErrorCode},
    state::AppState,
    types::{LoginRequest, LoginResponse},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /auth/login - Open an agent session
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 400, description = "Identity does not belong to the agent", body = ApiError),
        (status = 404, description = "Unknown worker", body = ApiError),
    )
)]
pub async fn login(
    State(platform): State<Arc<dyn PlatformGateway>>,
    State(auth_config): State<Arc<AuthConfig>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let agent_id = req.agent_id.trim();
    if agent_id.is_empty() {
        return Err(ApiError::missing_field("agentId"));
    }
    let worker_sid = req.worker_sid.trim();
    if worker_sid.is_empty() {
        return Err(ApiError::missing_field("workerSid"));
    }

    let identity = normalize_identity(&req.identity)?;
    let expected = normalize_identity(&format!("agent:{}", agent_id))?;
    if identity != expected {
        tracing::warn!(agent_id, identity = %identity, "Login identity mismatch");
        return Err(ApiError::new(
            ErrorCode::IdentityMismatch,
            "Identity does not belong to this agent",
        )
        .with_details(json!({ "expected": expected, "received": identity })));
    }

    let worker = platform.fetch_worker(worker_sid).await?;
    let agent = AgentContext::new(agent_id, worker.sid, identity);
    let token = generate_session_token(&auth_config, &agent)?;

    tracing::info!(agent_id = %agent.agent_id, worker_sid = %agent.worker_sid, "Agent signed in");
    Ok(Json(LoginResponse { token, agent }))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the session routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validate_session_token;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use switchboard_core::Worker;
    use switchboard_platform::InMemoryPlatform;
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<AuthConfig>) {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_worker(Worker {
                sid: "WK42".to_string(),
                friendly_name: "agent 42".to_string(),
                activity_sid: None,
                activity_name: None,
                available: false,
                attributes: Default::default(),
            })
            .await;
        let state = AppState::new(platform, &AppConfig::default()).unwrap();
        let auth_config = state.auth_config.clone();
        (create_router(state), auth_config)
    }

    fn login_request(body: serde_json::Value) -> Request<Body> {
        Request::post("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_login_issues_session_token() {
        let (app, auth_config) = app().await;
        let response = app
            .oneshot(login_request(json!({
                "agentId": "42",
                "workerSid": "WK42",
                "identity": "agent:42"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["agent"]["identity"], "client:agent:42");
        let claims = validate_session_token(&auth_config, body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.sub, "42");
    }

    #[tokio::test]
    async fn test_login_rejects_foreign_identity() {
        let (app, _) = app().await;
        let response = app
            .oneshot(login_request(json!({
                "agentId": "42",
                "workerSid": "WK42",
                "identity": "client:agent:7"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "IDENTITY_MISMATCH");
    }

    #[tokio::test]
    async fn test_login_unknown_worker_is_404() {
        let (app, _) = app().await;
        let response = app
            .oneshot(login_request(json!({
                "agentId": "42",
                "workerSid": "WK404",
                "identity": "42"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

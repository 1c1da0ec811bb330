//! Axum Middleware for Agent Authentication
//!
//! Validates the agent session token and injects an [`AgentContext`] into
//! request extensions. Unauthenticated requests get 401.
//!
//! The token normally arrives as `Authorization: Bearer <token>`. Browsers
//! cannot set headers on a websocket upgrade, so an `access_token` query
//! parameter is accepted when the header is absent.

use crate::auth::{authenticate_bearer, AgentContext, AuthConfig};
use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

fn query_token(request: &Request) -> Option<String> {
    request.uri().query()?.split('&').find_map(|pair| {
        pair.strip_prefix("access_token=")
            .filter(|token| !token.is_empty())
            .map(|token| format!("Bearer {}", token))
    })
}

/// Authenticate the agent and inject [`AgentContext`].
///
/// ```ignore
/// let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
///
/// let app = Router::new()
///     .route("/taskrouter/my-tasks", get(list_my_tasks))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let credential = header.or_else(|| query_token(&request));

    let agent = authenticate_bearer(&state.auth_config, credential.as_deref())
        .map_err(AuthMiddlewareError)?;

    tracing::Span::current().record("agent_id", agent.agent_id.as_str());
    request.extensions_mut().insert(agent);

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the signed-in agent.
///
/// ```ignore
/// async fn whoami(AuthExtractor(agent): AuthExtractor) -> impl IntoResponse {
///     Json(agent)
/// }
/// ```
///
/// `auth_middleware` must run on the route; without it the extractor fails
/// with 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AgentContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AgentContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AgentContext not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AgentContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_session_token, JwtSecret};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: JwtSecret::new("test_secret".to_string()).expect("test secret should be valid"),
            ..AuthConfig::default()
        }
    }

    fn test_app() -> Router {
        let auth_state = AuthMiddlewareState::new(test_auth_config());

        Router::new()
            .route(
                "/protected",
                get(|AuthExtractor(agent): AuthExtractor| async move { agent.worker_sid }),
            )
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
    }

    fn token() -> Result<String, String> {
        let agent = AgentContext::new("42", "WK42", "client:agent:42");
        generate_session_token(&test_auth_config(), &agent).map_err(|e| e.message)
    }

    #[tokio::test]
    async fn test_middleware_with_valid_token() -> Result<(), String> {
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {}", token()?))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(&body[..], b"WK42");
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_accepts_query_token() -> Result<(), String> {
        let request = Request::builder()
            .uri(format!("/protected?access_token={}", token()?))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_without_authentication() -> Result<(), String> {
        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_with_garbage_token() -> Result<(), String> {
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer not-a-jwt")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_is_500() -> Result<(), String> {
        let app = Router::new().route(
            "/unprotected",
            get(|AuthExtractor(agent): AuthExtractor| async move { agent.agent_id }),
        );
        let request = Request::builder()
            .uri("/unprotected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }
}

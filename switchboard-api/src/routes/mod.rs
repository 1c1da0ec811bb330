//! REST API Routes Module
//!
//! Route handlers grouped by the desktop feature they serve.
//!
//! Includes:
//! - Agent session and client SDK tokens
//! - Task lifecycle, transfers, hold and recording control
//! - Presence, the recent-events feed and the push channel
//! - Platform webhooks (signature-verified)
//! - Health checks, metrics and the OpenAPI document
//! - CORS support for the browser desktop

pub mod auth;
pub mod chat;
pub mod crm;
pub mod events;
pub mod health;
pub mod presence;
pub mod taskrouter;
pub mod token;
pub mod transfer;
pub mod voice;
pub mod webhooks;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::{ApiConfig, AppConfig};
use crate::error::ApiResult;
use crate::middleware::{
    auth_middleware, signature_middleware, AuthMiddlewareState, SignatureState,
};
use crate::state::AppState;

// Re-export route creation functions for convenience
pub use auth::create_router as auth_router;
pub use chat::create_router as chat_router;
pub use crm::create_router as crm_router;
pub use events::create_router as events_router;
pub use health::create_router as health_router;
pub use presence::create_router as presence_router;
pub use taskrouter::create_router as taskrouter_router;
pub use token::create_router as token_router;
pub use transfer::create_router as transfer_router;
pub use voice::create_router as voice_router;
pub use webhooks::create_router as webhooks_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    use crate::openapi::ApiDoc;
    use utoipa::OpenApi;

    axum::Json(ApiDoc::openapi())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builder for the full API router.
///
/// - Agent routes require a bearer session token.
/// - Platform webhooks require a valid `X-Twilio-Signature`.
/// - Login, health, metrics and the OpenAPI document are public.
///
/// Every route goes through the observability middleware and CORS.
pub struct SecureRouterBuilder {
    state: AppState,
    api_config: ApiConfig,
    auth_state: AuthMiddlewareState,
    signature_state: SignatureState,
}

impl SecureRouterBuilder {
    /// Create a new SecureRouterBuilder.
    ///
    /// In production this refuses permissive CORS, the default session
    /// secret, disabled webhook signatures and a missing platform account.
    pub fn new(state: AppState, config: &AppConfig) -> ApiResult<Self> {
        config.validate_for_production()?;

        let auth_state = AuthMiddlewareState::new(config.auth.clone());
        let signature_state = SignatureState {
            auth_token: std::sync::Arc::new(config.platform.auth_token.clone()),
            public_base_url: config.webhook.public_base_url.clone(),
            enabled: config.webhook.validate_signatures,
        };
        if !signature_state.enabled {
            tracing::warn!("Webhook signature validation is disabled");
        }

        Ok(Self {
            state,
            api_config: config.api.clone(),
            auth_state,
            signature_state,
        })
    }

    /// Routes used by signed-in agents.
    fn build_agent_routes(&self) -> Router {
        Router::new()
            .nest("/taskrouter", taskrouter::create_router(self.state.clone()))
            .nest("/transfer", transfer::create_router(self.state.clone()))
            .nest("/voice", voice::create_router(self.state.clone()))
            .nest("/chat", chat::create_router(self.state.clone()))
            .nest("/presence", presence::create_router(self.state.clone()))
            .nest("/events", events::create_router(self.state.clone()))
            .nest("/crm", crm::create_router(self.state.clone()))
            .merge(token::create_router(self.state.clone()))
            .merge(crate::ws::create_router(self.state.clone()))
    }

    /// Build the complete router with full security stack.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS (outermost) - handles preflight requests
    /// 2. Observability - tracing and metrics
    /// 3. Auth or signature check, depending on the route group
    pub fn build(self) -> ApiResult<Router> {
        use crate::telemetry::{metrics_handler, observability_middleware};
        use axum::middleware::from_fn;

        let agent_routes = self
            .build_agent_routes()
            .layer(from_fn_with_state(self.auth_state.clone(), auth_middleware));

        // Layered outside the nest so the middleware sees the full path the
        // platform signed.
        let webhook_routes = Router::new()
            .nest("/webhooks", webhooks::create_router(self.state.clone()))
            .layer(from_fn_with_state(
                self.signature_state.clone(),
                signature_middleware,
            ));

        #[allow(unused_mut)]
        let mut router = Router::new()
            .merge(agent_routes)
            .merge(webhook_routes)
            .merge(auth::create_router(self.state.clone()))
            // Health checks (no auth required)
            .nest("/health", health::create_router(self.state.clone()))
            .route("/metrics", get(metrics_handler));

        #[cfg(feature = "openapi")]
        {
            router = router.route("/openapi.json", get(openapi_json));
        }

        let cors = build_cors_layer(&self.api_config);

        Ok(router.layer(from_fn(observability_middleware)).layer(cors))
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router.
///
/// - Agent routes (`/taskrouter`, `/transfer`, `/voice`, `/chat`,
///   `/presence`, `/events`, `/crm`, `/token`, `/ws`) require a session token
/// - Platform callbacks under `/webhooks` require a valid signature
/// - `/auth/login`, `/health/*`, `/metrics` and `/openapi.json` are public
pub fn create_api_router(state: AppState, config: &AppConfig) -> ApiResult<Router> {
    SecureRouterBuilder::new(state, config).and_then(|builder| builder.build())
}

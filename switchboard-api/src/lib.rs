//! Switchboard API - HTTP Backend for the Agent Desktop
//!
//! REST endpoints (Axum) for the agent desktop, signed webhook intake for
//! the contact-center platform, and a WebSocket push channel for domain
//! events.
//!
//! Every platform call goes through a [`switchboard_platform::PlatformGateway`];
//! the binary wires the REST gateway, tests wire the in-memory one.

mod macros;

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod ws;

// Re-export commonly used types
pub use auth::{
    authenticate_bearer, generate_access_token, generate_session_token, validate_session_token,
    AccessToken, AgentContext, AuthConfig, Claims,
};
pub use config::{
    ApiConfig, AppConfig, IntegrationConfig, PlatformConfig, ReconcileConfig, WebhookConfig,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, signature_middleware, AuthExtractor, AuthMiddlewareState};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use types::*;

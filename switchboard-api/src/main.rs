//! Switchboard API Server Entry Point
//!
//! Loads configuration, picks the platform gateway and starts the Axum
//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use switchboard_api::telemetry::{init_tracing, TelemetryConfig};
use switchboard_api::{create_api_router, ApiError, ApiResult, AppConfig, AppState};
use switchboard_platform::{InMemoryPlatform, PlatformGateway, RestGateway};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = AppConfig::from_env();

    let platform: Arc<dyn PlatformGateway> = if config.platform.is_configured() {
        Arc::new(RestGateway::new(config.platform.gateway_config())?)
    } else {
        tracing::warn!("Platform credentials not set, using the in-memory platform");
        Arc::new(InMemoryPlatform::new())
    };

    let state = AppState::new(platform, &config)?;
    let app = create_api_router(state, &config)?;

    let addr = resolve_bind_addr(&config)?;
    tracing::info!(
        %addr,
        service = %telemetry_config.service_name,
        version = %telemetry_config.service_version,
        environment = %config.api.environment,
        "Starting Switchboard API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr(config: &AppConfig) -> ApiResult<SocketAddr> {
    let addr = format!("{}:{}", config.api.bind_host, config.api.port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}

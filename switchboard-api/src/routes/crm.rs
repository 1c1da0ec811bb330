//! CRM Proxy Routes
//!
//! Customer lookups forwarded to the CRM service with a short-lived
//! service token.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::IntegrationClient,
    state::AppState,
};

/// GET /crm/customers/{id} - Customer record from the CRM
#[utoipa::path(
    get,
    path = "/crm/customers/{id}",
    tag = "CRM",
    params(
        ("id" = String, Path, description = "CRM customer id")
    ),
    responses(
        (status = 200, description = "Customer record as the CRM returns it"),
        (status = 404, description = "Unknown customer", body = ApiError),
        (status = 502, description = "CRM unreachable or failing", body = ApiError),
        (status = 503, description = "CRM not configured", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_customer(
    State(integrations): State<IntegrationClient>,
    AuthExtractor(_agent): AuthExtractor,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if id.trim().is_empty() {
        return Err(ApiError::missing_field("id"));
    }
    Ok(Json(integrations.fetch_customer(&id).await?))
}

/// Create the CRM routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/customers/:id", get(get_customer))
        .with_state(state)
}

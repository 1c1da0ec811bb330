//! Session-related API types

use serde::{Deserialize, Serialize};

use crate::auth::AgentContext;

/// Request to open an agent session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Agent id as known to the desk (`42`)
    pub agent_id: String,
    /// Platform worker the agent signs in as
    pub worker_sid: String,
    /// Client identity; must normalize to `client:agent:<agentId>`
    pub identity: String,
}

/// Session token plus the agent it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LoginResponse {
    pub token: String,
    pub agent: AgentContext,
}

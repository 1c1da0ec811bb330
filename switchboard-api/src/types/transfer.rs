//! Transfer-related API types

use serde::{Deserialize, Serialize};
use switchboard_core::TargetKind;

/// Body of `POST /transfer/cold`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ColdTransferRequest {
    #[serde(default)]
    pub customer_call_sid: String,
    /// Agent id, `agent:<id>`, `client:...` identity or E.164 number
    #[serde(default)]
    pub target_identity: String,
    #[serde(default)]
    pub target_type: TargetKind,
    /// Agent leg to hang up once the customer is redirected
    #[serde(default)]
    pub agent_call_sid: Option<String>,
}

/// Body of `POST /transfer/warm`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WarmTransferRequest {
    #[serde(default)]
    pub task_sid: Option<String>,
    #[serde(default)]
    pub customer_call_sid: String,
    #[serde(default)]
    pub agent_call_sid: String,
    #[serde(default)]
    pub target_identity: String,
    #[serde(default)]
    pub target_type: TargetKind,
}

/// Body of `POST /transfer/complete`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransferRequest {
    #[serde(default)]
    pub agent_call_sid: String,
}

/// Result of a cold or warm transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub ok: bool,
    /// `cold` or `warm`
    pub mode: String,
    /// Friendly name of the warm transfer conference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference: Option<String>,
    /// Call placed to the warm transfer target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_call_sid: Option<String>,
}

/// Result of `POST /transfer/complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransferResponse {
    pub ok: bool,
    /// The agent leg had already ended before the request
    pub already_ended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_type_defaults_to_agent() -> Result<(), serde_json::Error> {
        let req: ColdTransferRequest = serde_json::from_value(json!({
            "customerCallSid": "CA1",
            "targetIdentity": "55"
        }))?;
        assert_eq!(req.target_type, TargetKind::Agent);
        assert!(req.agent_call_sid.is_none());

        let req: WarmTransferRequest = serde_json::from_value(json!({
            "customerCallSid": "CA1",
            "agentCallSid": "CA2",
            "targetIdentity": "+15551230000",
            "targetType": "number"
        }))?;
        assert_eq!(req.target_type, TargetKind::Number);
        Ok(())
    }
}

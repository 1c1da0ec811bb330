//! Hold and recording API types

use serde::{Deserialize, Serialize};
use switchboard_core::LegRole;

/// Body of `POST /voice/hold/start` and `/voice/hold/stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HoldRequest {
    #[serde(default)]
    pub task_sid: Option<String>,
    #[serde(default)]
    pub customer_call_sid: Option<String>,
    #[serde(default)]
    pub agent_call_sid: Option<String>,
    /// Leg to put on or take off hold
    pub who: LegRole,
}

impl HoldRequest {
    /// Call SID the request names for `who`, if any.
    pub fn requested_call_sid(&self) -> Option<&str> {
        let sid = match self.who {
            LegRole::Customer => self.customer_call_sid.as_deref(),
            LegRole::Agent => self.agent_call_sid.as_deref(),
        };
        sid.filter(|s| !s.trim().is_empty())
    }
}

/// Result of a hold toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HoldResponse {
    pub ok: bool,
    pub conf_sid: String,
    pub who: LegRole,
    /// Held call leg
    pub call_sid: String,
    /// Set on stop when the start time was known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Body of the recording control endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RecordingRequest {
    #[serde(default)]
    pub call_sid: String,
}

/// Query string of `GET /voice/recordings/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatusQuery {
    #[serde(default)]
    pub call_sid: String,
}

/// Result of a recording control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RecordingResponse {
    pub ok: bool,
    pub recording_sid: String,
    /// Recording status after the command
    pub status: String,
    /// False when `start` found an active recording and reused it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

/// Result of a recording status read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatusResponse {
    /// `inactive`, or the platform's status string unchanged
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_sid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requested_call_sid_follows_who() -> Result<(), serde_json::Error> {
        let req: HoldRequest = serde_json::from_value(json!({
            "customerCallSid": "CA_C",
            "agentCallSid": "CA_A",
            "who": "agent"
        }))?;
        assert_eq!(req.requested_call_sid(), Some("CA_A"));

        let req: HoldRequest = serde_json::from_value(json!({
            "customerCallSid": "  ",
            "who": "customer"
        }))?;
        assert_eq!(req.requested_call_sid(), None);
        Ok(())
    }
}

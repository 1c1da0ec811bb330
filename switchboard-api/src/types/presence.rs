//! Presence and event feed types

use serde::{Deserialize, Serialize};

/// Body of `POST /presence/activity`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SetActivityRequest {
    #[serde(default)]
    pub activity_sid: String,
}

/// Query string of `GET /events/recent`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct RecentEventsQuery {
    /// Maximum number of events, newest first
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RecentEventsQuery {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

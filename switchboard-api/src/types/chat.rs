//! Chat conversation types

use serde::{Deserialize, Serialize};

/// Result of an agent closing a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CloseConversationResponse {
    pub ok: bool,
    pub conversation_sid: String,
    /// `no_task`, `canceled`, `completed` or `already_final`
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_sid: Option<String>,
}

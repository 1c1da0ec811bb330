//! Platform webhook payloads
//!
//! The platform posts `application/x-www-form-urlencoded` bodies with
//! PascalCase keys. Every field is optional: the same endpoint receives
//! several event types and each carries a different subset.

use serde::{Deserialize, Serialize};

/// Conversation pre- and post-event webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "PascalCase")]
pub struct ConversationWebhook {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub conversation_sid: Option<String>,
    #[serde(default)]
    pub message_sid: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// JSON array of media descriptors, when the message has attachments
    #[serde(default)]
    pub media: Option<String>,
    /// Role of the authoring participant, when the platform sends it
    #[serde(default)]
    pub participant_role: Option<String>,
    /// Delivery receipt status on `onDeliveryUpdated`
    #[serde(default)]
    pub status: Option<String>,
    /// New conversation state on `onConversationStateUpdated`
    #[serde(default)]
    pub state_to: Option<String>,
}

impl ConversationWebhook {
    pub fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or_default()
    }

    /// Message carries attachments.
    pub fn has_media(&self) -> bool {
        self.media
            .as_deref()
            .map(|m| {
                let m = m.trim();
                !m.is_empty() && m != "[]" && m != "null"
            })
            .unwrap_or(false)
    }
}

/// TaskRouter workspace event callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "PascalCase")]
pub struct TaskRouterEvent {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub task_sid: Option<String>,
    #[serde(default)]
    pub task_attributes: Option<String>,
    #[serde(default)]
    pub task_channel_unique_name: Option<String>,
    #[serde(default)]
    pub worker_sid: Option<String>,
    #[serde(default)]
    pub worker_activity_name: Option<String>,
    #[serde(default)]
    pub reservation_sid: Option<String>,
}

impl TaskRouterEvent {
    pub fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or_default()
    }
}

/// TaskRouter assignment callback: a reservation offered to a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "PascalCase")]
pub struct AssignmentCallback {
    #[serde(default)]
    pub task_sid: Option<String>,
    /// JSON-encoded task attributes
    #[serde(default)]
    pub task_attributes: Option<String>,
    #[serde(default)]
    pub reservation_sid: Option<String>,
    #[serde(default)]
    pub worker_sid: Option<String>,
}

/// Instruction returned to the assignment callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum AssignmentInstruction {
    /// Bridge the voice task into a conference with the worker.
    Conference {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        post_work_activity_sid: Option<String>,
        end_conference_on_exit: bool,
    },
    /// Accept the reservation as is.
    Accept,
}

/// Plain acknowledgement returned to webhook deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookAck {
    pub ok: bool,
    /// What the router did with the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl WebhookAck {
    pub fn handled(outcome: impl Into<String>) -> Self {
        Self {
            ok: true,
            outcome: Some(outcome.into()),
        }
    }
}

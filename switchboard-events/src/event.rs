//! Domain event types.

use serde::{Deserialize, Serialize};
use switchboard_core::{Channel, LegRole, PresenceSnapshot, Timestamp};
use uuid::Uuid;

/// Something that happened to a contact, a worker or a call leg.
///
/// Serialized with a snake_case `type` tag, which is what desktops switch on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DomainEvent {
    PresenceUpdate {
        snapshot: PresenceSnapshot,
    },

    TaskCreated {
        task_sid: String,
        channel: Channel,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_sid: Option<String>,
    },

    TaskWrapping {
        task_sid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        disposition: Option<String>,
    },

    TaskCompleted {
        task_sid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        disposition: Option<String>,
    },

    TaskCanceled {
        task_sid: String,
        reason: String,
    },

    MessageDeliveryUpdated {
        conversation_sid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_sid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },

    HoldStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_sid: Option<String>,
        conference_sid: String,
        call_sid: String,
        who: LegRole,
    },

    HoldStopped {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_sid: Option<String>,
        conference_sid: String,
        call_sid: String,
        who: LegRole,
        /// Absent when the hold started before a restart.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },

    TransferStarted {
        mode: String,
        customer_call_sid: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conference: Option<String>,
    },

    ConversationClosed {
        conversation_sid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_sid: Option<String>,
    },
}

impl DomainEvent {
    /// The `type` tag, for logs and metrics labels.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::PresenceUpdate { .. } => "presence_update",
            DomainEvent::TaskCreated { .. } => "task_created",
            DomainEvent::TaskWrapping { .. } => "task_wrapping",
            DomainEvent::TaskCompleted { .. } => "task_completed",
            DomainEvent::TaskCanceled { .. } => "task_canceled",
            DomainEvent::MessageDeliveryUpdated { .. } => "message_delivery_updated",
            DomainEvent::HoldStarted { .. } => "hold_started",
            DomainEvent::HoldStopped { .. } => "hold_stopped",
            DomainEvent::TransferStarted { .. } => "transfer_started",
            DomainEvent::ConversationClosed { .. } => "conversation_closed",
        }
    }

    /// Task the event concerns, if any.
    pub fn task_sid(&self) -> Option<&str> {
        match self {
            DomainEvent::TaskCreated { task_sid, .. }
            | DomainEvent::TaskWrapping { task_sid, .. }
            | DomainEvent::TaskCompleted { task_sid, .. }
            | DomainEvent::TaskCanceled { task_sid, .. } => Some(task_sid),
            DomainEvent::HoldStarted { task_sid, .. }
            | DomainEvent::HoldStopped { task_sid, .. }
            | DomainEvent::ConversationClosed { task_sid, .. } => task_sid.as_deref(),
            DomainEvent::PresenceUpdate { .. }
            | DomainEvent::MessageDeliveryUpdated { .. }
            | DomainEvent::TransferStarted { .. } => None,
        }
    }
}

/// A domain event stamped with an id and the time it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub at: Timestamp,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventRecord {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            id: Uuid::now_v7(),
            at: chrono::Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_flat_and_tagged() -> Result<(), serde_json::Error> {
        let record = EventRecord::new(DomainEvent::TaskCompleted {
            task_sid: "WT1".to_string(),
            reason: Some("done".to_string()),
            disposition: None,
        });
        let value = serde_json::to_value(&record)?;
        assert_eq!(value["type"], "task_completed");
        assert_eq!(value["taskSid"], "WT1");
        assert!(value.get("disposition").is_none());
        assert!(value.get("id").is_some());

        let back: EventRecord = serde_json::from_value(value)?;
        assert_eq!(back, record);
        Ok(())
    }

    #[test]
    fn test_event_type_matches_tag() -> Result<(), serde_json::Error> {
        let event = DomainEvent::MessageDeliveryUpdated {
            conversation_sid: "CH1".to_string(),
            message_sid: None,
            status: Some("read".to_string()),
        };
        let value = serde_json::to_value(&event)?;
        assert_eq!(value["type"], event.event_type());
        assert!(event.task_sid().is_none());
        Ok(())
    }
}

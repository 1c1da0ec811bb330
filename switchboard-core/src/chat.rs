//! Chat conversations and message authorship.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

status_enum! {
    /// State of a chat conversation.
    pub enum ConversationState: "conversation state" {
        Active => "active",
        Inactive => "inactive",
        Closed => "closed",
    }
}

/// Attributes stored on a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationAttributes {
    /// The task opened for this conversation, at most one.
    #[serde(rename = "taskSid", alias = "task_sid", default, skip_serializing_if = "Option::is_none")]
    pub task_sid: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationAttributes {
    /// Decode the platform's attribute string; anything unreadable is an empty bag.
    pub fn from_raw(raw: Option<&str>) -> Self {
        raw.filter(|s| !s.trim().is_empty())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    pub fn to_raw(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A chat thread on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    pub state: ConversationState,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub attributes: ConversationAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub date_created: Option<Timestamp>,
}

impl Conversation {
    pub fn linked_task_sid(&self) -> Option<&str> {
        self.attributes.task_sid.as_deref().filter(|sid| !sid.is_empty())
    }
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAuthor {
    System,
    Agent,
    Customer,
}

impl MessageAuthor {
    /// Classify a message from its author identity and participant role.
    pub fn classify(author: &str, participant_role: Option<&str>) -> Self {
        let author = author.trim();
        if author.is_empty() || author.eq_ignore_ascii_case("system") {
            return MessageAuthor::System;
        }
        let role_is_agent = participant_role
            .map(|role| role.trim().eq_ignore_ascii_case("agent"))
            .unwrap_or(false);
        let lowered = author.to_ascii_lowercase();
        if role_is_agent || lowered.starts_with("agent:") || lowered.starts_with("client:agent:") {
            MessageAuthor::Agent
        } else {
            MessageAuthor::Customer
        }
    }

    /// Only customer messages may open a task.
    pub fn opens_task(&self) -> bool {
        matches!(self, MessageAuthor::Customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_authors() {
        assert_eq!(MessageAuthor::classify("system", None), MessageAuthor::System);
        assert_eq!(MessageAuthor::classify("SYSTEM", Some("customer")), MessageAuthor::System);
        assert_eq!(MessageAuthor::classify("", None), MessageAuthor::System);
        assert_eq!(MessageAuthor::classify("agent:42", None), MessageAuthor::Agent);
        assert_eq!(MessageAuthor::classify("client:agent:42", None), MessageAuthor::Agent);
        assert_eq!(MessageAuthor::classify("jane", Some("agent")), MessageAuthor::Agent);
        assert_eq!(MessageAuthor::classify("+15550001111", None), MessageAuthor::Customer);
    }

    #[test]
    fn test_only_customers_open_tasks() {
        assert!(MessageAuthor::Customer.opens_task());
        assert!(!MessageAuthor::Agent.opens_task());
        assert!(!MessageAuthor::System.opens_task());
    }

    #[test]
    fn test_attributes_round_trip_keeps_extra() {
        let attributes = ConversationAttributes::from_raw(Some(r#"{"taskSid":"WT1","topic":"billing"}"#));
        assert_eq!(attributes.task_sid.as_deref(), Some("WT1"));
        let raw = attributes.to_raw();
        assert!(raw.contains("\"topic\":\"billing\""));
        assert!(raw.contains("\"taskSid\":\"WT1\""));
    }

    #[test]
    fn test_attributes_garbage_is_empty() {
        assert_eq!(ConversationAttributes::from_raw(Some("not json")), ConversationAttributes::default());
        assert_eq!(ConversationAttributes::from_raw(None), ConversationAttributes::default());
    }

    #[test]
    fn test_linked_task_ignores_empty() {
        let conversation = Conversation {
            sid: "CH1".to_string(),
            friendly_name: None,
            state: ConversationState::Active,
            attributes: ConversationAttributes {
                task_sid: Some(String::new()),
                extra: Map::new(),
            },
            date_created: None,
        };
        assert!(conversation.linked_task_sid().is_none());
    }
}

//! Tasks, assignment status and the typed attribute bag.
//!
//! The platform stores task attributes as free-form JSON. They are decoded
//! once at the gateway boundary into [`TaskAttributes`], a tagged union of the
//! shapes this backend understands, with every unknown key carried through
//! untouched so that a later update writes back exactly what was read.

use crate::error::{DeskError, DeskResult};
use crate::voice::LegRole;
use crate::Timestamp;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// ASSIGNMENT STATUS
// ============================================================================

status_enum! {
    /// Assignment status of a task.
    ///
    /// `pending → reserved → assigned → wrapping → completed`, with the
    /// platform able to cancel a task that has not yet been assigned.
    pub enum AssignmentStatus: "assignment status" {
        Pending => "pending",
        Reserved => "reserved",
        Assigned => "assigned",
        Wrapping => "wrapping",
        Completed => "completed",
        Canceled => "canceled" | "cancelled",
    }
}

impl AssignmentStatus {
    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Canceled)
    }

    /// Not yet accepted by a worker; the platform only allows cancelling.
    pub fn is_unassigned(&self) -> bool {
        matches!(self, AssignmentStatus::Pending | AssignmentStatus::Reserved)
    }
}

/// Statuses returned by "my tasks" when the caller does not filter.
pub const DEFAULT_LIST_STATUSES: &[AssignmentStatus] = &[
    AssignmentStatus::Reserved,
    AssignmentStatus::Assigned,
    AssignmentStatus::Wrapping,
];

// ============================================================================
// CHANNEL
// ============================================================================

/// Contact channel, derived from the attribute bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Voice,
    Chat,
    Other,
}

impl Channel {
    /// Map a free-text channel label onto a known channel.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "voice" | "phone" | "call" | "pstn" => Channel::Voice,
            "chat" | "sms" | "messaging" | "webchat" | "whatsapp" => Channel::Chat,
            _ => Channel::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Voice => "voice",
            Channel::Chat => "chat",
            Channel::Other => "other",
        }
    }
}

// ============================================================================
// ATTRIBUTE SHAPES
// ============================================================================

/// Conference linkage written onto voice tasks by the assignment step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConferenceLinkage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Per-role call SIDs (`customer`, `worker`).
    #[serde(default)]
    pub participants: Map<String, Value>,
}

impl ConferenceLinkage {
    /// Call SID recorded for a leg role, if any.
    pub fn participant(&self, role: LegRole) -> Option<&str> {
        let keys: &[&str] = match role {
            LegRole::Customer => &["customer"],
            LegRole::Agent => &["worker", "agent"],
        };
        keys.iter()
            .find_map(|key| self.participants.get(*key).and_then(Value::as_str))
            .filter(|sid| !sid.is_empty())
    }
}

/// Attributes of a voice task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceTaskAttributes {
    #[serde(rename = "callSid", alias = "call_sid", default, skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,

    #[serde(rename = "customerId", alias = "customer_id", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,

    #[serde(rename = "wrapup_reason", alias = "wrapupReason", default, skip_serializing_if = "Option::is_none")]
    pub wrapup_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference: Option<ConferenceLinkage>,

    /// Keys this backend does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attributes of a chat task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatTaskAttributes {
    #[serde(rename = "conversationSid", alias = "conversation_sid", default, skip_serializing_if = "Option::is_none")]
    pub conversation_sid: Option<String>,

    #[serde(rename = "customerId", alias = "customer_id", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,

    #[serde(rename = "wrapup_reason", alias = "wrapupReason", default, skip_serializing_if = "Option::is_none")]
    pub wrapup_reason: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatTaskAttributes {
    /// Attributes for a task opened from the first customer message.
    pub fn for_conversation(conversation_sid: impl Into<String>) -> Self {
        Self {
            conversation_sid: Some(conversation_sid.into()),
            ..Default::default()
        }
    }
}

/// Decoded task attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum TaskAttributes {
    Voice(VoiceTaskAttributes),
    Chat(ChatTaskAttributes),
    /// Shape not recognised; kept verbatim.
    Other(Map<String, Value>),
}

impl Default for TaskAttributes {
    fn default() -> Self {
        TaskAttributes::Other(Map::new())
    }
}

fn detect_channel(map: &Map<String, Value>) -> Channel {
    if let Some(label) = map.get("channel").and_then(Value::as_str) {
        return Channel::from_label(label);
    }
    if map.contains_key("callSid") || map.contains_key("call_sid") {
        Channel::Voice
    } else if map.contains_key("conversationSid") || map.contains_key("conversation_sid") {
        Channel::Chat
    } else {
        Channel::Other
    }
}

impl TryFrom<Value> for TaskAttributes {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(TaskAttributes::default()),
            // The platform hands attributes over as a JSON-encoded string.
            Value::String(raw) => {
                if raw.trim().is_empty() {
                    return Ok(TaskAttributes::default());
                }
                return match serde_json::from_str::<Value>(&raw)? {
                    Value::String(_) => Err(serde_json::Error::custom(
                        "task attributes must decode to a JSON object",
                    )),
                    decoded => TaskAttributes::try_from(decoded),
                };
            }
            other => {
                return Err(serde_json::Error::custom(format!(
                    "task attributes must be a JSON object, got {}",
                    other
                )))
            }
        };

        let decoded = match detect_channel(&map) {
            Channel::Voice => serde_json::from_value(Value::Object(map.clone()))
                .map(TaskAttributes::Voice)
                .ok(),
            Channel::Chat => serde_json::from_value(Value::Object(map.clone()))
                .map(TaskAttributes::Chat)
                .ok(),
            Channel::Other => None,
        };
        Ok(decoded.unwrap_or(TaskAttributes::Other(map)))
    }
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl From<TaskAttributes> for Value {
    fn from(attributes: TaskAttributes) -> Self {
        let mut map = match &attributes {
            TaskAttributes::Voice(voice) => to_object(voice),
            TaskAttributes::Chat(chat) => to_object(chat),
            TaskAttributes::Other(map) => return Value::Object(map.clone()),
        };
        map.entry("channel")
            .or_insert_with(|| Value::String(attributes.channel().as_str().to_string()));
        Value::Object(map)
    }
}

impl TaskAttributes {
    pub fn channel(&self) -> Channel {
        match self {
            TaskAttributes::Voice(_) => Channel::Voice,
            TaskAttributes::Chat(_) => Channel::Chat,
            TaskAttributes::Other(_) => Channel::Other,
        }
    }

    fn other_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|key| map.get(*key).and_then(Value::as_str))
    }

    pub fn call_sid(&self) -> Option<&str> {
        match self {
            TaskAttributes::Voice(voice) => voice.call_sid.as_deref(),
            TaskAttributes::Chat(_) => None,
            TaskAttributes::Other(map) => Self::other_str(map, &["callSid", "call_sid"]),
        }
    }

    pub fn conversation_sid(&self) -> Option<&str> {
        match self {
            TaskAttributes::Chat(chat) => chat.conversation_sid.as_deref(),
            TaskAttributes::Voice(_) => None,
            TaskAttributes::Other(map) => {
                Self::other_str(map, &["conversationSid", "conversation_sid"])
            }
        }
    }

    pub fn customer_id(&self) -> Option<&str> {
        match self {
            TaskAttributes::Voice(voice) => voice.customer_id.as_deref(),
            TaskAttributes::Chat(chat) => chat.customer_id.as_deref(),
            TaskAttributes::Other(map) => Self::other_str(map, &["customerId", "customer_id"]),
        }
    }

    pub fn disposition(&self) -> Option<&str> {
        match self {
            TaskAttributes::Voice(voice) => voice.disposition.as_deref(),
            TaskAttributes::Chat(chat) => chat.disposition.as_deref(),
            TaskAttributes::Other(map) => Self::other_str(map, &["disposition"]),
        }
    }

    pub fn wrapup_reason(&self) -> Option<&str> {
        match self {
            TaskAttributes::Voice(voice) => voice.wrapup_reason.as_deref(),
            TaskAttributes::Chat(chat) => chat.wrapup_reason.as_deref(),
            TaskAttributes::Other(map) => Self::other_str(map, &["wrapup_reason", "wrapupReason"]),
        }
    }

    /// Conference linkage, only ever present on voice tasks.
    pub fn conference(&self) -> Option<&ConferenceLinkage> {
        match self {
            TaskAttributes::Voice(voice) => voice.conference.as_ref(),
            _ => None,
        }
    }

    /// Record disposition metadata. `None` leaves the existing value in place.
    pub fn merge_wrapup(&mut self, disposition: Option<&str>, reason: Option<&str>) {
        match self {
            TaskAttributes::Voice(voice) => {
                if let Some(disposition) = disposition {
                    voice.disposition = Some(disposition.to_string());
                }
                if let Some(reason) = reason {
                    voice.wrapup_reason = Some(reason.to_string());
                }
            }
            TaskAttributes::Chat(chat) => {
                if let Some(disposition) = disposition {
                    chat.disposition = Some(disposition.to_string());
                }
                if let Some(reason) = reason {
                    chat.wrapup_reason = Some(reason.to_string());
                }
            }
            TaskAttributes::Other(map) => {
                if let Some(disposition) = disposition {
                    map.insert("disposition".to_string(), Value::String(disposition.to_string()));
                }
                if let Some(reason) = reason {
                    map.insert("wrapup_reason".to_string(), Value::String(reason.to_string()));
                }
            }
        }
    }

    /// Encode back to the platform's JSON shape.
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

// ============================================================================
// TASK
// ============================================================================

/// A unit of contact work: one call or one chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub sid: String,
    pub assignment_status: AssignmentStatus,
    /// Seconds since creation, computed by the platform.
    #[serde(default)]
    pub age: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub attributes: TaskAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub date_created: Option<Timestamp>,
}

/// What a forced wrap has to do for a task in its current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPlan {
    /// `assigned`: merge attributes and move to `wrapping`.
    Transition,
    /// Already `wrapping`: merge attributes only.
    MergeOnly,
}

impl Task {
    pub fn new(sid: impl Into<String>, status: AssignmentStatus) -> Self {
        Self {
            sid: sid.into(),
            assignment_status: status,
            age: 0,
            reason: None,
            attributes: TaskAttributes::default(),
            date_created: None,
        }
    }

    pub fn with_attributes(mut self, attributes: TaskAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Decide how a forced wrap applies, rejecting every status other than
    /// `assigned` and `wrapping`.
    pub fn plan_wrap(&self) -> DeskResult<WrapPlan> {
        match self.assignment_status {
            AssignmentStatus::Assigned => Ok(WrapPlan::Transition),
            AssignmentStatus::Wrapping => Ok(WrapPlan::MergeOnly),
            status => Err(DeskError::InvalidState {
                task_sid: self.sid.clone(),
                status,
                operation: "wrap",
            }),
        }
    }

    /// Only `wrapping` tasks may complete.
    pub fn ensure_completable(&self) -> DeskResult<()> {
        if self.assignment_status == AssignmentStatus::Wrapping {
            Ok(())
        } else {
            Err(DeskError::InvalidState {
                task_sid: self.sid.clone(),
                status: self.assignment_status,
                operation: "complete",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(AssignmentStatus::parse("Wrapping"), Ok(AssignmentStatus::Wrapping));
        assert_eq!(AssignmentStatus::parse(" ASSIGNED "), Ok(AssignmentStatus::Assigned));
        assert_eq!(AssignmentStatus::parse("cancelled"), Ok(AssignmentStatus::Canceled));
        assert!(AssignmentStatus::parse("bogus").is_err());
    }

    #[test]
    fn test_status_serde_uses_lowercase() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&AssignmentStatus::Wrapping)?;
        assert_eq!(json, "\"wrapping\"");
        let parsed: AssignmentStatus = serde_json::from_str("\"cancelled\"")?;
        assert_eq!(parsed, AssignmentStatus::Canceled);
        Ok(())
    }

    #[test]
    fn test_voice_attributes_detected_and_extra_kept() -> Result<(), serde_json::Error> {
        let value = json!({
            "channel": "voice",
            "call_sid": "CA1",
            "customerId": "cust-9",
            "from": "+15550001111",
            "conference": {"sid": "CF1", "participants": {"customer": "CA1", "worker": "CA2"}}
        });
        let attributes: TaskAttributes = serde_json::from_value(value)?;
        assert_eq!(attributes.channel(), Channel::Voice);
        assert_eq!(attributes.call_sid(), Some("CA1"));
        assert_eq!(attributes.customer_id(), Some("cust-9"));

        let linkage = attributes.conference().expect("voice task carries linkage");
        assert_eq!(linkage.sid.as_deref(), Some("CF1"));
        assert_eq!(linkage.participant(LegRole::Customer), Some("CA1"));
        assert_eq!(linkage.participant(LegRole::Agent), Some("CA2"));

        let encoded = attributes.to_value();
        assert_eq!(encoded["from"], "+15550001111");
        assert_eq!(encoded["channel"], "voice");
        assert_eq!(encoded["callSid"], "CA1");
        Ok(())
    }

    #[test]
    fn test_channel_inferred_from_call_sid() -> Result<(), serde_json::Error> {
        let attributes: TaskAttributes = serde_json::from_value(json!({"callSid": "CA7"}))?;
        assert_eq!(attributes.channel(), Channel::Voice);
        assert!(attributes.conference().is_none());
        Ok(())
    }

    #[test]
    fn test_sms_channel_label_is_chat_and_label_preserved() -> Result<(), serde_json::Error> {
        let attributes: TaskAttributes =
            serde_json::from_value(json!({"channel": "sms", "conversationSid": "CH1"}))?;
        assert_eq!(attributes.channel(), Channel::Chat);
        assert_eq!(attributes.conversation_sid(), Some("CH1"));
        assert_eq!(attributes.to_value()["channel"], "sms");
        Ok(())
    }

    #[test]
    fn test_string_encoded_attributes() -> Result<(), serde_json::Error> {
        let raw = Value::String(r#"{"channel":"chat","conversationSid":"CH2"}"#.to_string());
        let attributes = TaskAttributes::try_from(raw)?;
        assert_eq!(attributes.conversation_sid(), Some("CH2"));
        Ok(())
    }

    #[test]
    fn test_non_object_attributes_rejected() {
        assert!(TaskAttributes::try_from(json!([1, 2])).is_err());
        assert!(TaskAttributes::try_from(Value::String("\"x\"".to_string())).is_err());
    }

    #[test]
    fn test_unknown_shape_passes_through() -> Result<(), serde_json::Error> {
        let value = json!({"channel": "video", "room": "RM1"});
        let attributes: TaskAttributes = serde_json::from_value(value.clone())?;
        assert_eq!(attributes.channel(), Channel::Other);
        assert_eq!(attributes.to_value(), value);
        Ok(())
    }

    #[test]
    fn test_merge_wrapup_keeps_existing_when_absent() -> Result<(), serde_json::Error> {
        let mut attributes: TaskAttributes =
            serde_json::from_value(json!({"channel": "voice", "disposition": "Callback"}))?;
        attributes.merge_wrapup(None, Some("Customer hung up"));
        assert_eq!(attributes.disposition(), Some("Callback"));
        assert_eq!(attributes.wrapup_reason(), Some("Customer hung up"));

        attributes.merge_wrapup(Some("Resolved"), None);
        assert_eq!(attributes.disposition(), Some("Resolved"));
        assert_eq!(attributes.to_value()["wrapup_reason"], "Customer hung up");
        Ok(())
    }

    #[test]
    fn test_merge_wrapup_on_other_shape() {
        let mut attributes = TaskAttributes::default();
        attributes.merge_wrapup(Some("Resolved"), Some("done"));
        assert_eq!(attributes.disposition(), Some("Resolved"));
        assert_eq!(attributes.wrapup_reason(), Some("done"));
    }

    #[test]
    fn test_plan_wrap_by_status() {
        for status in AssignmentStatus::ALL {
            let task = Task::new("WT1", *status);
            match status {
                AssignmentStatus::Assigned => assert_eq!(task.plan_wrap(), Ok(WrapPlan::Transition)),
                AssignmentStatus::Wrapping => assert_eq!(task.plan_wrap(), Ok(WrapPlan::MergeOnly)),
                _ => assert!(matches!(
                    task.plan_wrap(),
                    Err(DeskError::InvalidState { operation: "wrap", .. })
                )),
            }
        }
    }

    #[test]
    fn test_only_wrapping_is_completable() {
        for status in AssignmentStatus::ALL {
            let task = Task::new("WT1", *status);
            assert_eq!(
                task.ensure_completable().is_ok(),
                *status == AssignmentStatus::Wrapping
            );
        }
    }

    #[test]
    fn test_task_serializes_camel_case() -> Result<(), serde_json::Error> {
        let task = Task::new("WT9", AssignmentStatus::Assigned);
        let value = serde_json::to_value(&task)?;
        assert_eq!(value["assignmentStatus"], "assigned");
        assert_eq!(value["sid"], "WT9");
        assert!(value.get("reason").is_none());
        Ok(())
    }

    fn status_strategy() -> impl Strategy<Value = AssignmentStatus> {
        prop_oneof![
            Just(AssignmentStatus::Pending),
            Just(AssignmentStatus::Reserved),
            Just(AssignmentStatus::Assigned),
            Just(AssignmentStatus::Wrapping),
            Just(AssignmentStatus::Completed),
            Just(AssignmentStatus::Canceled),
        ]
    }

    proptest! {
        #[test]
        fn prop_status_display_parse_roundtrip(status in status_strategy(), upper in any::<bool>()) {
            let text = if upper { status.to_string().to_uppercase() } else { status.to_string() };
            prop_assert_eq!(AssignmentStatus::parse(&text), Ok(status));
        }
    }
}

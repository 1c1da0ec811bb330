//! Platform wire resources.
//!
//! The platform speaks snake_case JSON, encodes attribute bags as JSON
//! strings and mixes RFC 2822 and RFC 3339 timestamps. Everything is decoded
//! here and converted into domain types before leaving the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use switchboard_core::{
    Activity, AssignmentStatus, Call, CallStatus, Conference, ConferenceStatus, Conversation,
    ConversationAttributes, ConversationState, Participant, ParticipantStatus, Recording,
    RecordingStatus, Reservation, ReservationStatus, Task, TaskAttributes, Timestamp, Worker,
};
use tracing::warn;

/// Parse either timestamp flavour the platform emits.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CallResource {
    pub sid: String,
    pub status: CallStatus,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub parent_call_sid: Option<String>,
}

impl From<CallResource> for Call {
    fn from(r: CallResource) -> Self {
        Call {
            sid: r.sid,
            status: r.status,
            from: r.from,
            to: r.to,
            parent_call_sid: r.parent_call_sid,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConferenceResource {
    pub sid: String,
    pub friendly_name: String,
    pub status: ConferenceStatus,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub date_created: Option<Timestamp>,
}

impl From<ConferenceResource> for Conference {
    fn from(r: ConferenceResource) -> Self {
        Conference {
            sid: r.sid,
            friendly_name: r.friendly_name,
            status: r.status,
            date_created: r.date_created,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConferencePage {
    #[serde(default)]
    pub conferences: Vec<ConferenceResource>,
}

#[derive(Debug, Deserialize)]
pub struct ParticipantResource {
    pub call_sid: String,
    pub conference_sid: String,
    pub status: ParticipantStatus,
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub coaching: bool,
    #[serde(default)]
    pub label: Option<String>,
}

impl From<ParticipantResource> for Participant {
    fn from(r: ParticipantResource) -> Self {
        Participant {
            call_sid: r.call_sid,
            conference_sid: r.conference_sid,
            status: r.status,
            hold: r.hold,
            coaching: r.coaching,
            label: r.label,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ParticipantPage {
    #[serde(default)]
    pub participants: Vec<ParticipantResource>,
}

#[derive(Debug, Deserialize)]
pub struct RecordingResource {
    pub sid: String,
    pub call_sid: String,
    pub status: String,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub date_created: Option<Timestamp>,
}

impl From<RecordingResource> for Recording {
    fn from(r: RecordingResource) -> Self {
        Recording {
            sid: r.sid,
            call_sid: r.call_sid,
            status: RecordingStatus::new(r.status),
            date_created: r.date_created,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordingPage {
    #[serde(default)]
    pub recordings: Vec<RecordingResource>,
}

#[derive(Debug, Deserialize)]
pub struct TaskResource {
    pub sid: String,
    pub assignment_status: AssignmentStatus,
    #[serde(default)]
    pub age: u64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub attributes: Option<String>,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub date_created: Option<Timestamp>,
}

impl From<TaskResource> for Task {
    fn from(r: TaskResource) -> Self {
        let attributes = decode_task_attributes(&r.sid, r.attributes);
        Task {
            sid: r.sid,
            assignment_status: r.assignment_status,
            age: r.age,
            reason: r.reason,
            attributes,
            date_created: r.date_created,
        }
    }
}

fn decode_task_attributes(task_sid: &str, raw: Option<String>) -> TaskAttributes {
    let Some(raw) = raw else {
        return TaskAttributes::default();
    };
    TaskAttributes::try_from(Value::String(raw)).unwrap_or_else(|e| {
        warn!(task_sid = %task_sid, error = %e, "Unreadable task attributes, treating as empty");
        TaskAttributes::default()
    })
}

#[derive(Debug, Deserialize)]
pub struct ReservationResource {
    pub sid: String,
    pub task_sid: String,
    #[serde(default)]
    pub worker_sid: Option<String>,
    pub reservation_status: ReservationStatus,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub date_created: Option<Timestamp>,
}

impl From<ReservationResource> for Reservation {
    fn from(r: ReservationResource) -> Self {
        Reservation {
            sid: r.sid,
            task_sid: r.task_sid,
            worker_sid: r.worker_sid,
            reservation_status: r.reservation_status,
            date_created: r.date_created,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReservationPage {
    #[serde(default)]
    pub reservations: Vec<ReservationResource>,
    #[serde(default)]
    pub meta: PageMeta,
}

/// Paging block of TaskRouter list responses.
#[derive(Debug, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub next_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerResource {
    pub sid: String,
    pub friendly_name: String,
    #[serde(default)]
    pub activity_sid: Option<String>,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub attributes: Option<String>,
}

impl From<WorkerResource> for Worker {
    fn from(r: WorkerResource) -> Self {
        let attributes = r
            .attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(raw).ok())
            .unwrap_or_default();
        Worker {
            sid: r.sid,
            friendly_name: r.friendly_name,
            activity_sid: r.activity_sid,
            activity_name: r.activity_name,
            available: r.available,
            attributes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkerPage {
    #[serde(default)]
    pub workers: Vec<WorkerResource>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityResource {
    pub sid: String,
    pub friendly_name: String,
    #[serde(default)]
    pub available: bool,
}

impl From<ActivityResource> for Activity {
    fn from(r: ActivityResource) -> Self {
        Activity {
            sid: r.sid,
            friendly_name: r.friendly_name,
            available: r.available,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivityPage {
    #[serde(default)]
    pub activities: Vec<ActivityResource>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationResource {
    pub sid: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    pub state: ConversationState,
    #[serde(default)]
    pub attributes: Option<String>,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub date_created: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
pub struct MessageResource {
    pub sid: String,
    #[serde(default)]
    pub attributes: Option<String>,
}

impl MessageResource {
    /// Attributes as an object; anything unreadable starts empty.
    pub fn attribute_map(&self) -> Map<String, Value> {
        self.attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(raw).ok())
            .unwrap_or_default()
    }
}

impl From<ConversationResource> for Conversation {
    fn from(r: ConversationResource) -> Self {
        Conversation {
            sid: r.sid,
            friendly_name: r.friendly_name,
            state: r.state,
            attributes: ConversationAttributes::from_raw(r.attributes.as_deref()),
            date_created: r.date_created,
        }
    }
}

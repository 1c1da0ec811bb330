//! Calls, conferences, participants and recordings.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

// ============================================================================
// CALLS
// ============================================================================

status_enum! {
    /// Status of a single call leg.
    pub enum CallStatus: "call status" {
        Queued => "queued",
        Initiated => "initiated",
        Ringing => "ringing",
        InProgress => "in-progress" | "in_progress" | "inprogress",
        Completed => "completed",
        Busy => "busy",
        Failed => "failed",
        NoAnswer => "no-answer" | "no_answer",
        Canceled => "canceled" | "cancelled",
    }
}

impl CallStatus {
    /// The leg has ended and can never be redirected again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::Busy
                | CallStatus::Failed
                | CallStatus::NoAnswer
                | CallStatus::Canceled
        )
    }
}

/// A call leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub sid: String,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_call_sid: Option<String>,
}

impl Call {
    pub fn new(sid: impl Into<String>, status: CallStatus) -> Self {
        Self {
            sid: sid.into(),
            status,
            from: None,
            to: None,
            parent_call_sid: None,
        }
    }
}

/// Which leg of a customer contact an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum LegRole {
    Customer,
    Agent,
}

impl LegRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegRole::Customer => "customer",
            LegRole::Agent => "agent",
        }
    }
}

impl std::fmt::Display for LegRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONFERENCES
// ============================================================================

status_enum! {
    /// Status of a conference resource.
    pub enum ConferenceStatus: "conference status" {
        Starting => "starting" | "init",
        InProgress => "in-progress" | "in_progress",
        Completed => "completed",
    }
}

/// The media-mixing resource joining customer, agent and transfer legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    pub sid: String,
    pub friendly_name: String,
    pub status: ConferenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub date_created: Option<Timestamp>,
}

/// Friendly name of the three-way conference built for a task's warm transfer.
pub fn task_conference_name(task_sid: &str) -> String {
    format!("task-{}", task_sid)
}

/// Friendly name of an ad hoc conference built around a customer leg.
pub fn transfer_conference_name(customer_call_sid: &str) -> String {
    format!("xfer-{}", customer_call_sid)
}

status_enum! {
    /// Status of a participant inside a conference.
    pub enum ParticipantStatus: "participant status" {
        Connecting => "connecting" | "queued" | "initiated" | "ringing",
        Connected => "connected",
        Disconnected => "disconnected" | "complete" | "completed" | "failed",
    }
}

/// One call leg inside a conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub call_sid: String,
    pub conference_sid: String,
    pub status: ParticipantStatus,
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub coaching: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// ============================================================================
// RECORDINGS
// ============================================================================

/// Recording status exactly as reported by the platform.
///
/// Kept as the raw string so status reads pass it through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct RecordingStatus(String);

impl RecordingStatus {
    pub const IN_PROGRESS: &'static str = "in-progress";
    pub const PAUSED: &'static str = "paused";
    pub const STOPPED: &'static str = "stopped";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_in_progress(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::IN_PROGRESS)
    }

    pub fn is_paused(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::PAUSED)
    }

    /// In progress or paused: a new recording must not be started.
    pub fn is_active(&self) -> bool {
        self.is_in_progress() || self.is_paused()
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A call recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub sid: String,
    pub call_sid: String,
    pub status: RecordingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub date_created: Option<Timestamp>,
}

/// State change requested on an existing recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingAction {
    Pause,
    Resume,
    Stop,
}

impl RecordingAction {
    /// Status value the platform expects for this action.
    pub fn target_status(&self) -> &'static str {
        match self {
            RecordingAction::Pause => RecordingStatus::PAUSED,
            RecordingAction::Resume => RecordingStatus::IN_PROGRESS,
            RecordingAction::Stop => RecordingStatus::STOPPED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingAction::Pause => "pause",
            RecordingAction::Resume => "resume",
            RecordingAction::Stop => "stop",
        }
    }
}

/// The recording an operation on a call should act on.
///
/// Prefers an in-progress recording, then a paused one, then the most recent
/// of any other status.
pub fn select_latest_recording(recordings: &[Recording]) -> Option<&Recording> {
    recordings
        .iter()
        .find(|r| r.status.is_in_progress())
        .or_else(|| recordings.iter().find(|r| r.status.is_paused()))
        .or_else(|| recordings.iter().max_by_key(|r| r.date_created))
}

//! The platform gateway seam.
//!
//! Every platform resource the desk touches goes through [`PlatformGateway`].
//! Failures are reported as [`switchboard_core::DeskError`]: `NotFound` for missing resources,
//! `UpstreamUnreachable` for network failures and `Upstream` for any other
//! platform rejection.

use async_trait::async_trait;
use serde_json::{Map, Value};
use switchboard_core::{
    Activity, AssignmentStatus, Call, Conference, ConferenceStatus, Conversation, DeskResult,
    Participant, Recording, Reservation, Task, TaskAttributes, Worker,
};

/// Originate a new call leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCall {
    /// `client:<name>` or an E.164 number.
    pub to: String,
    pub from: String,
    /// TwiML executed when the leg answers.
    pub twiml: String,
}

/// Fields to change on a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub assignment_status: Option<AssignmentStatus>,
    pub reason: Option<String>,
    pub attributes: Option<TaskAttributes>,
}

impl TaskUpdate {
    pub fn status(status: AssignmentStatus) -> Self {
        Self {
            assignment_status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_attributes(mut self, attributes: TaskAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// A task to hand to the routing engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub workflow_sid: Option<String>,
    pub task_channel: Option<String>,
    pub attributes: TaskAttributes,
}

/// Result of the atomic set-if-absent on a conversation's `taskSid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The conversation now points at the offered task.
    Claimed,
    /// Another task got there first.
    AlreadyClaimed { task_sid: String },
}

/// Typed access to the telephony platform's REST resources.
#[async_trait]
pub trait PlatformGateway: Send + Sync {
    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    async fn fetch_call(&self, call_sid: &str) -> DeskResult<Call>;

    /// Replace the live leg's instructions with `twiml`.
    async fn redirect_call(&self, call_sid: &str, twiml: &str) -> DeskResult<()>;

    async fn hangup_call(&self, call_sid: &str) -> DeskResult<()>;

    async fn create_call(&self, params: CreateCall) -> DeskResult<Call>;

    // ------------------------------------------------------------------
    // Conferences
    // ------------------------------------------------------------------

    async fn list_conferences(
        &self,
        friendly_name: &str,
        status: Option<ConferenceStatus>,
    ) -> DeskResult<Vec<Conference>>;

    async fn fetch_conference(&self, conference_sid: &str) -> DeskResult<Conference>;

    async fn list_participants(&self, conference_sid: &str) -> DeskResult<Vec<Participant>>;

    async fn fetch_participant(&self, conference_sid: &str, call_sid: &str)
        -> DeskResult<Participant>;

    async fn update_participant_hold(
        &self,
        conference_sid: &str,
        call_sid: &str,
        hold: bool,
        hold_url: Option<&str>,
    ) -> DeskResult<Participant>;

    // ------------------------------------------------------------------
    // Recordings
    // ------------------------------------------------------------------

    async fn list_recordings(&self, call_sid: &str) -> DeskResult<Vec<Recording>>;

    async fn start_recording(&self, call_sid: &str) -> DeskResult<Recording>;

    /// Set a recording's status (`paused`, `in-progress`, `stopped`).
    async fn update_recording(
        &self,
        call_sid: &str,
        recording_sid: &str,
        status: &str,
    ) -> DeskResult<Recording>;

    // ------------------------------------------------------------------
    // Tasks and reservations
    // ------------------------------------------------------------------

    async fn fetch_task(&self, task_sid: &str) -> DeskResult<Task>;

    async fn update_task(&self, task_sid: &str, update: TaskUpdate) -> DeskResult<Task>;

    async fn create_task(&self, task: NewTask) -> DeskResult<Task>;

    async fn list_worker_reservations(&self, worker_sid: &str) -> DeskResult<Vec<Reservation>>;

    async fn list_task_reservations(&self, task_sid: &str) -> DeskResult<Vec<Reservation>>;

    // ------------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------------

    async fn fetch_worker(&self, worker_sid: &str) -> DeskResult<Worker>;

    async fn list_workers(&self) -> DeskResult<Vec<Worker>>;

    async fn list_activities(&self) -> DeskResult<Vec<Activity>>;

    async fn update_worker_activity(&self, worker_sid: &str, activity_sid: &str)
        -> DeskResult<Worker>;

    // ------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------

    async fn fetch_conversation(&self, conversation_sid: &str) -> DeskResult<Conversation>;

    /// Set the conversation's `taskSid` attribute only if none is recorded.
    async fn claim_conversation_task(
        &self,
        conversation_sid: &str,
        task_sid: &str,
    ) -> DeskResult<ClaimOutcome>;

    async fn close_conversation(&self, conversation_sid: &str) -> DeskResult<Conversation>;

    /// Merge `patch` into a message's attributes, keeping the other keys.
    async fn merge_message_attributes(
        &self,
        conversation_sid: &str,
        message_sid: &str,
        patch: Map<String, Value>,
    ) -> DeskResult<()>;
}

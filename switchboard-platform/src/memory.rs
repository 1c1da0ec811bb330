//! In-memory platform for development and tests.
//!
//! Behaves like the real platform where the desk depends on it: call legs
//! redirected into a `<Dial><Conference>` join that conference, conferences
//! and participants can be scripted to stay not-ready for a number of polls,
//! terminal calls refuse redirects and the conversation claim is atomic.
//! Every mutating command is recorded for assertions.

use crate::gateway::{ClaimOutcome, CreateCall, NewTask, PlatformGateway, TaskUpdate};
use crate::twiml::{DialTarget, VoiceResponse};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use switchboard_core::{
    Activity, AssignmentStatus, Call, CallStatus, Conference, ConferenceStatus, Conversation,
    ConversationState, DeskError, DeskResult, Participant, ParticipantStatus, Recording,
    RecordingStatus, Reservation, Task, Worker,
};
use tokio::sync::Mutex;
use tracing::debug;

/// A recorded `redirect_call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub call_sid: String,
    pub twiml: String,
}

impl Redirect {
    pub fn parsed(&self) -> Option<VoiceResponse> {
        VoiceResponse::parse(&self.twiml)
    }
}

/// A recorded `update_participant_hold`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldUpdate {
    pub conference_sid: String,
    pub call_sid: String,
    pub hold: bool,
    pub hold_url: Option<String>,
}

#[derive(Debug, Clone)]
struct CallScript {
    polls: u32,
    status: CallStatus,
}

#[derive(Default)]
struct State {
    seq: u64,
    unreachable: bool,
    failing: HashSet<&'static str>,

    calls: HashMap<String, Call>,
    call_scripts: HashMap<String, CallScript>,

    conferences: HashMap<String, Conference>,
    conference_delays: HashMap<String, u32>,
    conference_polls: HashMap<String, u32>,
    participants: HashMap<String, Vec<Participant>>,
    participant_delays: HashMap<String, u32>,
    participant_polls: HashMap<String, u32>,

    recordings: HashMap<String, Vec<Recording>>,
    recording_starts: u32,

    tasks: HashMap<String, Task>,
    task_history: HashMap<String, Vec<AssignmentStatus>>,
    reservations: Vec<Reservation>,

    workers: HashMap<String, Worker>,
    activities: Vec<Activity>,

    conversations: HashMap<String, Conversation>,
    message_attributes: HashMap<(String, String), Map<String, Value>>,

    redirects: Vec<Redirect>,
    created_calls: Vec<CreateCall>,
    hangups: Vec<String>,
    hold_updates: Vec<HoldUpdate>,
}

impl State {
    fn next_sid(&mut self, prefix: &str) -> String {
        self.seq += 1;
        format!("{}{:032}", prefix, self.seq)
    }

    fn reachable(&self) -> DeskResult<()> {
        if self.unreachable {
            Err(DeskError::UpstreamUnreachable {
                reason: "in-memory platform marked unreachable".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Like [`State::reachable`], and also fails operations scripted to fail.
    fn available(&self, operation: &'static str) -> DeskResult<()> {
        self.reachable()?;
        if self.failing.contains(operation) {
            return Err(DeskError::Upstream {
                status: 500,
                message: format!("{} failed", operation),
            });
        }
        Ok(())
    }

    /// Advance a scripted conference by one observation.
    fn observe_conference(&mut self, sid: &str) {
        let Some(remaining) = self.conference_polls.get_mut(sid) else {
            return;
        };
        if *remaining > 0 {
            *remaining -= 1;
            return;
        }
        self.conference_polls.remove(sid);
        if let Some(conference) = self.conferences.get_mut(sid) {
            if conference.status == ConferenceStatus::Starting {
                conference.status = ConferenceStatus::InProgress;
            }
        }
    }

    fn observe_participant(&mut self, conference_sid: &str, call_sid: &str) {
        let Some(remaining) = self.participant_polls.get_mut(call_sid) else {
            return;
        };
        if *remaining > 0 {
            *remaining -= 1;
            return;
        }
        self.participant_polls.remove(call_sid);
        if let Some(participant) = self
            .participants
            .get_mut(conference_sid)
            .and_then(|list| list.iter_mut().find(|p| p.call_sid == call_sid))
        {
            if participant.status == ParticipantStatus::Connecting {
                participant.status = ParticipantStatus::Connected;
            }
        }
    }

    fn join_conference(&mut self, call_sid: &str, name: &str) {
        let existing = self
            .conferences
            .values()
            .find(|c| c.friendly_name == name && c.status != ConferenceStatus::Completed)
            .map(|c| c.sid.clone());
        let conference_sid = match existing {
            Some(sid) => sid,
            None => {
                let sid = self.next_sid("CF");
                let status = match self.conference_delays.get(name) {
                    Some(polls) => {
                        self.conference_polls.insert(sid.clone(), *polls);
                        ConferenceStatus::Starting
                    }
                    None => ConferenceStatus::InProgress,
                };
                self.conferences.insert(
                    sid.clone(),
                    Conference {
                        sid: sid.clone(),
                        friendly_name: name.to_string(),
                        status,
                        date_created: Some(chrono::Utc::now()),
                    },
                );
                sid
            }
        };

        let status = match self.participant_delays.get(call_sid) {
            Some(polls) => {
                self.participant_polls.insert(call_sid.to_string(), *polls);
                ParticipantStatus::Connecting
            }
            None => ParticipantStatus::Connected,
        };
        let list = self.participants.entry(conference_sid.clone()).or_default();
        list.retain(|p| p.call_sid != call_sid);
        list.push(Participant {
            call_sid: call_sid.to_string(),
            conference_sid: conference_sid.clone(),
            status,
            hold: false,
            coaching: false,
            label: None,
        });
        debug!(call_sid, conference = name, conference_sid = %conference_sid, "Leg joined conference");
    }

    fn apply_twiml(&mut self, call_sid: &str, twiml: &str) {
        if let Some(VoiceResponse {
            target: DialTarget::Conference(conference),
            ..
        }) = VoiceResponse::parse(twiml)
        {
            self.join_conference(call_sid, &conference.name);
        }
    }
}

/// [`PlatformGateway`] kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub async fn add_call(&self, call: Call) {
        self.state.lock().await.calls.insert(call.sid.clone(), call);
    }

    /// The call keeps its current status for `polls` fetches, then reports `status`.
    pub async fn script_call(&self, call_sid: &str, polls: u32, status: CallStatus) {
        self.state
            .lock()
            .await
            .call_scripts
            .insert(call_sid.to_string(), CallScript { polls, status });
    }

    pub async fn add_conference(&self, conference: Conference) {
        self.state
            .lock()
            .await
            .conferences
            .insert(conference.sid.clone(), conference);
    }

    /// Conferences created under `friendly_name` stay `starting` for `polls` lookups.
    pub async fn delay_conference(&self, friendly_name: &str, polls: u32) {
        self.state
            .lock()
            .await
            .conference_delays
            .insert(friendly_name.to_string(), polls);
    }

    pub async fn add_participant(&self, participant: Participant) {
        let mut state = self.state.lock().await;
        let list = state
            .participants
            .entry(participant.conference_sid.clone())
            .or_default();
        list.retain(|p| p.call_sid != participant.call_sid);
        list.push(participant);
    }

    /// The leg stays `connecting` for `polls` participant fetches after joining.
    pub async fn delay_participant(&self, call_sid: &str, polls: u32) {
        let mut state = self.state.lock().await;
        state.participant_delays.insert(call_sid.to_string(), polls);
        state.participant_polls.insert(call_sid.to_string(), polls);
    }

    pub async fn add_recording(&self, recording: Recording) {
        self.state
            .lock()
            .await
            .recordings
            .entry(recording.call_sid.clone())
            .or_default()
            .push(recording);
    }

    pub async fn add_task(&self, task: Task) {
        let mut state = self.state.lock().await;
        state
            .task_history
            .insert(task.sid.clone(), vec![task.assignment_status]);
        state.tasks.insert(task.sid.clone(), task);
    }

    pub async fn add_reservation(&self, reservation: Reservation) {
        self.state.lock().await.reservations.push(reservation);
    }

    pub async fn add_worker(&self, worker: Worker) {
        self.state
            .lock()
            .await
            .workers
            .insert(worker.sid.clone(), worker);
    }

    pub async fn add_activity(&self, activity: Activity) {
        self.state.lock().await.activities.push(activity);
    }

    pub async fn add_conversation(&self, conversation: Conversation) {
        self.state
            .lock()
            .await
            .conversations
            .insert(conversation.sid.clone(), conversation);
    }

    /// Every subsequent call fails with `UpstreamUnreachable` while set.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }

    /// Make one gateway operation, named by its method, answer 500.
    pub async fn fail_operation(&self, operation: &'static str) {
        self.state.lock().await.failing.insert(operation);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub async fn call(&self, call_sid: &str) -> Option<Call> {
        self.state.lock().await.calls.get(call_sid).cloned()
    }

    /// Attributes merged into a message so far.
    pub async fn message_attributes(
        &self,
        conversation_sid: &str,
        message_sid: &str,
    ) -> Option<Map<String, Value>> {
        self.state
            .lock()
            .await
            .message_attributes
            .get(&(conversation_sid.to_string(), message_sid.to_string()))
            .cloned()
    }

    pub async fn task(&self, task_sid: &str) -> Option<Task> {
        self.state.lock().await.tasks.get(task_sid).cloned()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.state.lock().await.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.sid.cmp(&b.sid));
        tasks
    }

    /// Every assignment status the task has held, oldest first.
    pub async fn task_history(&self, task_sid: &str) -> Vec<AssignmentStatus> {
        self.state
            .lock()
            .await
            .task_history
            .get(task_sid)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn conversation(&self, conversation_sid: &str) -> Option<Conversation> {
        self.state
            .lock()
            .await
            .conversations
            .get(conversation_sid)
            .cloned()
    }

    pub async fn conference_named(&self, friendly_name: &str) -> Option<Conference> {
        self.state
            .lock()
            .await
            .conferences
            .values()
            .find(|c| c.friendly_name == friendly_name)
            .cloned()
    }

    pub async fn participants_of(&self, conference_sid: &str) -> Vec<Participant> {
        self.state
            .lock()
            .await
            .participants
            .get(conference_sid)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn recordings_of(&self, call_sid: &str) -> Vec<Recording> {
        self.state
            .lock()
            .await
            .recordings
            .get(call_sid)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn recording_starts(&self) -> u32 {
        self.state.lock().await.recording_starts
    }

    pub async fn redirects(&self) -> Vec<Redirect> {
        self.state.lock().await.redirects.clone()
    }

    pub async fn created_calls(&self) -> Vec<CreateCall> {
        self.state.lock().await.created_calls.clone()
    }

    pub async fn hangups(&self) -> Vec<String> {
        self.state.lock().await.hangups.clone()
    }

    pub async fn hold_updates(&self) -> Vec<HoldUpdate> {
        self.state.lock().await.hold_updates.clone()
    }
}

#[async_trait]
impl PlatformGateway for InMemoryPlatform {
    async fn fetch_call(&self, call_sid: &str) -> DeskResult<Call> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        if let Some(script) = state.call_scripts.get_mut(call_sid) {
            if script.polls > 0 {
                script.polls -= 1;
            } else {
                let status = script.status;
                state.call_scripts.remove(call_sid);
                if let Some(call) = state.calls.get_mut(call_sid) {
                    call.status = status;
                }
            }
        }
        state
            .calls
            .get(call_sid)
            .cloned()
            .ok_or_else(|| DeskError::not_found("Call", call_sid))
    }

    async fn redirect_call(&self, call_sid: &str, twiml: &str) -> DeskResult<()> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let call = state
            .calls
            .get(call_sid)
            .ok_or_else(|| DeskError::not_found("Call", call_sid))?;
        if call.status.is_terminal() {
            return Err(DeskError::Upstream {
                status: 400,
                message: "Call is not in-progress. Cannot redirect. (21220)".to_string(),
            });
        }

        state.redirects.push(Redirect {
            call_sid: call_sid.to_string(),
            twiml: twiml.to_string(),
        });
        state.apply_twiml(call_sid, twiml);
        Ok(())
    }

    async fn hangup_call(&self, call_sid: &str) -> DeskResult<()> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let call = state
            .calls
            .get_mut(call_sid)
            .ok_or_else(|| DeskError::not_found("Call", call_sid))?;
        call.status = CallStatus::Completed;
        for participant in state.participants.values_mut().flatten() {
            if participant.call_sid == call_sid {
                participant.status = ParticipantStatus::Disconnected;
            }
        }
        state.hangups.push(call_sid.to_string());
        Ok(())
    }

    async fn create_call(&self, params: CreateCall) -> DeskResult<Call> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let sid = state.next_sid("CA");
        let call = Call {
            sid: sid.clone(),
            status: CallStatus::InProgress,
            from: Some(params.from.clone()),
            to: Some(params.to.clone()),
            parent_call_sid: None,
        };
        state.calls.insert(sid.clone(), call.clone());
        state.apply_twiml(&sid, &params.twiml);
        state.created_calls.push(params);
        Ok(call)
    }

    async fn list_conferences(
        &self,
        friendly_name: &str,
        status: Option<ConferenceStatus>,
    ) -> DeskResult<Vec<Conference>> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let sids: Vec<String> = state
            .conferences
            .values()
            .filter(|c| c.friendly_name == friendly_name)
            .map(|c| c.sid.clone())
            .collect();
        for sid in &sids {
            state.observe_conference(sid);
        }
        let mut conferences: Vec<Conference> = sids
            .iter()
            .filter_map(|sid| state.conferences.get(sid).cloned())
            .filter(|c| status.map(|s| c.status == s).unwrap_or(true))
            .collect();
        conferences.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(conferences)
    }

    async fn fetch_conference(&self, conference_sid: &str) -> DeskResult<Conference> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        state.observe_conference(conference_sid);
        state
            .conferences
            .get(conference_sid)
            .cloned()
            .ok_or_else(|| DeskError::not_found("Conference", conference_sid))
    }

    async fn list_participants(&self, conference_sid: &str) -> DeskResult<Vec<Participant>> {
        let state = self.state.lock().await;
        state.reachable()?;

        if !state.conferences.contains_key(conference_sid) {
            return Err(DeskError::not_found("Conference", conference_sid));
        }
        Ok(state
            .participants
            .get(conference_sid)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_participant(
        &self,
        conference_sid: &str,
        call_sid: &str,
    ) -> DeskResult<Participant> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        state.observe_participant(conference_sid, call_sid);
        state
            .participants
            .get(conference_sid)
            .and_then(|list| list.iter().find(|p| p.call_sid == call_sid))
            .cloned()
            .ok_or_else(|| DeskError::not_found("Participant", call_sid))
    }

    async fn update_participant_hold(
        &self,
        conference_sid: &str,
        call_sid: &str,
        hold: bool,
        hold_url: Option<&str>,
    ) -> DeskResult<Participant> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let participant = state
            .participants
            .get_mut(conference_sid)
            .and_then(|list| list.iter_mut().find(|p| p.call_sid == call_sid))
            .ok_or_else(|| DeskError::not_found("Participant", call_sid))?;
        participant.hold = hold;
        let updated = participant.clone();

        state.hold_updates.push(HoldUpdate {
            conference_sid: conference_sid.to_string(),
            call_sid: call_sid.to_string(),
            hold,
            hold_url: hold_url.map(str::to_string),
        });
        Ok(updated)
    }

    async fn list_recordings(&self, call_sid: &str) -> DeskResult<Vec<Recording>> {
        let state = self.state.lock().await;
        state.reachable()?;
        Ok(state.recordings.get(call_sid).cloned().unwrap_or_default())
    }

    async fn start_recording(&self, call_sid: &str) -> DeskResult<Recording> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let recording = Recording {
            sid: state.next_sid("RE"),
            call_sid: call_sid.to_string(),
            status: RecordingStatus::new(RecordingStatus::IN_PROGRESS),
            date_created: Some(chrono::Utc::now()),
        };
        state.recording_starts += 1;
        state
            .recordings
            .entry(call_sid.to_string())
            .or_default()
            .push(recording.clone());
        Ok(recording)
    }

    async fn update_recording(
        &self,
        call_sid: &str,
        recording_sid: &str,
        status: &str,
    ) -> DeskResult<Recording> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let recording = state
            .recordings
            .get_mut(call_sid)
            .and_then(|list| list.iter_mut().find(|r| r.sid == recording_sid))
            .ok_or_else(|| DeskError::not_found("Recording", recording_sid))?;
        recording.status = RecordingStatus::new(status);
        Ok(recording.clone())
    }

    async fn fetch_task(&self, task_sid: &str) -> DeskResult<Task> {
        let state = self.state.lock().await;
        state.reachable()?;
        state
            .tasks
            .get(task_sid)
            .cloned()
            .ok_or_else(|| DeskError::not_found("Task", task_sid))
    }

    async fn update_task(&self, task_sid: &str, update: TaskUpdate) -> DeskResult<Task> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let task = state
            .tasks
            .get_mut(task_sid)
            .ok_or_else(|| DeskError::not_found("Task", task_sid))?;
        if let Some(status) = update.assignment_status {
            if task.assignment_status.is_terminal() && status != task.assignment_status {
                return Err(DeskError::Upstream {
                    status: 400,
                    message: format!(
                        "Task {} is {} and cannot be updated",
                        task_sid, task.assignment_status
                    ),
                });
            }
            task.assignment_status = status;
        }
        if let Some(reason) = update.reason {
            task.reason = Some(reason);
        }
        if let Some(attributes) = update.attributes {
            task.attributes = attributes;
        }
        let updated = task.clone();

        if let Some(status) = update.assignment_status {
            state
                .task_history
                .entry(task_sid.to_string())
                .or_default()
                .push(status);
        }
        Ok(updated)
    }

    async fn create_task(&self, new_task: NewTask) -> DeskResult<Task> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let sid = state.next_sid("WT");
        let task = Task {
            sid: sid.clone(),
            assignment_status: AssignmentStatus::Pending,
            age: 0,
            reason: None,
            attributes: new_task.attributes,
            date_created: Some(chrono::Utc::now()),
        };
        state.tasks.insert(sid.clone(), task.clone());
        state
            .task_history
            .insert(sid, vec![AssignmentStatus::Pending]);
        Ok(task)
    }

    async fn list_worker_reservations(&self, worker_sid: &str) -> DeskResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        state.reachable()?;
        if !state.workers.contains_key(worker_sid) {
            return Err(DeskError::not_found("Worker", worker_sid));
        }
        Ok(state
            .reservations
            .iter()
            .filter(|r| r.worker_sid.as_deref() == Some(worker_sid))
            .cloned()
            .collect())
    }

    async fn list_task_reservations(&self, task_sid: &str) -> DeskResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        state.available("list_task_reservations")?;
        Ok(state
            .reservations
            .iter()
            .filter(|r| r.task_sid == task_sid)
            .cloned()
            .collect())
    }

    async fn fetch_worker(&self, worker_sid: &str) -> DeskResult<Worker> {
        let state = self.state.lock().await;
        state.reachable()?;
        state
            .workers
            .get(worker_sid)
            .cloned()
            .ok_or_else(|| DeskError::not_found("Worker", worker_sid))
    }

    async fn list_workers(&self) -> DeskResult<Vec<Worker>> {
        let state = self.state.lock().await;
        state.reachable()?;
        let mut workers: Vec<Worker> = state.workers.values().cloned().collect();
        workers.sort_by(|a, b| a.sid.cmp(&b.sid));
        Ok(workers)
    }

    async fn list_activities(&self) -> DeskResult<Vec<Activity>> {
        let state = self.state.lock().await;
        state.reachable()?;
        Ok(state.activities.clone())
    }

    async fn update_worker_activity(
        &self,
        worker_sid: &str,
        activity_sid: &str,
    ) -> DeskResult<Worker> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let activity = state
            .activities
            .iter()
            .find(|a| a.sid == activity_sid)
            .cloned()
            .ok_or_else(|| DeskError::not_found("Activity", activity_sid))?;
        let worker = state
            .workers
            .get_mut(worker_sid)
            .ok_or_else(|| DeskError::not_found("Worker", worker_sid))?;
        worker.activity_sid = Some(activity.sid);
        worker.activity_name = Some(activity.friendly_name);
        worker.available = activity.available;
        Ok(worker.clone())
    }

    async fn fetch_conversation(&self, conversation_sid: &str) -> DeskResult<Conversation> {
        let state = self.state.lock().await;
        state.reachable()?;
        state
            .conversations
            .get(conversation_sid)
            .cloned()
            .ok_or_else(|| DeskError::not_found("Conversation", conversation_sid))
    }

    async fn claim_conversation_task(
        &self,
        conversation_sid: &str,
        task_sid: &str,
    ) -> DeskResult<ClaimOutcome> {
        let mut state = self.state.lock().await;
        state.available("claim_conversation_task")?;

        let conversation = state
            .conversations
            .get_mut(conversation_sid)
            .ok_or_else(|| DeskError::not_found("Conversation", conversation_sid))?;
        if let Some(existing) = conversation.linked_task_sid() {
            return Ok(if existing == task_sid {
                ClaimOutcome::Claimed
            } else {
                ClaimOutcome::AlreadyClaimed {
                    task_sid: existing.to_string(),
                }
            });
        }
        conversation.attributes.task_sid = Some(task_sid.to_string());
        Ok(ClaimOutcome::Claimed)
    }

    async fn close_conversation(&self, conversation_sid: &str) -> DeskResult<Conversation> {
        let mut state = self.state.lock().await;
        state.reachable()?;

        let conversation = state
            .conversations
            .get_mut(conversation_sid)
            .ok_or_else(|| DeskError::not_found("Conversation", conversation_sid))?;
        conversation.state = ConversationState::Closed;
        Ok(conversation.clone())
    }

    async fn merge_message_attributes(
        &self,
        conversation_sid: &str,
        message_sid: &str,
        patch: Map<String, Value>,
    ) -> DeskResult<()> {
        let mut state = self.state.lock().await;
        state.available("merge_message_attributes")?;

        if !state.conversations.contains_key(conversation_sid) {
            return Err(DeskError::not_found("Conversation", conversation_sid));
        }
        state
            .message_attributes
            .entry((conversation_sid.to_string(), message_sid.to_string()))
            .or_default()
            .extend(patch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twiml::ConferenceDial;
    use switchboard_core::ConversationAttributes;

    #[tokio::test]
    async fn test_redirect_into_conference_joins_leg() -> DeskResult<()> {
        let platform = InMemoryPlatform::new();
        platform.add_call(Call::new("CA1", CallStatus::InProgress)).await;

        let twiml = VoiceResponse::dial_conference(ConferenceDial::new("xfer-CA1")).to_xml();
        platform.redirect_call("CA1", &twiml).await?;

        let conferences = platform.list_conferences("xfer-CA1", None).await?;
        assert_eq!(conferences.len(), 1);
        let participant = platform.fetch_participant(&conferences[0].sid, "CA1").await?;
        assert_eq!(participant.status, ParticipantStatus::Connected);
        Ok(())
    }

    #[tokio::test]
    async fn test_terminal_call_refuses_redirect() {
        let platform = InMemoryPlatform::new();
        platform.add_call(Call::new("CA1", CallStatus::Completed)).await;

        let result = platform.redirect_call("CA1", "<Response/>").await;
        assert!(matches!(result, Err(DeskError::Upstream { status: 400, .. })));
        assert!(platform.redirects().await.is_empty());
    }

    #[tokio::test]
    async fn test_delayed_conference_becomes_ready() -> DeskResult<()> {
        let platform = InMemoryPlatform::new();
        platform.add_call(Call::new("CA1", CallStatus::InProgress)).await;
        platform.delay_conference("task-WT1", 2).await;

        let twiml = VoiceResponse::dial_conference(ConferenceDial::new("task-WT1")).to_xml();
        platform.redirect_call("CA1", &twiml).await?;

        let ready = Some(ConferenceStatus::InProgress);
        assert!(platform.list_conferences("task-WT1", ready).await?.is_empty());
        assert!(platform.list_conferences("task-WT1", ready).await?.is_empty());
        assert_eq!(platform.list_conferences("task-WT1", ready).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_scripted_call_progress() -> DeskResult<()> {
        let platform = InMemoryPlatform::new();
        platform.add_call(Call::new("CA1", CallStatus::Ringing)).await;
        platform.script_call("CA1", 1, CallStatus::InProgress).await;

        assert_eq!(platform.fetch_call("CA1").await?.status, CallStatus::Ringing);
        assert_eq!(platform.fetch_call("CA1").await?.status, CallStatus::InProgress);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_is_set_if_absent() -> DeskResult<()> {
        let platform = InMemoryPlatform::new();
        platform
            .add_conversation(Conversation {
                sid: "CH1".to_string(),
                friendly_name: None,
                state: ConversationState::Active,
                attributes: ConversationAttributes::default(),
                date_created: None,
            })
            .await;

        assert_eq!(platform.claim_conversation_task("CH1", "WT1").await?, ClaimOutcome::Claimed);
        assert_eq!(
            platform.claim_conversation_task("CH1", "WT2").await?,
            ClaimOutcome::AlreadyClaimed {
                task_sid: "WT1".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_flag() {
        let platform = InMemoryPlatform::new();
        platform.set_unreachable(true).await;
        assert!(matches!(
            platform.list_workers().await,
            Err(DeskError::UpstreamUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_task_history_records_transitions() -> DeskResult<()> {
        let platform = InMemoryPlatform::new();
        platform.add_task(Task::new("WT1", AssignmentStatus::Assigned)).await;
        platform
            .update_task("WT1", TaskUpdate::status(AssignmentStatus::Wrapping))
            .await?;
        platform
            .update_task("WT1", TaskUpdate::status(AssignmentStatus::Completed))
            .await?;

        assert_eq!(
            platform.task_history("WT1").await,
            vec![
                AssignmentStatus::Assigned,
                AssignmentStatus::Wrapping,
                AssignmentStatus::Completed
            ]
        );
        let reopened = platform
            .update_task("WT1", TaskUpdate::status(AssignmentStatus::Assigned))
            .await;
        assert!(reopened.is_err());
        Ok(())
    }
}

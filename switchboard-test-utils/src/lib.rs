//! Switchboard Test Utilities
//!
//! Shared test infrastructure for the switchboard workspace:
//! - Proptest generators for identities, statuses and recordings
//! - Fixtures that seed the in-memory platform with common scenarios
//! - Assertions on domain error kinds

// Re-export the in-memory stores from their source crates
pub use switchboard_events::RingEventLog;
pub use switchboard_platform::InMemoryPlatform;
pub use switchboard_storage::InMemoryHoldTimerStore;

// Re-export core types for convenience
pub use switchboard_core::{
    Activity, AssignmentStatus, Call, CallStatus, Channel, ChatTaskAttributes, ConferenceLinkage,
    Conversation, ConversationAttributes, ConversationState, DeskError, DeskResult, ErrorKind,
    Recording, RecordingStatus, Reservation, ReservationStatus, Task, TaskAttributes, Timestamp,
    VoiceTaskAttributes, Worker,
};

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies.

    use super::*;
    use proptest::prelude::*;

    /// Bare agent token: what an agent id looks like before normalization.
    pub fn arb_agent_token() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9_.-]{0,15}"
    }

    /// An agent identity in any of the accepted spellings.
    pub fn arb_agent_identity() -> impl Strategy<Value = String> {
        (arb_agent_token(), 0..3u8).prop_map(|(token, form)| match form {
            0 => token,
            1 => format!("agent:{}", token),
            _ => format!("client:agent:{}", token),
        })
    }

    pub fn arb_e164() -> impl Strategy<Value = String> {
        "\\+[1-9][0-9]{7,13}"
    }

    pub fn arb_sid(prefix: &'static str) -> impl Strategy<Value = String> {
        "[0-9a-f]{32}".prop_map(move |hex| format!("{}{}", prefix, hex))
    }

    pub fn arb_assignment_status() -> impl Strategy<Value = AssignmentStatus> {
        prop::sample::select(AssignmentStatus::ALL.to_vec())
    }

    pub fn arb_call_status() -> impl Strategy<Value = CallStatus> {
        prop::sample::select(CallStatus::ALL.to_vec())
    }

    pub fn arb_reservation_status() -> impl Strategy<Value = ReservationStatus> {
        prop::sample::select(ReservationStatus::ALL.to_vec())
    }

    /// Recording status as the platform spells it, plus the odd unknown one.
    pub fn arb_recording_status() -> impl Strategy<Value = RecordingStatus> {
        prop_oneof![
            Just(RecordingStatus::new(RecordingStatus::IN_PROGRESS)),
            Just(RecordingStatus::new(RecordingStatus::PAUSED)),
            Just(RecordingStatus::new("stopped")),
            Just(RecordingStatus::new("completed")),
            Just(RecordingStatus::new("absent")),
        ]
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-01-01 .. 2030-01-01
        (1_577_836_800i64..1_893_456_000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default()
        })
    }

    /// Recordings of one call with distinct SIDs.
    pub fn arb_recordings(call_sid: &'static str) -> impl Strategy<Value = Vec<Recording>> {
        prop::collection::vec(
            (arb_recording_status(), prop::option::of(arb_timestamp())),
            0..6,
        )
        .prop_map(move |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (status, date_created))| Recording {
                    sid: format!("RE{:032}", i),
                    call_sid: call_sid.to_string(),
                    status,
                    date_created,
                })
                .collect()
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Common platform resources and seeded scenarios.

    use super::*;

    /// Voice task for `call_sid`, without conference linkage.
    pub fn voice_task(sid: &str, status: AssignmentStatus, call_sid: &str) -> Task {
        Task::new(sid, status).with_attributes(TaskAttributes::Voice(VoiceTaskAttributes {
            call_sid: Some(call_sid.to_string()),
            ..Default::default()
        }))
    }

    /// Voice task whose attributes link it to a conference and both legs.
    pub fn linked_voice_task(
        sid: &str,
        status: AssignmentStatus,
        conference_sid: &str,
        customer_call_sid: &str,
        agent_call_sid: &str,
    ) -> Task {
        let mut participants = serde_json::Map::new();
        participants.insert("customer".to_string(), customer_call_sid.into());
        participants.insert("worker".to_string(), agent_call_sid.into());

        Task::new(sid, status).with_attributes(TaskAttributes::Voice(VoiceTaskAttributes {
            call_sid: Some(customer_call_sid.to_string()),
            conference: Some(ConferenceLinkage {
                sid: Some(conference_sid.to_string()),
                participants,
            }),
            ..Default::default()
        }))
    }

    pub fn chat_task(sid: &str, status: AssignmentStatus, conversation_sid: &str) -> Task {
        Task::new(sid, status).with_attributes(TaskAttributes::Chat(
            ChatTaskAttributes::for_conversation(conversation_sid),
        ))
    }

    pub fn live_call(sid: &str) -> Call {
        let mut call = Call::new(sid, CallStatus::InProgress);
        call.to = Some("+15550001000".to_string());
        call.from = Some("+15550002000".to_string());
        call
    }

    pub fn worker(sid: &str, friendly_name: &str) -> Worker {
        Worker {
            sid: sid.to_string(),
            friendly_name: friendly_name.to_string(),
            activity_sid: None,
            activity_name: Some("Offline".to_string()),
            available: false,
            attributes: Default::default(),
        }
    }

    pub fn available_activity() -> Activity {
        Activity {
            sid: "WA_AVAILABLE".to_string(),
            friendly_name: "Available".to_string(),
            available: true,
        }
    }

    pub fn reservation(sid: &str, task_sid: &str, worker_sid: &str) -> Reservation {
        Reservation {
            sid: sid.to_string(),
            task_sid: task_sid.to_string(),
            worker_sid: Some(worker_sid.to_string()),
            reservation_status: ReservationStatus::Accepted,
            date_created: Some(chrono::Utc::now()),
        }
    }

    pub fn active_conversation(sid: &str) -> Conversation {
        Conversation {
            sid: sid.to_string(),
            friendly_name: None,
            state: ConversationState::Active,
            attributes: ConversationAttributes::default(),
            date_created: Some(chrono::Utc::now()),
        }
    }

    pub fn recording(sid: &str, call_sid: &str, status: &str) -> Recording {
        Recording {
            sid: sid.to_string(),
            call_sid: call_sid.to_string(),
            status: RecordingStatus::new(status),
            date_created: Some(chrono::Utc::now()),
        }
    }

    /// Agent `42` as worker `WK42`, with an activity to move to.
    pub async fn seed_agent(platform: &InMemoryPlatform) {
        platform.add_activity(available_activity()).await;
        platform.add_worker(worker("WK42", "agent-42")).await;
    }

    /// A voice contact in `status` with both legs live.
    pub async fn seed_voice_contact(
        platform: &InMemoryPlatform,
        task_sid: &str,
        status: AssignmentStatus,
    ) {
        platform.add_call(live_call("CA_CUSTOMER")).await;
        platform.add_call(live_call("CA_AGENT")).await;
        platform
            .add_task(voice_task(task_sid, status, "CA_CUSTOMER"))
            .await;
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on domain results.

    use super::*;

    pub fn assert_kind<T: std::fmt::Debug>(result: &DeskResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {}", e),
            Ok(value) => panic!("expected {:?}, got Ok({:?})", kind, value),
        }
    }

    pub fn assert_invalid_state<T: std::fmt::Debug>(result: &DeskResult<T>) {
        assert_kind(result, ErrorKind::InvalidState);
    }

    pub fn assert_not_found<T: std::fmt::Debug>(result: &DeskResult<T>) {
        assert_kind(result, ErrorKind::NotFound);
    }
}

//! Switchboard Core - Domain Types
//!
//! Pure data structures describing contact work as the telephony platform
//! sees it: tasks, reservations, calls, conferences, participants,
//! recordings, conversations and workers. All other crates depend on this.
//! This crate performs no I/O.

#[macro_use]
mod macros;

pub mod chat;
pub mod error;
pub mod identity;
pub mod poll;
pub mod reservation;
pub mod task;
pub mod voice;
pub mod worker;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use chat::{Conversation, ConversationAttributes, ConversationState, MessageAuthor};
pub use error::{DeskError, DeskResult, ErrorKind, ParseStatusError};
pub use identity::{normalize_identity, TargetKind, TransferTarget};
pub use poll::{Backoff, PollPolicy};
pub use reservation::{distinct_task_sids, Reservation, ReservationStatus};
pub use task::{
    AssignmentStatus, Channel, ChatTaskAttributes, ConferenceLinkage, Task, TaskAttributes,
    VoiceTaskAttributes, WrapPlan, DEFAULT_LIST_STATUSES,
};
pub use voice::{
    select_latest_recording, task_conference_name, transfer_conference_name, Call, CallStatus,
    Conference, ConferenceStatus, LegRole, Participant, ParticipantStatus, Recording,
    RecordingAction, RecordingStatus,
};
pub use worker::{Activity, PresenceSnapshot, Worker, WorkerPresence};

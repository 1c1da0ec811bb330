//! Error types for desk operations

use crate::task::AssignmentStatus;
use crate::voice::{CallStatus, ParticipantStatus};
use thiserror::Error;

/// Error when a platform status string is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {kind}: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseStatusError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Discriminant of [`DeskError`], for callers that branch on the category
/// of a failure rather than its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidState,
    NotRedirectable,
    NotInProgress,
    ConferenceNotReady,
    ParticipantNotFound,
    ParticipantNotConnected,
    RecordingNotFound,
    NotFound,
    Validation,
    Conflict,
    UpstreamUnreachable,
    Upstream,
    Internal,
}

impl ErrorKind {
    /// Reconciliation budget exhausted while waiting on a platform resource.
    pub fn is_reconciliation_timeout(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConferenceNotReady
                | ErrorKind::ParticipantNotFound
                | ErrorKind::ParticipantNotConnected
        )
    }

    /// The caller can fix the request or retry once the call settles.
    pub fn is_caller_actionable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidState
                | ErrorKind::NotRedirectable
                | ErrorKind::NotInProgress
                | ErrorKind::RecordingNotFound
                | ErrorKind::NotFound
                | ErrorKind::Validation
                | ErrorKind::Conflict
        )
    }
}

/// Failures raised by the lifecycle, reconciliation, transfer and hold logic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeskError {
    #[error("Cannot {operation} task {task_sid} while it is {status}")]
    InvalidState {
        task_sid: String,
        status: AssignmentStatus,
        operation: &'static str,
    },

    #[error("Call {call_sid} cannot be redirected, platform status is {status}")]
    NotRedirectable { call_sid: String, status: CallStatus },

    #[error("Call {call_sid} did not reach in-progress, platform status is {status}")]
    NotInProgress { call_sid: String, status: CallStatus },

    #[error("Conference {conference} not in progress after {attempts} attempts")]
    ConferenceNotReady { conference: String, attempts: u32 },

    #[error("Participant {call_sid} not found in conference {conference_sid}")]
    ParticipantNotFound {
        conference_sid: String,
        call_sid: String,
    },

    #[error("Participant {call_sid} in conference {conference_sid} still {status}")]
    ParticipantNotConnected {
        conference_sid: String,
        call_sid: String,
        status: ParticipantStatus,
    },

    #[error("No recording exists for call {call_sid}")]
    RecordingNotFound { call_sid: String },

    #[error("{resource} {sid} not found")]
    NotFound { resource: &'static str, sid: String },

    #[error("Invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Conflict on {resource} {sid}: {reason}")]
    Conflict {
        resource: &'static str,
        sid: String,
        reason: String,
    },

    #[error("Platform unreachable: {reason}")]
    UpstreamUnreachable { reason: String },

    #[error("Platform returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl DeskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeskError::InvalidState { .. } => ErrorKind::InvalidState,
            DeskError::NotRedirectable { .. } => ErrorKind::NotRedirectable,
            DeskError::NotInProgress { .. } => ErrorKind::NotInProgress,
            DeskError::ConferenceNotReady { .. } => ErrorKind::ConferenceNotReady,
            DeskError::ParticipantNotFound { .. } => ErrorKind::ParticipantNotFound,
            DeskError::ParticipantNotConnected { .. } => ErrorKind::ParticipantNotConnected,
            DeskError::RecordingNotFound { .. } => ErrorKind::RecordingNotFound,
            DeskError::NotFound { .. } => ErrorKind::NotFound,
            DeskError::Validation { .. } => ErrorKind::Validation,
            DeskError::Conflict { .. } => ErrorKind::Conflict,
            DeskError::UpstreamUnreachable { .. } => ErrorKind::UpstreamUnreachable,
            DeskError::Upstream { .. } => ErrorKind::Upstream,
            DeskError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DeskError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(resource: &'static str, sid: impl Into<String>) -> Self {
        DeskError::NotFound {
            resource,
            sid: sid.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        DeskError::Internal {
            reason: reason.into(),
        }
    }

    /// True when the platform reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DeskError::NotFound { .. })
    }
}

/// Result type alias for desk operations.
pub type DeskResult<T> = Result<T, DeskError>;

// =============================================================================
// TESTS
// =============================================================================

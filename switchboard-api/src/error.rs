//! Error Types for the Switchboard API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Mapping from domain [`DeskError`] kinds onto HTTP statuses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.
//! Internal details (platform messages, reconciliation state) are logged,
//! never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use switchboard_core::DeskError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Request lacks valid authentication credentials
    Unauthorized,

    /// Request is authenticated but lacks permission for the resource
    Forbidden,

    /// Authentication token is invalid or malformed
    InvalidToken,

    /// Authentication token has expired
    TokenExpired,

    /// Platform webhook signature missing or wrong
    InvalidSignature,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Operation not allowed in the task's current status
    InvalidState,

    /// Login identity does not belong to the agent
    IdentityMismatch,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    /// No recording exists for the call
    RecordingNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Call leg has ended and cannot be redirected
    NotRedirectable,

    /// Call leg never reached in-progress
    NotInProgress,

    /// Operation conflicts with current state
    StateConflict,

    // ========================================================================
    // Server Errors (500, 502, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Conference or participant never became usable
    ReconciliationFailed,

    /// Telephony platform could not be reached
    UpstreamUnreachable,

    /// Telephony platform rejected the request
    UpstreamError,

    /// Service is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden | ErrorCode::InvalidSignature => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidState
            | ErrorCode::IdentityMismatch => StatusCode::BAD_REQUEST,

            ErrorCode::EntityNotFound | ErrorCode::RecordingNotFound => StatusCode::NOT_FOUND,

            ErrorCode::NotRedirectable | ErrorCode::NotInProgress | ErrorCode::StateConflict => {
                StatusCode::CONFLICT
            }

            ErrorCode::UpstreamUnreachable | ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,

            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError | ErrorCode::ReconciliationFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::InvalidToken => "Invalid authentication token",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::InvalidSignature => "Invalid webhook signature",

            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidState => "Operation not allowed in current state",
            ErrorCode::IdentityMismatch => "Identity does not match agent",

            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::RecordingNotFound => "No recording found for call",

            ErrorCode::NotRedirectable => "Call cannot be redirected",
            ErrorCode::NotInProgress => "Call is not in progress",
            ErrorCode::StateConflict => "Operation conflicts with current state",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ReconciliationFailed => "Operation could not be completed",
            ErrorCode::UpstreamUnreachable => "Telephony platform unreachable",
            ErrorCode::UpstreamError => "Telephony platform rejected the request",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (current status, observed platform status)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    /// Map a domain error, naming the failed operation in generic messages.
    ///
    /// Reconciliation timeouts surface as "Cannot {operation}" because the
    /// caller cannot act on which resource failed to converge.
    pub fn for_operation(operation: &str, err: DeskError) -> Self {
        if err.kind().is_reconciliation_timeout() {
            tracing::error!(operation, error = %err, "Reconciliation failed");
            return Self::new(ErrorCode::ReconciliationFailed, format!("Cannot {}", operation));
        }
        Self::from(err)
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create an InvalidToken error.
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    /// Create a TokenExpired error.
    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    /// Create an InvalidSignature error.
    pub fn invalid_signature() -> Self {
        Self::from_code(ErrorCode::InvalidSignature)
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create an EntityNotFound error.
    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} {} not found", entity_type, id),
        )
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::InvalidState {
                ref task_sid,
                status,
                operation,
            } => ApiError::new(ErrorCode::InvalidState, err.to_string()).with_details(json!({
                "taskSid": task_sid,
                "assignmentStatus": status,
                "operation": operation,
            })),

            DeskError::NotRedirectable {
                ref call_sid,
                status,
            } => ApiError::new(ErrorCode::NotRedirectable, err.to_string())
                .with_details(json!({ "callSid": call_sid, "twilioStatus": status })),

            DeskError::NotInProgress {
                ref call_sid,
                status,
            } => ApiError::new(ErrorCode::NotInProgress, err.to_string())
                .with_details(json!({ "callSid": call_sid, "twilioStatus": status })),

            DeskError::ConferenceNotReady { .. }
            | DeskError::ParticipantNotFound { .. }
            | DeskError::ParticipantNotConnected { .. } => {
                tracing::error!(error = %err, "Reconciliation failed");
                ApiError::from_code(ErrorCode::ReconciliationFailed)
            }

            DeskError::RecordingNotFound { ref call_sid } => {
                ApiError::new(ErrorCode::RecordingNotFound, err.to_string())
                    .with_details(json!({ "callSid": call_sid }))
            }

            DeskError::NotFound { resource, sid } => ApiError::entity_not_found(resource, sid),

            DeskError::Validation { ref field, .. } => {
                ApiError::new(ErrorCode::ValidationFailed, err.to_string())
                    .with_details(json!({ "field": field }))
            }

            DeskError::Conflict { .. } => ApiError::new(ErrorCode::StateConflict, err.to_string()),

            DeskError::UpstreamUnreachable { reason } => {
                tracing::error!(reason = %reason, "Telephony platform unreachable");
                ApiError::from_code(ErrorCode::UpstreamUnreachable)
            }

            DeskError::Upstream { status, message } => {
                tracing::error!(status, message = %message, "Telephony platform error");
                ApiError::from_code(ErrorCode::UpstreamError)
                    .with_details(json!({ "platformStatus": status }))
            }

            DeskError::Internal { reason } => {
                tracing::error!(reason = %reason, "Internal error");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

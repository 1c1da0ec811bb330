//! OpenAPI Specification for the Switchboard API
//!
//! The document is generated by utoipa from the route annotations and the
//! request/response types. Served at `/openapi.json` and printed by the
//! `generate-openapi` binary.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::{AccessToken, AgentContext};
use crate::error::{ApiError, ErrorCode};
use crate::types::*;

use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{
    auth, chat, crm, events, health, presence, taskrouter, token, transfer, voice, webhooks,
};

use switchboard_core::{
    Activity, AssignmentStatus, Channel, LegRole, PresenceSnapshot, Reservation,
    ReservationStatus, TargetKind, Task, Worker, WorkerPresence,
};

/// OpenAPI document for the Switchboard API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Switchboard API",
        version = "0.1.0",
        description = "Backend for the contact-center agent desktop: task lifecycle, transfers, hold, recording and platform webhooks",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Auth", description = "Agent login and platform access tokens"),
        (name = "Tasks", description = "The agent's tasks, wrap-up and completion"),
        (name = "Transfers", description = "Cold and warm call transfers"),
        (name = "Voice", description = "Hold and call recording"),
        (name = "Chat", description = "Conversation close"),
        (name = "Presence", description = "Worker availability"),
        (name = "Events", description = "Recent domain events"),
        (name = "CRM", description = "Customer lookup proxy"),
        (name = "Webhooks", description = "Signed callbacks from the platform"),
        (name = "Health", description = "Liveness and readiness probes")
    ),
    paths(
        // === Auth ===
        auth::login,
        token::access_token,

        // === Tasks ===
        taskrouter::my_tasks,
        taskrouter::complete_task,
        taskrouter::wrap_task,

        // === Transfers ===
        transfer::cold_transfer,
        transfer::warm_transfer,
        transfer::complete_transfer,

        // === Voice ===
        voice::hold_start,
        voice::hold_stop,
        voice::recording_start,
        voice::recording_pause,
        voice::recording_resume,
        voice::recording_stop,
        voice::recording_status,

        // === Chat ===
        chat::close_conversation,

        // === Presence ===
        presence::get_presence,
        presence::set_activity,

        // === Events ===
        events::recent_events,

        // === CRM ===
        crm::get_customer,

        // === Webhooks ===
        webhooks::assignment_callback,
        webhooks::taskrouter_event,
        webhooks::conversation_pre_event,
        webhooks::conversation_post_event,

        // === Health ===
        health::ping,
        health::liveness,
        health::readiness,
    ),
    components(
        schemas(
            // Errors
            ApiError,
            ErrorCode,

            // Auth
            LoginRequest,
            LoginResponse,
            AgentContext,
            AccessToken,

            // Tasks
            Task,
            AssignmentStatus,
            Channel,
            Reservation,
            ReservationStatus,
            MyTask,
            CompleteTaskRequest,
            WrapTaskRequest,
            TaskStatusResponse,

            // Transfers
            TargetKind,
            ColdTransferRequest,
            WarmTransferRequest,
            CompleteTransferRequest,
            TransferResponse,
            CompleteTransferResponse,

            // Voice
            LegRole,
            HoldRequest,
            HoldResponse,
            RecordingRequest,
            RecordingResponse,
            RecordingStatusResponse,

            // Chat
            CloseConversationResponse,

            // Presence
            Activity,
            Worker,
            WorkerPresence,
            PresenceSnapshot,
            SetActivityRequest,

            // Webhooks
            AssignmentCallback,
            TaskRouterEvent,
            ConversationWebhook,
            AssignmentInstruction,
            WebhookAck,

            // Health
            HealthResponse,
            HealthStatus,
            HealthDetails,
            ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the session bearer scheme the agent routes reference.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session token from POST /auth/login"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Render the OpenAPI document as pretty JSON.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

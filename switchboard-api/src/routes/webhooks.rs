//! Platform Webhook Routes
//!
//! Callbacks from the telephony platform. Bodies are form-encoded and the
//! signature has already been checked by the time a handler runs. Handlers
//! answer 200 with a short outcome, or 500 when processing failed, so the
//! platform's retry policy applies. The conversation pre-webhook is the one
//! exception: it answers 403 to reject a message.

use axum::{extract::State, routing::post, Form, Json, Router};
use switchboard_core::DeskResult;

use crate::{
    error::{ApiError, ApiResult},
    services::{MessageVerdict, WebhookRouter},
    state::AppState,
    telemetry::METRICS,
    types::{AssignmentCallback, AssignmentInstruction, ConversationWebhook, TaskRouterEvent, WebhookAck},
};

const ASSIGNMENT_ROUTE: &str = "/webhooks/taskrouter/assignment";
const TASK_EVENTS_ROUTE: &str = "/webhooks/taskrouter/events";
const PRE_EVENT_ROUTE: &str = "/webhooks/conversations/pre";
const POST_EVENT_ROUTE: &str = "/webhooks/conversations/post";

fn record(route: &str, outcome: &str) {
    if let Ok(m) = METRICS.as_ref() {
        m.record_webhook(route, outcome);
    }
}

/// Turn a router result into the platform-facing answer.
fn settle<T>(route: &'static str, result: DeskResult<T>, outcome: impl Fn(&T) -> &str) -> ApiResult<T> {
    match result {
        Ok(value) => {
            record(route, outcome(&value));
            Ok(value)
        }
        Err(e) => {
            tracing::error!(route, error = %e, "Webhook processing failed");
            record(route, "error");
            Err(ApiError::internal_error("Webhook processing failed"))
        }
    }
}

// ============================================================================
// TASKROUTER
// ============================================================================

/// POST /webhooks/taskrouter/assignment - Reservation offered to a worker
#[utoipa::path(
    post,
    path = "/webhooks/taskrouter/assignment",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Assignment instruction", body = AssignmentInstruction),
        (status = 403, description = "Invalid signature", body = ApiError),
        (status = 500, description = "Callback could not be processed", body = ApiError),
    )
)]
pub async fn assignment_callback(
    State(router): State<WebhookRouter>,
    Form(callback): Form<AssignmentCallback>,
) -> ApiResult<Json<AssignmentInstruction>> {
    let instruction = settle(
        ASSIGNMENT_ROUTE,
        router.assignment_instruction(&callback),
        |instruction| match instruction {
            AssignmentInstruction::Conference { .. } => "conference",
            AssignmentInstruction::Accept => "accept",
        },
    )?;
    Ok(Json(instruction))
}

/// POST /webhooks/taskrouter/events - Workspace event callback
#[utoipa::path(
    post,
    path = "/webhooks/taskrouter/events",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Event handled", body = WebhookAck),
        (status = 403, description = "Invalid signature", body = ApiError),
        (status = 500, description = "Event could not be processed", body = ApiError),
    )
)]
pub async fn taskrouter_event(
    State(router): State<WebhookRouter>,
    Form(event): Form<TaskRouterEvent>,
) -> ApiResult<Json<WebhookAck>> {
    tracing::debug!(event_type = event.event_type(), task_sid = ?event.task_sid, "TaskRouter event");
    let outcome = settle(
        TASK_EVENTS_ROUTE,
        router.on_taskrouter_event(&event).await,
        |outcome| *outcome,
    )?;
    Ok(Json(WebhookAck::handled(outcome)))
}

// ============================================================================
// CONVERSATIONS
// ============================================================================

/// POST /webhooks/conversations/pre - Gate a message before it is stored
#[utoipa::path(
    post,
    path = "/webhooks/conversations/pre",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Message allowed", body = WebhookAck),
        (status = 403, description = "Message rejected or invalid signature", body = ApiError),
    )
)]
pub async fn conversation_pre_event(
    State(router): State<WebhookRouter>,
    Form(hook): Form<ConversationWebhook>,
) -> ApiResult<Json<WebhookAck>> {
    match router.gate_message(&hook) {
        MessageVerdict::Allow => {
            record(PRE_EVENT_ROUTE, "allowed");
            Ok(Json(WebhookAck::handled("allowed")))
        }
        MessageVerdict::Reject(reason) => {
            tracing::info!(
                conversation_sid = ?hook.conversation_sid,
                author = ?hook.author,
                reason,
                "Message rejected"
            );
            record(PRE_EVENT_ROUTE, "rejected");
            Err(ApiError::forbidden(reason))
        }
    }
}

/// POST /webhooks/conversations/post - Conversation post-event
#[utoipa::path(
    post,
    path = "/webhooks/conversations/post",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Event handled", body = WebhookAck),
        (status = 403, description = "Invalid signature", body = ApiError),
        (status = 500, description = "Event could not be processed", body = ApiError),
    )
)]
pub async fn conversation_post_event(
    State(router): State<WebhookRouter>,
    Form(hook): Form<ConversationWebhook>,
) -> ApiResult<Json<WebhookAck>> {
    tracing::debug!(
        event_type = hook.event_type(),
        conversation_sid = ?hook.conversation_sid,
        "Conversation event"
    );
    let outcome = settle(
        POST_EVENT_ROUTE,
        router.on_conversation_event(&hook).await,
        |outcome| *outcome,
    )?;
    Ok(Json(WebhookAck::handled(outcome)))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the webhook routes router. Signature checking is layered on by
/// the caller.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/taskrouter/assignment", post(assignment_callback))
        .route("/taskrouter/events", post(taskrouter_event))
        .route("/conversations/pre", post(conversation_pre_event))
        .route("/conversations/post", post(conversation_post_event))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use switchboard_platform::InMemoryPlatform;
    use tower::ServiceExt;

    fn app() -> (Arc<InMemoryPlatform>, Router) {
        let platform = Arc::new(InMemoryPlatform::new());
        let state = AppState::new(platform.clone(), &AppConfig::default()).unwrap();
        (platform, create_router(state))
    }

    async fn post_form(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_voice_assignment_gets_conference_instruction() {
        let (_, app) = app();
        let (status, body) = post_form(
            app,
            "/taskrouter/assignment",
            "TaskSid=WT1&ReservationSid=WR1&TaskAttributes=%7B%22call_sid%22%3A%22CA1%22%7D",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["instruction"], "conference");
        assert_eq!(body["end_conference_on_exit"], false);
    }

    #[tokio::test]
    async fn test_chat_assignment_is_accepted() {
        let (_, app) = app();
        let (status, body) = post_form(
            app,
            "/taskrouter/assignment",
            "TaskSid=WT2&TaskAttributes=%7B%22conversationSid%22%3A%22CH1%22%7D",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["instruction"], "accept");
    }

    #[tokio::test]
    async fn test_unreadable_attributes_answer_500() {
        let (_, app) = app();
        let (status, _) = post_form(app, "/taskrouter/assignment", "TaskSid=WT3&TaskAttributes=nope").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_by_pre_webhook() {
        let (_, app) = app();
        let (status, _) = post_form(
            app.clone(),
            "/conversations/pre",
            "EventType=onMessageAdd&ConversationSid=CH1&Body=",
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = post_form(
            app,
            "/conversations/pre",
            "EventType=onMessageAdd&ConversationSid=CH1&Body=hello",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "allowed");
    }

    #[tokio::test]
    async fn test_system_message_opens_no_task() {
        let (platform, app) = app();
        let (status, body) = post_form(
            app,
            "/conversations/post",
            "EventType=onMessageAdded&ConversationSid=CH1&Author=system&Body=welcome",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");
        assert!(platform.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_taskrouter_event_is_acknowledged() {
        let (_, app) = app();
        let (status, body) = post_form(app, "/taskrouter/events", "EventType=reservation.timeout").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ignored");
    }
}

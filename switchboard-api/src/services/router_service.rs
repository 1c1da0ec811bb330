//! Webhook Router Service
//!
//! Translates platform callbacks into lifecycle calls and broadcasts. The
//! HTTP layer answers the platform; this module only decides what each
//! callback means and reports a short outcome label.

use std::sync::Arc;

use serde_json::{Map, Value};
use switchboard_core::{Channel, DeskError, DeskResult, TaskAttributes};
use switchboard_events::{DomainEvent, EventHub};
use switchboard_platform::PlatformGateway;
use switchboard_storage::HoldTimerStore;

use super::lifecycle_service::TaskLifecycle;
use super::presence_service::PresenceService;
use crate::types::{AssignmentCallback, AssignmentInstruction, ConversationWebhook, TaskRouterEvent};

/// Message attribute carrying the latest delivery receipt status.
pub const DELIVERY_STATUS_ATTRIBUTE: &str = "deliveryStatus";

/// Decision of the conversation pre-webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVerdict {
    Allow,
    Reject(&'static str),
}

fn decode_attributes(raw: Option<&str>) -> DeskResult<TaskAttributes> {
    let raw = raw.unwrap_or_default();
    TaskAttributes::try_from(Value::String(raw.to_string()))
        .map_err(|e| DeskError::validation("TaskAttributes", e.to_string()))
}

fn require<'a>(value: Option<&'a str>, field: &str) -> DeskResult<&'a str> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DeskError::validation(field, "is required"))
}

#[derive(Clone)]
pub struct WebhookRouter {
    platform: Arc<dyn PlatformGateway>,
    lifecycle: TaskLifecycle,
    presence: PresenceService,
    holds: Arc<dyn HoldTimerStore>,
    events: EventHub,
    max_message_length: usize,
    caller_id: Option<String>,
    post_work_activity_sid: Option<String>,
}

impl WebhookRouter {
    pub fn new(
        platform: Arc<dyn PlatformGateway>,
        lifecycle: TaskLifecycle,
        presence: PresenceService,
        holds: Arc<dyn HoldTimerStore>,
        events: EventHub,
        max_message_length: usize,
    ) -> Self {
        Self {
            platform,
            lifecycle,
            presence,
            holds,
            events,
            max_message_length,
            caller_id: None,
            post_work_activity_sid: None,
        }
    }

    /// Settings echoed into the conference instruction for voice tasks.
    pub fn with_assignment(
        mut self,
        caller_id: Option<String>,
        post_work_activity_sid: Option<String>,
    ) -> Self {
        self.caller_id = caller_id;
        self.post_work_activity_sid = post_work_activity_sid;
        self
    }

    // ========================================================================
    // CONVERSATIONS
    // ========================================================================

    /// Gate a message before the platform stores it.
    pub fn gate_message(&self, hook: &ConversationWebhook) -> MessageVerdict {
        if hook.event_type() != "onMessageAdd" {
            return MessageVerdict::Allow;
        }
        let body = hook.body.as_deref().unwrap_or_default();
        if body.trim().is_empty() && !hook.has_media() {
            return MessageVerdict::Reject("Empty message");
        }
        if body.chars().count() > self.max_message_length {
            return MessageVerdict::Reject("Message too long");
        }
        MessageVerdict::Allow
    }

    /// Act on a conversation post-event.
    pub async fn on_conversation_event(&self, hook: &ConversationWebhook) -> DeskResult<&'static str> {
        match hook.event_type() {
            "onMessageAdded" => {
                let conversation_sid = require(hook.conversation_sid.as_deref(), "ConversationSid")?;
                let outcome = self
                    .lifecycle
                    .on_chat_message(
                        conversation_sid,
                        hook.author.as_deref().unwrap_or_default(),
                        hook.participant_role.as_deref(),
                    )
                    .await?;
                Ok(outcome.as_str())
            }
            "onConversationStateUpdated" => {
                let closed = hook
                    .state_to
                    .as_deref()
                    .map(|state| state.eq_ignore_ascii_case("closed"))
                    .unwrap_or(false);
                if !closed {
                    return Ok("ignored");
                }
                let conversation_sid = require(hook.conversation_sid.as_deref(), "ConversationSid")?;
                let outcome = self.lifecycle.on_conversation_closed(conversation_sid).await?;
                Ok(outcome.as_str())
            }
            "onDeliveryUpdated" => {
                let conversation_sid = require(hook.conversation_sid.as_deref(), "ConversationSid")?;
                if let (Some(message_sid), Some(status)) = (hook.message_sid.as_deref(), hook.status.as_deref()) {
                    self.merge_delivery_status(conversation_sid, message_sid, status).await;
                }
                self.events
                    .publish(DomainEvent::MessageDeliveryUpdated {
                        conversation_sid: conversation_sid.to_string(),
                        message_sid: hook.message_sid.clone(),
                        status: hook.status.clone(),
                    })
                    .await;
                Ok("delivery_updated")
            }
            other => {
                tracing::debug!(event_type = other, "Unhandled conversation event");
                Ok("ignored")
            }
        }
    }

    /// Stamp the receipt status onto the message. Failure only loses the stamp.
    async fn merge_delivery_status(&self, conversation_sid: &str, message_sid: &str, status: &str) {
        let mut patch = Map::new();
        patch.insert(DELIVERY_STATUS_ATTRIBUTE.to_string(), Value::String(status.to_string()));
        if let Err(e) = self
            .platform
            .merge_message_attributes(conversation_sid, message_sid, patch)
            .await
        {
            tracing::warn!(conversation_sid, message_sid, error = %e, "Delivery status not merged into message attributes");
        }
    }

    // ========================================================================
    // TASKROUTER
    // ========================================================================

    /// Act on a workspace event callback.
    pub async fn on_taskrouter_event(&self, event: &TaskRouterEvent) -> DeskResult<&'static str> {
        match event.event_type() {
            "worker.activity.update" => {
                self.presence.broadcast().await?;
                Ok("presence_broadcast")
            }
            "task.created" => {
                let task_sid = require(event.task_sid.as_deref(), "TaskSid")?;
                let attributes = decode_attributes(event.task_attributes.as_deref())
                    .unwrap_or_default();
                let channel = match attributes.channel() {
                    Channel::Other => event
                        .task_channel_unique_name
                        .as_deref()
                        .map(Channel::from_label)
                        .unwrap_or(Channel::Other),
                    channel => channel,
                };
                // Chat tasks are announced when the conversation claims them.
                if channel == Channel::Chat {
                    return Ok("ignored");
                }
                self.events
                    .publish(DomainEvent::TaskCreated {
                        task_sid: task_sid.to_string(),
                        channel,
                        conversation_sid: attributes.conversation_sid().map(str::to_string),
                    })
                    .await;
                Ok("task_created")
            }
            "task.completed" | "task.canceled" => {
                let task_sid = require(event.task_sid.as_deref(), "TaskSid")?;
                let cleared = self.holds.clear_task(task_sid).await;
                tracing::debug!(task_sid, cleared, "Task ended on the platform");
                Ok("holds_cleared")
            }
            other => {
                tracing::debug!(event_type = other, task_sid = ?event.task_sid, "Unhandled TaskRouter event");
                Ok("ignored")
            }
        }
    }

    /// Instruction for a reservation offered to a worker: voice tasks are
    /// bridged through a conference, everything else is accepted.
    pub fn assignment_instruction(&self, callback: &AssignmentCallback) -> DeskResult<AssignmentInstruction> {
        let attributes = decode_attributes(callback.task_attributes.as_deref())?;
        let instruction = match attributes.channel() {
            Channel::Voice => AssignmentInstruction::Conference {
                from: self.caller_id.clone(),
                post_work_activity_sid: self.post_work_activity_sid.clone(),
                end_conference_on_exit: false,
            },
            Channel::Chat | Channel::Other => AssignmentInstruction::Accept,
        };
        tracing::info!(
            task_sid = ?callback.task_sid,
            reservation_sid = ?callback.reservation_sid,
            channel = attributes.channel().as_str(),
            "Reservation assigned"
        );
        Ok(instruction)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::IntegrationClient;
    use chrono::Utc;
    use switchboard_core::{AssignmentStatus, Conversation, ConversationAttributes, ConversationState, Task};
    use switchboard_events::RingEventLog;
    use switchboard_platform::InMemoryPlatform;
    use switchboard_storage::InMemoryHoldTimerStore;

    struct Harness {
        platform: Arc<InMemoryPlatform>,
        holds: Arc<InMemoryHoldTimerStore>,
        events: EventHub,
        router: WebhookRouter,
    }

    fn harness() -> Harness {
        let platform = Arc::new(InMemoryPlatform::new());
        let holds = Arc::new(InMemoryHoldTimerStore::new());
        let events = EventHub::new(Arc::new(RingEventLog::new(16)), 16);
        let lifecycle = TaskLifecycle::new(
            platform.clone(),
            events.clone(),
            holds.clone(),
            IntegrationClient::default(),
            None,
        );
        let presence = PresenceService::new(platform.clone(), events.clone());
        let router = WebhookRouter::new(platform.clone(), lifecycle, presence, holds.clone(), events.clone(), 10)
            .with_assignment(Some("+15550009999".to_string()), Some("WA_WRAP".to_string()));
        Harness {
            platform,
            holds,
            events,
            router,
        }
    }

    fn message(event_type: &str, body: Option<&str>) -> ConversationWebhook {
        ConversationWebhook {
            event_type: Some(event_type.to_string()),
            conversation_sid: Some("CH1".to_string()),
            author: Some("+15550001111".to_string()),
            body: body.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_pre_webhook_gate() {
        let h = harness();
        assert_eq!(
            h.router.gate_message(&message("onMessageAdd", Some("  "))),
            MessageVerdict::Reject("Empty message")
        );
        assert_eq!(
            h.router.gate_message(&message("onMessageAdd", Some("this is far too long"))),
            MessageVerdict::Reject("Message too long")
        );
        assert_eq!(
            h.router.gate_message(&message("onMessageAdd", Some("hello"))),
            MessageVerdict::Allow
        );

        let mut picture = message("onMessageAdd", None);
        picture.media = Some(r#"[{"sid":"ME1"}]"#.to_string());
        assert_eq!(h.router.gate_message(&picture), MessageVerdict::Allow);

        assert_eq!(
            h.router.gate_message(&message("onConversationAdd", None)),
            MessageVerdict::Allow
        );
    }

    #[tokio::test]
    async fn test_system_author_is_ignored() -> DeskResult<()> {
        let h = harness();
        let mut hook = message("onMessageAdded", Some("Welcome"));
        hook.author = Some("system".to_string());

        assert_eq!(h.router.on_conversation_event(&hook).await?, "ignored");
        assert!(h.platform.tasks().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_state_update_to_closed_completes_task() -> DeskResult<()> {
        let h = harness();
        h.platform
            .add_conversation(Conversation {
                sid: "CH1".to_string(),
                friendly_name: None,
                state: ConversationState::Closed,
                attributes: ConversationAttributes {
                    task_sid: Some("WT1".to_string()),
                    ..Default::default()
                },
                date_created: None,
            })
            .await;
        h.platform
            .add_task(Task::new("WT1", AssignmentStatus::Wrapping))
            .await;

        let mut hook = message("onConversationStateUpdated", None);
        hook.state_to = Some("inactive".to_string());
        assert_eq!(h.router.on_conversation_event(&hook).await?, "ignored");

        hook.state_to = Some("closed".to_string());
        assert_eq!(h.router.on_conversation_event(&hook).await?, "completed");
        assert_eq!(
            h.platform.task("WT1").await.map(|t| t.assignment_status),
            Some(AssignmentStatus::Completed)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_delivery_update_merges_status_and_notifies() -> DeskResult<()> {
        let h = harness();
        h.platform
            .add_conversation(Conversation {
                sid: "CH1".to_string(),
                friendly_name: None,
                state: ConversationState::Active,
                attributes: ConversationAttributes::default(),
                date_created: None,
            })
            .await;
        let mut hook = message("onDeliveryUpdated", None);
        hook.message_sid = Some("IM1".to_string());
        hook.status = Some("read".to_string());

        assert_eq!(h.router.on_conversation_event(&hook).await?, "delivery_updated");
        let attributes = h.platform.message_attributes("CH1", "IM1").await;
        assert_eq!(
            attributes.and_then(|a| a.get(DELIVERY_STATUS_ATTRIBUTE).cloned()),
            Some(Value::String("read".to_string()))
        );
        let recent = h.events.log().recent(1).await;
        assert_eq!(
            recent.first().map(|r| r.event.event_type()),
            Some("message_delivery_updated")
        );
        // No lifecycle effect.
        assert!(h.platform.tasks().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delivery_update_notifies_when_merge_fails() -> DeskResult<()> {
        let h = harness();
        h.platform.fail_operation("merge_message_attributes").await;
        let mut hook = message("onDeliveryUpdated", None);
        hook.message_sid = Some("IM1".to_string());
        hook.status = Some("failed".to_string());

        assert_eq!(h.router.on_conversation_event(&hook).await?, "delivery_updated");
        assert_eq!(h.platform.message_attributes("CH1", "IM1").await, None);
        let recent = h.events.log().recent(1).await;
        assert_eq!(
            recent.first().map(|r| r.event.event_type()),
            Some("message_delivery_updated")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_task_end_clears_hold_sessions() -> DeskResult<()> {
        let h = harness();
        h.holds.start("CA1", Some("WT1"), Utc::now()).await;

        let event = TaskRouterEvent {
            event_type: Some("task.canceled".to_string()),
            task_sid: Some("WT1".to_string()),
            ..Default::default()
        };
        assert_eq!(h.router.on_taskrouter_event(&event).await?, "holds_cleared");
        assert_eq!(h.holds.len().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_voice_task_created_is_announced() -> DeskResult<()> {
        let h = harness();
        let event = TaskRouterEvent {
            event_type: Some("task.created".to_string()),
            task_sid: Some("WT9".to_string()),
            task_attributes: Some(r#"{"callSid":"CA1"}"#.to_string()),
            ..Default::default()
        };
        assert_eq!(h.router.on_taskrouter_event(&event).await?, "task_created");

        let chat = TaskRouterEvent {
            task_attributes: Some(r#"{"conversationSid":"CH1"}"#.to_string()),
            ..event
        };
        assert_eq!(h.router.on_taskrouter_event(&chat).await?, "ignored");
        assert_eq!(h.events.log().len().await, 1);
        Ok(())
    }

    #[test]
    fn test_assignment_instruction_by_channel() -> DeskResult<()> {
        let h = harness();
        let voice = AssignmentCallback {
            task_sid: Some("WT1".to_string()),
            task_attributes: Some(r#"{"callSid":"CA1"}"#.to_string()),
            ..Default::default()
        };
        assert_eq!(
            h.router.assignment_instruction(&voice)?,
            AssignmentInstruction::Conference {
                from: Some("+15550009999".to_string()),
                post_work_activity_sid: Some("WA_WRAP".to_string()),
                end_conference_on_exit: false,
            }
        );

        let chat = AssignmentCallback {
            task_attributes: Some(r#"{"conversationSid":"CH1"}"#.to_string()),
            ..voice
        };
        assert_eq!(h.router.assignment_instruction(&chat)?, AssignmentInstruction::Accept);

        let broken = AssignmentCallback {
            task_attributes: Some("not json".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            h.router.assignment_instruction(&broken),
            Err(DeskError::Validation { .. })
        ));
        Ok(())
    }
}

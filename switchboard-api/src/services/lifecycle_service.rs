//! Task Lifecycle Service
//!
//! Drives assignment-status transitions the agent is allowed to make
//! (`assigned → wrapping → completed`), attaches disposition metadata, and
//! opens or closes chat tasks in response to conversation webhooks.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use switchboard_core::{
    distinct_task_sids, AssignmentStatus, Channel, ChatTaskAttributes, DeskResult, MessageAuthor,
    Task, TaskAttributes, WrapPlan, DEFAULT_LIST_STATUSES,
};
use switchboard_events::{DomainEvent, EventHub};
use switchboard_platform::{ClaimOutcome, NewTask, PlatformGateway, TaskUpdate};
use switchboard_storage::HoldTimerStore;

use super::integration_service::{IntegrationClient, InteractionRecord, UsageRecord};
use crate::telemetry::METRICS;
use crate::types::{CompleteTaskRequest, MyTask};

/// Reason recorded on a task closed together with its conversation.
pub const CONVERSATION_CLOSED_REASON: &str = "Conversation closed";

/// Reason recorded on a chat task that lost the conversation claim.
pub const DUPLICATE_TASK_REASON: &str = "Duplicate conversation task";

/// Reason recorded on a chat task whose conversation claim errored.
pub const UNCLAIMED_TASK_REASON: &str = "Conversation claim failed";

/// What an inbound chat message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessageOutcome {
    /// System or agent author; nothing to open.
    Ignored { author: MessageAuthor },
    /// The conversation already has a task.
    Existing { task_sid: String },
    /// A new task now owns the conversation.
    Created { task_sid: String },
    /// Another delivery claimed the conversation first; ours was canceled.
    Duplicate { task_sid: String, winner: String },
}

impl ChatMessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMessageOutcome::Ignored { .. } => "ignored",
            ChatMessageOutcome::Existing { .. } => "existing",
            ChatMessageOutcome::Created { .. } => "created",
            ChatMessageOutcome::Duplicate { .. } => "duplicate",
        }
    }
}

/// What closing a conversation did to its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationCloseOutcome {
    NoTask,
    Canceled { task_sid: String },
    Completed { task_sid: String },
    AlreadyFinal { task_sid: String },
}

impl ConversationCloseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationCloseOutcome::NoTask => "no_task",
            ConversationCloseOutcome::Canceled { .. } => "canceled",
            ConversationCloseOutcome::Completed { .. } => "completed",
            ConversationCloseOutcome::AlreadyFinal { .. } => "already_final",
        }
    }

    pub fn task_sid(&self) -> Option<&str> {
        match self {
            ConversationCloseOutcome::NoTask => None,
            ConversationCloseOutcome::Canceled { task_sid }
            | ConversationCloseOutcome::Completed { task_sid }
            | ConversationCloseOutcome::AlreadyFinal { task_sid } => Some(task_sid),
        }
    }
}

/// Parse the `statuses` filter. Unknown names are dropped, so a filter made
/// only of unknown names matches nothing.
pub fn parse_status_filter(statuses: Option<&str>) -> Vec<AssignmentStatus> {
    match statuses.map(str::trim).filter(|s| !s.is_empty()) {
        None => DEFAULT_LIST_STATUSES.to_vec(),
        Some(csv) => csv
            .split(',')
            .filter_map(|name| AssignmentStatus::parse(name).ok())
            .collect(),
    }
}

fn record_transition(from: AssignmentStatus, to: AssignmentStatus) {
    if let Ok(m) = METRICS.as_ref() {
        m.record_task_transition(from.as_str(), to.as_str());
    }
}

#[derive(Clone)]
pub struct TaskLifecycle {
    platform: Arc<dyn PlatformGateway>,
    events: EventHub,
    holds: Arc<dyn HoldTimerStore>,
    integrations: IntegrationClient,
    chat_workflow_sid: Option<String>,
}

impl TaskLifecycle {
    pub fn new(
        platform: Arc<dyn PlatformGateway>,
        events: EventHub,
        holds: Arc<dyn HoldTimerStore>,
        integrations: IntegrationClient,
        chat_workflow_sid: Option<String>,
    ) -> Self {
        Self {
            platform,
            events,
            holds,
            integrations,
            chat_workflow_sid,
        }
    }

    // ========================================================================
    // AGENT COMMANDS
    // ========================================================================

    /// Move an `assigned` task to `wrapping`, merging disposition metadata.
    ///
    /// A task already `wrapping` only gets the merge, so repeating the call
    /// is harmless.
    ///
    /// # Errors
    /// `InvalidState` for any other status.
    pub async fn wrap_force(
        &self,
        task_sid: &str,
        reason: Option<&str>,
        disposition: Option<&str>,
    ) -> DeskResult<Task> {
        let task = self.platform.fetch_task(task_sid).await?;
        let plan = task.plan_wrap()?;

        let mut attributes = task.attributes.clone();
        attributes.merge_wrapup(disposition, reason);

        let update = match plan {
            WrapPlan::Transition => {
                TaskUpdate::status(AssignmentStatus::Wrapping).with_attributes(attributes)
            }
            WrapPlan::MergeOnly => TaskUpdate::default().with_attributes(attributes),
        };
        let updated = self.platform.update_task(task_sid, update).await?;

        if plan == WrapPlan::Transition {
            record_transition(task.assignment_status, AssignmentStatus::Wrapping);
            tracing::info!(task_sid, "Task wrapping");
            self.events
                .publish(DomainEvent::TaskWrapping {
                    task_sid: task_sid.to_string(),
                    disposition: disposition.map(str::to_string),
                })
                .await;
        } else {
            tracing::debug!(task_sid, "Task already wrapping, merged wrap-up attributes");
        }

        Ok(updated)
    }

    /// Complete a `wrapping` task; with `auto_wrap` an `assigned` task is
    /// wrapped first.
    ///
    /// Analytics and CRM logging run in the background and never affect
    /// the result.
    ///
    /// # Errors
    /// `InvalidState` when the task is not `wrapping` at update time.
    pub async fn complete(
        &self,
        task_sid: &str,
        req: &CompleteTaskRequest,
        worker_sid: Option<&str>,
    ) -> DeskResult<Task> {
        let mut task = self.platform.fetch_task(task_sid).await?;

        if req.auto_wrap && task.assignment_status == AssignmentStatus::Assigned {
            tracing::debug!(task_sid, "Auto-wrapping before completion");
            task = self
                .wrap_force(task_sid, req.reason.as_deref(), req.disposition.as_deref())
                .await?;
        }
        task.ensure_completable()?;

        let mut attributes = task.attributes.clone();
        attributes.merge_wrapup(req.disposition.as_deref(), req.reason.as_deref());
        let completed = self
            .platform
            .update_task(
                task_sid,
                TaskUpdate::status(AssignmentStatus::Completed)
                    .with_reason(req.reason.clone())
                    .with_attributes(attributes),
            )
            .await?;

        record_transition(task.assignment_status, AssignmentStatus::Completed);
        let cleared = self.holds.clear_task(task_sid).await;
        if cleared > 0 {
            tracing::debug!(task_sid, cleared, "Discarded open hold sessions");
        }

        tracing::info!(task_sid, reason = ?req.reason, "Task completed");
        self.events
            .publish(DomainEvent::TaskCompleted {
                task_sid: task_sid.to_string(),
                reason: req.reason.clone(),
                disposition: completed.attributes.disposition().map(str::to_string),
            })
            .await;

        self.forward_completion(&completed, worker_sid);
        Ok(completed)
    }

    fn forward_completion(&self, task: &Task, worker_sid: Option<&str>) {
        let integrations = self.integrations.clone();
        let usage = UsageRecord::for_task(task, worker_sid);
        let interaction = task.attributes.customer_id().map(|customer_id| {
            (
                customer_id.to_string(),
                InteractionRecord {
                    task_sid: task.sid.clone(),
                    channel: task.attributes.channel(),
                    disposition: task.attributes.disposition().map(str::to_string),
                    worker_sid: worker_sid.map(str::to_string),
                    occurred_at: Utc::now(),
                },
            )
        });

        tokio::spawn(async move {
            integrations.record_usage(&usage).await;
            if let Some((customer_id, record)) = interaction {
                integrations.log_interaction(&customer_id, &record).await;
            }
        });
    }

    /// Tasks the worker holds reservations for, filtered by status.
    ///
    /// A task that cannot be fetched is dropped, since a reservation may
    /// point at a task the platform has not made readable yet. A task with
    /// no readable reservations is kept with an empty list.
    pub async fn list_mine(&self, worker_sid: &str, statuses: Option<&str>) -> DeskResult<Vec<MyTask>> {
        let wanted = parse_status_filter(statuses);
        let reservations = self.platform.list_worker_reservations(worker_sid).await?;
        let task_sids = distinct_task_sids(&reservations);

        let fetched = join_all(task_sids.iter().map(|sid| self.platform.fetch_task(sid))).await;
        let tasks: Vec<Task> = task_sids
            .iter()
            .zip(fetched)
            .filter_map(|(sid, result)| match result {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::warn!(task_sid = %sid, error = %e, "Dropping task that could not be fetched");
                    None
                }
            })
            .filter(|task| wanted.contains(&task.assignment_status))
            .collect();

        let histories = join_all(
            tasks
                .iter()
                .map(|task| self.platform.list_task_reservations(&task.sid)),
        )
        .await;

        Ok(tasks
            .into_iter()
            .zip(histories)
            .map(|(task, history)| {
                let reservations = history.unwrap_or_else(|e| {
                    tracing::warn!(task_sid = %task.sid, error = %e, "Reservation history unavailable");
                    Vec::new()
                });
                MyTask { task, reservations }
            })
            .collect())
    }

    // ========================================================================
    // CONVERSATION EVENTS
    // ========================================================================

    /// Open a chat task on the first customer message of a conversation.
    pub async fn on_chat_message(
        &self,
        conversation_sid: &str,
        author: &str,
        participant_role: Option<&str>,
    ) -> DeskResult<ChatMessageOutcome> {
        let author = MessageAuthor::classify(author, participant_role);
        if !author.opens_task() {
            tracing::debug!(conversation_sid, ?author, "Message does not open a task");
            return Ok(ChatMessageOutcome::Ignored { author });
        }

        let conversation = self.platform.fetch_conversation(conversation_sid).await?;
        if let Some(task_sid) = conversation.linked_task_sid() {
            return Ok(ChatMessageOutcome::Existing {
                task_sid: task_sid.to_string(),
            });
        }

        let task = self
            .platform
            .create_task(NewTask {
                workflow_sid: self.chat_workflow_sid.clone(),
                task_channel: Some(Channel::Chat.as_str().to_string()),
                attributes: TaskAttributes::Chat(ChatTaskAttributes::for_conversation(
                    conversation_sid,
                )),
            })
            .await?;

        match self
            .platform
            .claim_conversation_task(conversation_sid, &task.sid)
            .await
        {
            Ok(claim) => self.settle_claim(conversation_sid, task, claim).await,
            Err(e) => {
                // The redelivery opens a fresh task, so this one must not linger.
                tracing::warn!(conversation_sid, task_sid = %task.sid, error = %e, "Conversation claim failed, canceling new task");
                self.cancel_chat_task(&task, UNCLAIMED_TASK_REASON).await;
                Err(e)
            }
        }
    }

    /// Best-effort cancel of a chat task this service just created.
    async fn cancel_chat_task(&self, task: &Task, reason: &str) {
        let cancel = TaskUpdate::status(AssignmentStatus::Canceled).with_reason(Some(reason.to_string()));
        match self.platform.update_task(&task.sid, cancel).await {
            Ok(_) => {
                record_transition(task.assignment_status, AssignmentStatus::Canceled);
                self.events
                    .publish(DomainEvent::TaskCanceled {
                        task_sid: task.sid.clone(),
                        reason: reason.to_string(),
                    })
                    .await;
            }
            Err(e) => {
                tracing::warn!(task_sid = %task.sid, error = %e, "Chat task could not be canceled");
            }
        }
    }

    async fn settle_claim(
        &self,
        conversation_sid: &str,
        task: Task,
        claim: ClaimOutcome,
    ) -> DeskResult<ChatMessageOutcome> {
        match claim {
            ClaimOutcome::Claimed => {
                tracing::info!(conversation_sid, task_sid = %task.sid, "Chat task created");
                self.events
                    .publish(DomainEvent::TaskCreated {
                        task_sid: task.sid.clone(),
                        channel: Channel::Chat,
                        conversation_sid: Some(conversation_sid.to_string()),
                    })
                    .await;
                Ok(ChatMessageOutcome::Created { task_sid: task.sid })
            }
            ClaimOutcome::AlreadyClaimed { task_sid: winner } => {
                tracing::warn!(
                    conversation_sid,
                    task_sid = %task.sid,
                    winner = %winner,
                    "Conversation claimed by another task, canceling duplicate"
                );
                self.cancel_chat_task(&task, DUPLICATE_TASK_REASON).await;
                Ok(ChatMessageOutcome::Duplicate {
                    task_sid: task.sid,
                    winner,
                })
            }
        }
    }

    /// Bring the conversation's task to an end.
    ///
    /// Unassigned tasks are canceled, assigned or wrapping tasks are
    /// completed, finished tasks are left alone.
    pub async fn on_conversation_closed(
        &self,
        conversation_sid: &str,
    ) -> DeskResult<ConversationCloseOutcome> {
        let conversation = self.platform.fetch_conversation(conversation_sid).await?;
        let task_sid = conversation.linked_task_sid().map(str::to_string);

        let outcome = match task_sid.as_deref() {
            None => ConversationCloseOutcome::NoTask,
            Some(task_sid) => self.close_task(task_sid).await?,
        };

        tracing::info!(conversation_sid, outcome = outcome.as_str(), "Conversation closed");
        self.events
            .publish(DomainEvent::ConversationClosed {
                conversation_sid: conversation_sid.to_string(),
                task_sid,
            })
            .await;
        Ok(outcome)
    }

    async fn close_task(&self, task_sid: &str) -> DeskResult<ConversationCloseOutcome> {
        let task = self.platform.fetch_task(task_sid).await?;
        let status = task.assignment_status;

        if status.is_terminal() {
            return Ok(ConversationCloseOutcome::AlreadyFinal {
                task_sid: task_sid.to_string(),
            });
        }

        if status.is_unassigned() {
            self.platform
                .update_task(
                    task_sid,
                    TaskUpdate::status(AssignmentStatus::Canceled)
                        .with_reason(Some(CONVERSATION_CLOSED_REASON.to_string())),
                )
                .await?;
            record_transition(status, AssignmentStatus::Canceled);
            self.holds.clear_task(task_sid).await;
            self.events
                .publish(DomainEvent::TaskCanceled {
                    task_sid: task_sid.to_string(),
                    reason: CONVERSATION_CLOSED_REASON.to_string(),
                })
                .await;
            return Ok(ConversationCloseOutcome::Canceled {
                task_sid: task_sid.to_string(),
            });
        }

        let req = CompleteTaskRequest {
            reason: Some(CONVERSATION_CLOSED_REASON.to_string()),
            disposition: None,
            auto_wrap: true,
        };
        self.complete(task_sid, &req, None).await?;
        Ok(ConversationCloseOutcome::Completed {
            task_sid: task_sid.to_string(),
        })
    }

    /// Agent-initiated close: close on the platform, then settle the task.
    pub async fn close_conversation(
        &self,
        conversation_sid: &str,
    ) -> DeskResult<ConversationCloseOutcome> {
        self.platform.close_conversation(conversation_sid).await?;
        self.on_conversation_closed(conversation_sid).await
    }
}

// =============================================================================
// TESTS
// =============================================================================

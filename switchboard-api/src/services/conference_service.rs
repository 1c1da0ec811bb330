//! Conference Service
//!
//! Finds or prepares the conference and participant resources a call
//! control operation needs. The platform creates these asynchronously
//! after the command that requests them, so "not found yet" is treated as
//! transient up to the configured poll budget.

use std::sync::Arc;

use switchboard_core::{
    task_conference_name, transfer_conference_name, Call, CallStatus, Conference,
    ConferenceLinkage, ConferenceStatus, DeskError, DeskResult, Participant, ParticipantStatus,
};
use switchboard_platform::{ConferenceDial, PlatformGateway, VoiceResponse};

use super::poll_service::{poll_until, Attempt, PollOutcome};
use crate::config::ReconcileConfig;

/// A conference that is in progress, plus whatever linkage the task carried.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConference {
    pub conference: Conference,
    pub linkage: Option<ConferenceLinkage>,
}

impl ResolvedConference {
    pub fn sid(&self) -> &str {
        &self.conference.sid
    }
}

/// Waits on conferences, participants and call legs.
#[derive(Clone)]
pub struct ConferenceReconciler {
    platform: Arc<dyn PlatformGateway>,
    config: ReconcileConfig,
    hold_music_url: Option<String>,
}

impl ConferenceReconciler {
    pub fn new(platform: Arc<dyn PlatformGateway>, config: ReconcileConfig) -> Self {
        Self {
            platform,
            config,
            hold_music_url: None,
        }
    }

    /// Wait URL played to legs parked in an ad hoc conference.
    pub fn with_hold_music(mut self, url: Option<String>) -> Self {
        self.hold_music_url = url;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Resolve the conference serving a task.
    ///
    /// Uses `attributes.conference.sid` when the task carries it, otherwise
    /// looks the conference up by the task SID as friendly name. Both paths
    /// wait for `in-progress`.
    ///
    /// # Errors
    /// `ConferenceNotReady` when the budget runs out; platform errors from
    /// the task fetch propagate unchanged.
    pub async fn resolve_for_task(&self, task_sid: &str) -> DeskResult<ResolvedConference> {
        let task = self.platform.fetch_task(task_sid).await?;
        let linkage = task.attributes.conference().cloned();

        let conference = match linkage.as_ref().and_then(|l| l.sid.as_deref()) {
            Some(sid) => self.wait_for_conference_sid(sid).await?,
            None => {
                tracing::debug!(task_sid, "No conference linkage, looking up by friendly name");
                self.wait_for_conference_named(task_sid).await?
            }
        };

        Ok(ResolvedConference {
            conference,
            linkage,
        })
    }

    /// Bring both legs into `xfer-{customerCallSid}` and wait for it.
    ///
    /// An in-progress conference with that name is reused as is, so a second
    /// hold on the same pair does not redirect the legs again.
    pub async fn resolve_for_adhoc(
        &self,
        customer_call_sid: &str,
        agent_call_sid: &str,
    ) -> DeskResult<ResolvedConference> {
        let name = transfer_conference_name(customer_call_sid);

        let existing = self
            .platform
            .list_conferences(&name, Some(ConferenceStatus::InProgress))
            .await?;
        if let Some(conference) = existing.into_iter().next() {
            return Ok(ResolvedConference {
                conference,
                linkage: None,
            });
        }

        self.redirect_into(customer_call_sid, &name, true).await?;
        self.redirect_into(agent_call_sid, &name, false).await?;

        let conference = self.wait_for_conference_named(&name).await?;
        Ok(ResolvedConference {
            conference,
            linkage: None,
        })
    }

    /// Resolve by task when one is given, ad hoc otherwise.
    pub async fn resolve(
        &self,
        task_sid: Option<&str>,
        customer_call_sid: &str,
        agent_call_sid: &str,
    ) -> DeskResult<ResolvedConference> {
        match task_sid.filter(|sid| !sid.is_empty()) {
            Some(task_sid) => self.resolve_for_task(task_sid).await,
            None => self.resolve_for_adhoc(customer_call_sid, agent_call_sid).await,
        }
    }

    async fn redirect_into(&self, call_sid: &str, name: &str, end_on_exit: bool) -> DeskResult<()> {
        let twiml = VoiceResponse::dial_conference(
            ConferenceDial::new(name)
                .end_conference_on_exit(end_on_exit)
                .wait_url(self.hold_music_url.clone()),
        )
        .to_xml();
        self.platform.redirect_call(call_sid, &twiml).await
    }

    /// Poll the conference list by friendly name until one is in progress.
    pub async fn wait_for_conference_named(&self, name: &str) -> DeskResult<Conference> {
        let outcome = poll_until(&self.config.conference, "conference", |_| async move {
            let found = self
                .platform
                .list_conferences(name, Some(ConferenceStatus::InProgress))
                .await?;
            Ok(match found.into_iter().next() {
                Some(conference) => Attempt::Done(conference),
                None => Attempt::Retry(None::<()>),
            })
        })
        .await?;

        match outcome {
            PollOutcome::Ready(conference) => Ok(conference),
            PollOutcome::Exhausted { attempts, .. } => Err(DeskError::ConferenceNotReady {
                conference: name.to_string(),
                attempts,
            }),
        }
    }

    /// Poll a known conference SID until it is in progress.
    pub async fn wait_for_conference_sid(&self, sid: &str) -> DeskResult<Conference> {
        let outcome = poll_until(&self.config.conference, "conference", |attempt| async move {
            match self.platform.fetch_conference(sid).await {
                Ok(conference) => match conference.status {
                    ConferenceStatus::InProgress => Ok(Attempt::Done(conference)),
                    ConferenceStatus::Starting => Ok(Attempt::Retry(Some(conference.status))),
                    ConferenceStatus::Completed => Err(DeskError::ConferenceNotReady {
                        conference: sid.to_string(),
                        attempts: attempt + 1,
                    }),
                },
                Err(e) if e.is_not_found() => Ok(Attempt::Retry(None)),
                Err(e) => Err(e),
            }
        })
        .await?;

        match outcome {
            PollOutcome::Ready(conference) => Ok(conference),
            PollOutcome::Exhausted { attempts, .. } => Err(DeskError::ConferenceNotReady {
                conference: sid.to_string(),
                attempts,
            }),
        }
    }

    /// Wait for `call_sid` to appear in the conference and then to connect.
    ///
    /// # Errors
    /// `ParticipantNotFound` if it never shows up in the list;
    /// `ParticipantNotConnected` if it shows up but does not connect, or
    /// drops out while waiting.
    pub async fn wait_for_participant(
        &self,
        conference_sid: &str,
        call_sid: &str,
    ) -> DeskResult<Participant> {
        let listed = poll_until(&self.config.participant, "participant", |_| async move {
            match self.platform.list_participants(conference_sid).await {
                Ok(participants) => Ok(
                    match participants.into_iter().find(|p| p.call_sid == call_sid) {
                        Some(participant) => Attempt::Done(participant),
                        None => Attempt::Retry(None::<()>),
                    },
                ),
                Err(e) if e.is_not_found() => Ok(Attempt::Retry(None)),
                Err(e) => Err(e),
            }
        })
        .await?;

        let participant = match listed {
            PollOutcome::Ready(participant) => participant,
            PollOutcome::Exhausted { .. } => {
                return Err(DeskError::ParticipantNotFound {
                    conference_sid: conference_sid.to_string(),
                    call_sid: call_sid.to_string(),
                })
            }
        };
        if participant.status == ParticipantStatus::Connected {
            return Ok(participant);
        }

        let connected = poll_until(&self.config.participant, "participant", |_| async move {
            match self.platform.fetch_participant(conference_sid, call_sid).await {
                Ok(p) => match p.status {
                    ParticipantStatus::Connected => Ok(Attempt::Done(p)),
                    ParticipantStatus::Disconnected => Err(DeskError::ParticipantNotConnected {
                        conference_sid: conference_sid.to_string(),
                        call_sid: call_sid.to_string(),
                        status: p.status,
                    }),
                    status => Ok(Attempt::Retry(Some(status))),
                },
                Err(e) if e.is_not_found() => Ok(Attempt::Retry(None)),
                Err(e) => Err(e),
            }
        })
        .await?;

        match connected {
            PollOutcome::Ready(participant) => Ok(participant),
            PollOutcome::Exhausted { last, .. } => Err(DeskError::ParticipantNotConnected {
                conference_sid: conference_sid.to_string(),
                call_sid: call_sid.to_string(),
                status: last.unwrap_or(participant.status),
            }),
        }
    }

    /// Wait for a call leg to be `in-progress` so it can be redirected.
    ///
    /// # Errors
    /// `NotRedirectable` as soon as the leg is seen in a terminal status;
    /// `NotInProgress` with the last seen status when the budget runs out.
    pub async fn wait_for_call_in_progress(&self, call_sid: &str) -> DeskResult<Call> {
        let outcome = poll_until(&self.config.call, "call", |_| async move {
            let call = self.platform.fetch_call(call_sid).await?;
            if call.status == CallStatus::InProgress {
                Ok(Attempt::Done(call))
            } else if call.status.is_terminal() {
                Err(DeskError::NotRedirectable {
                    call_sid: call_sid.to_string(),
                    status: call.status,
                })
            } else {
                Ok(Attempt::Retry(Some(call.status)))
            }
        })
        .await?;

        match outcome {
            PollOutcome::Ready(call) => Ok(call),
            PollOutcome::Exhausted { last, .. } => Err(DeskError::NotInProgress {
                call_sid: call_sid.to_string(),
                status: last.unwrap_or(CallStatus::Queued),
            }),
        }
    }
}

/// Friendly name of the conference a warm transfer builds.
pub fn warm_conference_name(task_sid: Option<&str>, customer_call_sid: &str) -> String {
    match task_sid.filter(|sid| !sid.is_empty()) {
        Some(task_sid) => task_conference_name(task_sid),
        None => transfer_conference_name(customer_call_sid),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use switchboard_core::{AssignmentStatus, PollPolicy, Task, TaskAttributes};
    use switchboard_platform::InMemoryPlatform;

    fn quick() -> ReconcileConfig {
        ReconcileConfig::uniform(PollPolicy::fixed(4, Duration::from_millis(1)))
    }

    fn reconciler(platform: &Arc<InMemoryPlatform>) -> ConferenceReconciler {
        ConferenceReconciler::new(platform.clone(), quick())
    }

    fn conference(sid: &str, name: &str, status: ConferenceStatus) -> Conference {
        Conference {
            sid: sid.to_string(),
            friendly_name: name.to_string(),
            status,
            date_created: Some(chrono::Utc::now()),
        }
    }

    fn voice_task(sid: &str, attributes: serde_json::Value) -> DeskResult<Task> {
        let attributes =
            TaskAttributes::try_from(attributes).map_err(|e| DeskError::internal(e.to_string()))?;
        Ok(Task::new(sid, AssignmentStatus::Assigned).with_attributes(attributes))
    }

    #[tokio::test]
    async fn test_task_linkage_uses_conference_sid() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_conference(conference("CF1", "anything", ConferenceStatus::InProgress))
            .await;
        platform
            .add_task(voice_task(
                "WT1",
                json!({"callSid": "CA1", "conference": {"sid": "CF1", "participants": {"customer": "CA1"}}}),
            )?)
            .await;

        let resolved = reconciler(&platform).resolve_for_task("WT1").await?;
        assert_eq!(resolved.sid(), "CF1");
        assert_eq!(
            resolved
                .linkage
                .as_ref()
                .and_then(|l| l.participant(switchboard_core::LegRole::Customer)),
            Some("CA1")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_linkage_falls_back_to_task_sid_name() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_conference(conference("CF2", "WT2", ConferenceStatus::InProgress))
            .await;
        platform
            .add_task(voice_task("WT2", json!({"callSid": "CA2"}))?)
            .await;

        let resolved = reconciler(&platform).resolve_for_task("WT2").await?;
        assert_eq!(resolved.sid(), "CF2");
        assert!(resolved.linkage.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_no_conference_exhausts_budget() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_task(voice_task("WT3", json!({"callSid": "CA3"}))?)
            .await;

        let err = reconciler(&platform)
            .resolve_for_task("WT3")
            .await
            .err()
            .ok_or_else(|| DeskError::internal("expected failure"))?;
        assert_eq!(
            err,
            DeskError::ConferenceNotReady {
                conference: "WT3".to_string(),
                attempts: 4
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_adhoc_redirects_both_legs_once() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_call(Call::new("CA_CUST", CallStatus::InProgress))
            .await;
        platform
            .add_call(Call::new("CA_AGENT", CallStatus::InProgress))
            .await;
        platform.delay_conference("xfer-CA_CUST", 2).await;

        let reconciler = reconciler(&platform);
        let first = reconciler.resolve_for_adhoc("CA_CUST", "CA_AGENT").await?;
        assert_eq!(first.conference.friendly_name, "xfer-CA_CUST");
        assert_eq!(platform.redirects().await.len(), 2);

        let second = reconciler.resolve_for_adhoc("CA_CUST", "CA_AGENT").await?;
        assert_eq!(second.sid(), first.sid());
        assert_eq!(platform.redirects().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_participant_waits_for_connection() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_call(Call::new("CA_CUST", CallStatus::InProgress))
            .await;
        platform
            .add_call(Call::new("CA_AGENT", CallStatus::InProgress))
            .await;
        platform.delay_participant("CA_CUST", 2).await;

        let reconciler = reconciler(&platform);
        let resolved = reconciler.resolve_for_adhoc("CA_CUST", "CA_AGENT").await?;
        let participant = reconciler
            .wait_for_participant(resolved.sid(), "CA_CUST")
            .await?;
        assert_eq!(participant.status, ParticipantStatus::Connected);
        Ok(())
    }

    #[tokio::test]
    async fn test_absent_participant_is_not_found() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_conference(conference("CF5", "WT5", ConferenceStatus::InProgress))
            .await;

        let err = reconciler(&platform)
            .wait_for_participant("CF5", "CA_MISSING")
            .await
            .err()
            .ok_or_else(|| DeskError::internal("expected failure"))?;
        assert!(matches!(err, DeskError::ParticipantNotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_terminal_call_fails_fast() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_call(Call::new("CA_DONE", CallStatus::Completed))
            .await;

        let err = reconciler(&platform)
            .wait_for_call_in_progress("CA_DONE")
            .await
            .err()
            .ok_or_else(|| DeskError::internal("expected failure"))?;
        assert_eq!(
            err,
            DeskError::NotRedirectable {
                call_sid: "CA_DONE".to_string(),
                status: CallStatus::Completed
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_ringing_call_reports_last_status() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_call(Call::new("CA_RING", CallStatus::Ringing))
            .await;

        let err = reconciler(&platform)
            .wait_for_call_in_progress("CA_RING")
            .await
            .err()
            .ok_or_else(|| DeskError::internal("expected failure"))?;
        assert_eq!(
            err,
            DeskError::NotInProgress {
                call_sid: "CA_RING".to_string(),
                status: CallStatus::Ringing
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_scripted_call_becomes_ready() -> DeskResult<()> {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_call(Call::new("CA_SLOW", CallStatus::Ringing))
            .await;
        platform
            .script_call("CA_SLOW", 2, CallStatus::InProgress)
            .await;

        let call = reconciler(&platform)
            .wait_for_call_in_progress("CA_SLOW")
            .await?;
        assert_eq!(call.status, CallStatus::InProgress);
        Ok(())
    }

    #[test]
    fn test_warm_conference_name() {
        assert_eq!(warm_conference_name(Some("WT9"), "CA1"), "task-WT9");
        assert_eq!(warm_conference_name(Some(""), "CA1"), "xfer-CA1");
        assert_eq!(warm_conference_name(None, "CA1"), "xfer-CA1");
    }
}

//! Hold Service
//!
//! Puts one participant of a customer contact on hold or takes it off,
//! after the conference and the participant have been reconciled. Hold
//! start times live in the injected [`HoldTimerStore`] so the stop can
//! report a duration.

use std::sync::Arc;

use chrono::Utc;
use switchboard_core::{DeskError, DeskResult};
use switchboard_events::{DomainEvent, EventHub};
use switchboard_platform::PlatformGateway;
use switchboard_storage::HoldTimerStore;

use super::conference_service::{ConferenceReconciler, ResolvedConference};
use crate::telemetry::METRICS;
use crate::types::{HoldRequest, HoldResponse};

/// Sessions older than this are treated as stops that never arrived.
const ABANDONED_HOLD_HOURS: i64 = 12;

/// A participant ready for a hold toggle.
#[derive(Debug, Clone, PartialEq)]
struct HoldTarget {
    conference: ResolvedConference,
    call_sid: String,
}

/// Hold on and hold off for conference participants.
#[derive(Clone)]
pub struct HoldService {
    platform: Arc<dyn PlatformGateway>,
    reconciler: ConferenceReconciler,
    holds: Arc<dyn HoldTimerStore>,
    events: EventHub,
    hold_music_url: Option<String>,
}

impl HoldService {
    pub fn new(
        platform: Arc<dyn PlatformGateway>,
        reconciler: ConferenceReconciler,
        holds: Arc<dyn HoldTimerStore>,
        events: EventHub,
        hold_music_url: Option<String>,
    ) -> Self {
        Self {
            platform,
            reconciler,
            holds,
            events,
            hold_music_url,
        }
    }

    /// Resolve the conference and the leg `who` names, then wait for it.
    async fn locate(&self, req: &HoldRequest) -> DeskResult<HoldTarget> {
        let task_sid = req.task_sid.as_deref().filter(|s| !s.trim().is_empty());

        let conference = match task_sid {
            Some(task_sid) => self.reconciler.resolve_for_task(task_sid).await?,
            None => {
                let customer = req
                    .customer_call_sid
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| DeskError::validation("customerCallSid", "is required without taskSid"))?;
                let agent = req
                    .agent_call_sid
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| DeskError::validation("agentCallSid", "is required without taskSid"))?;
                self.reconciler.resolve_for_adhoc(customer, agent).await?
            }
        };

        let call_sid = req
            .requested_call_sid()
            .or_else(|| {
                conference
                    .linkage
                    .as_ref()
                    .and_then(|linkage| linkage.participant(req.who))
            })
            .map(str::to_string)
            .ok_or_else(|| {
                DeskError::validation(
                    format!("{}CallSid", req.who.as_str()),
                    "no call SID given and none recorded on the task",
                )
            })?;

        self.reconciler
            .wait_for_participant(conference.sid(), &call_sid)
            .await?;

        Ok(HoldTarget {
            conference,
            call_sid,
        })
    }

    /// Put the selected leg on hold with hold music and start its timer.
    ///
    /// # Errors
    /// Reconciliation errors when the conference or participant never
    /// becomes ready; `Validation` when the leg cannot be identified.
    pub async fn start(&self, req: &HoldRequest) -> DeskResult<HoldResponse> {
        let target = self.locate(req).await?;
        let conf_sid = target.conference.sid().to_string();

        self.platform
            .update_participant_hold(
                &conf_sid,
                &target.call_sid,
                true,
                self.hold_music_url.as_deref(),
            )
            .await?;

        let task_sid = req.task_sid.as_deref().filter(|s| !s.is_empty());
        let now = Utc::now();
        let pruned = self
            .holds
            .prune_started_before(now - chrono::Duration::hours(ABANDONED_HOLD_HOURS))
            .await;
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped abandoned hold sessions");
        }
        self.holds.start(&target.call_sid, task_sid, now).await;

        tracing::info!(conf_sid = %conf_sid, call_sid = %target.call_sid, who = %req.who, "Hold started");
        self.events
            .publish(DomainEvent::HoldStarted {
                task_sid: task_sid.map(str::to_string),
                conference_sid: conf_sid.clone(),
                call_sid: target.call_sid.clone(),
                who: req.who,
            })
            .await;

        Ok(HoldResponse {
            ok: true,
            conf_sid,
            who: req.who,
            call_sid: target.call_sid,
            duration_ms: None,
        })
    }

    /// Take the selected leg off hold and report how long it was held.
    ///
    /// When no start time is on record (the process restarted in between)
    /// the duration is reported as unknown.
    pub async fn stop(&self, req: &HoldRequest) -> DeskResult<HoldResponse> {
        let target = self.locate(req).await?;
        let conf_sid = target.conference.sid().to_string();

        self.platform
            .update_participant_hold(&conf_sid, &target.call_sid, false, None)
            .await?;

        let task_sid = req.task_sid.as_deref().filter(|s| !s.is_empty());
        let duration_ms = match self.holds.take(&target.call_sid).await {
            Some(session) => {
                let elapsed = Utc::now().signed_duration_since(session.started_at);
                let ms = u64::try_from(elapsed.num_milliseconds()).unwrap_or(0);
                if let Ok(m) = METRICS.as_ref() {
                    m.observe_hold(ms as f64 / 1000.0);
                }
                Some(ms)
            }
            None => {
                tracing::warn!(call_sid = %target.call_sid, "Hold duration unknown, no start time on record");
                None
            }
        };

        tracing::info!(conf_sid = %conf_sid, call_sid = %target.call_sid, who = %req.who, duration_ms, "Hold stopped");
        self.events
            .publish(DomainEvent::HoldStopped {
                task_sid: task_sid.map(str::to_string),
                conference_sid: conf_sid.clone(),
                call_sid: target.call_sid.clone(),
                who: req.who,
                duration_ms,
            })
            .await;

        Ok(HoldResponse {
            ok: true,
            conf_sid,
            who: req.who,
            call_sid: target.call_sid,
            duration_ms,
        })
    }

    /// Hold sessions still open, for diagnostics.
    pub async fn open_sessions(&self) -> usize {
        self.holds.len().await
    }
}

// =============================================================================
// TESTS
// =============================================================================

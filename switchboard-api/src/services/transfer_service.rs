//! Transfer Service
//!
//! Cold transfers rewrite the customer leg to dial the target directly.
//! Warm transfers build a three-way conference around the customer, the
//! agent and a newly placed call to the target. The platform has no
//! cross-leg transaction, so a warm transfer that fails half way is not
//! rolled back; the error reports which legs were already moved.

use std::sync::Arc;

use serde_json::json;
use switchboard_core::{DeskError, DeskResult, TransferTarget};
use switchboard_events::{DomainEvent, EventHub};
use switchboard_platform::{ConferenceDial, CreateCall, PlatformGateway, VoiceResponse};
use thiserror::Error;

use super::conference_service::{warm_conference_name, ConferenceReconciler};
use crate::error::ApiError;
use crate::telemetry::METRICS;
use crate::types::{
    ColdTransferRequest, CompleteTransferRequest, CompleteTransferResponse, TransferResponse,
    WarmTransferRequest,
};

/// A transfer failure plus the legs that had already been redirected.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct TransferError {
    pub source: DeskError,
    /// `customer`, `agent`, `target`, in the order they were applied
    pub applied_legs: Vec<&'static str>,
}

impl TransferError {
    fn before_mutation(source: DeskError) -> Self {
        Self {
            source,
            applied_legs: Vec::new(),
        }
    }
}

impl From<DeskError> for TransferError {
    fn from(source: DeskError) -> Self {
        Self::before_mutation(source)
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        let mut api = ApiError::from(err.source);
        if !err.applied_legs.is_empty() {
            let mut details = match api.details.take() {
                Some(serde_json::Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            details.insert("appliedLegs".to_string(), json!(err.applied_legs));
            api.details = Some(serde_json::Value::Object(details));
        }
        api
    }
}

fn required(field: &str, value: &str) -> DeskResult<()> {
    if value.trim().is_empty() {
        Err(DeskError::validation(field, "is required"))
    } else {
        Ok(())
    }
}

/// Cold, warm and completion of call transfers.
#[derive(Clone)]
pub struct TransferService {
    platform: Arc<dyn PlatformGateway>,
    reconciler: ConferenceReconciler,
    events: EventHub,
    caller_id: Option<String>,
}

impl TransferService {
    pub fn new(
        platform: Arc<dyn PlatformGateway>,
        reconciler: ConferenceReconciler,
        events: EventHub,
        caller_id: Option<String>,
    ) -> Self {
        Self {
            platform,
            reconciler,
            events,
            caller_id,
        }
    }

    /// Redirect the customer leg straight to the target.
    ///
    /// The target is parsed and the customer leg validated before anything
    /// is changed on the platform. Hanging up the agent leg afterwards is
    /// best effort.
    ///
    /// # Errors
    /// `Validation` for a missing call SID or an unusable target,
    /// `NotRedirectable` / `NotInProgress` when the customer leg cannot take
    /// a redirect.
    pub async fn cold(&self, req: &ColdTransferRequest) -> Result<TransferResponse, TransferError> {
        let result = self.cold_inner(req).await;
        record_transfer("cold", result.is_ok());
        result
    }

    async fn cold_inner(&self, req: &ColdTransferRequest) -> Result<TransferResponse, TransferError> {
        required("customerCallSid", &req.customer_call_sid)?;
        let target = TransferTarget::parse(req.target_type, &req.target_identity)?;
        let customer = self
            .reconciler
            .wait_for_call_in_progress(&req.customer_call_sid)
            .await?;

        let response = match &target {
            TransferTarget::Client(_) => {
                VoiceResponse::dial_client(target.dial_client_name().unwrap_or(target.address()))
            }
            TransferTarget::Number(number) => VoiceResponse::dial_number(number.clone())
                .caller_id(self.caller_id.clone().or(customer.to.clone())),
        };
        self.platform
            .redirect_call(&req.customer_call_sid, &response.to_xml())
            .await?;

        if let Some(agent_call_sid) = req.agent_call_sid.as_deref().filter(|s| !s.is_empty()) {
            if let Err(e) = self.platform.hangup_call(agent_call_sid).await {
                tracing::warn!(
                    agent_call_sid,
                    error = %e,
                    "Agent leg hangup after cold transfer failed"
                );
            }
        }

        tracing::info!(
            customer_call_sid = %req.customer_call_sid,
            target = target.address(),
            "Cold transfer applied"
        );
        self.events
            .publish(DomainEvent::TransferStarted {
                mode: "cold".to_string(),
                customer_call_sid: req.customer_call_sid.clone(),
                target: target.address().to_string(),
                conference: None,
            })
            .await;

        Ok(TransferResponse {
            ok: true,
            mode: "cold".to_string(),
            conference: None,
            target_call_sid: None,
        })
    }

    /// Build a three-way conference with the target.
    ///
    /// The customer joins with `endConferenceOnExit=true`, the agent with
    /// `false`, and the target is called into the conference with a beep.
    ///
    /// # Errors
    /// Same validation as [`TransferService::cold`], checked for both legs
    /// before the first redirect. Failures after that carry the applied
    /// legs.
    pub async fn warm(&self, req: &WarmTransferRequest) -> Result<TransferResponse, TransferError> {
        let result = self.warm_inner(req).await;
        record_transfer("warm", result.is_ok());
        result
    }

    async fn warm_inner(&self, req: &WarmTransferRequest) -> Result<TransferResponse, TransferError> {
        required("customerCallSid", &req.customer_call_sid)?;
        required("agentCallSid", &req.agent_call_sid)?;
        let target = TransferTarget::parse(req.target_type, &req.target_identity)?;

        let customer = self
            .reconciler
            .wait_for_call_in_progress(&req.customer_call_sid)
            .await?;
        self.reconciler
            .wait_for_call_in_progress(&req.agent_call_sid)
            .await?;

        let from = self
            .caller_id
            .clone()
            .or(customer.to.clone())
            .ok_or_else(|| {
                DeskError::validation(
                    "callerId",
                    "no caller id configured and the customer leg has no number",
                )
            })?;

        let name = warm_conference_name(req.task_sid.as_deref(), &req.customer_call_sid);
        let mut applied: Vec<&'static str> = Vec::with_capacity(3);

        let legs = [
            ("customer", req.customer_call_sid.as_str(), true),
            ("agent", req.agent_call_sid.as_str(), false),
        ];
        for (leg, call_sid, end_on_exit) in legs {
            let twiml = VoiceResponse::dial_conference(
                ConferenceDial::new(&name).end_conference_on_exit(end_on_exit),
            )
            .to_xml();
            if let Err(source) = self.platform.redirect_call(call_sid, &twiml).await {
                return Err(partial_failure(source, applied, &name));
            }
            applied.push(leg);
        }

        let target_call = self
            .platform
            .create_call(CreateCall {
                to: target.address().to_string(),
                from,
                twiml: VoiceResponse::dial_conference(
                    ConferenceDial::new(&name)
                        .beep(true)
                        .end_conference_on_exit(false),
                )
                .to_xml(),
            })
            .await;
        let target_call = match target_call {
            Ok(call) => call,
            Err(source) => return Err(partial_failure(source, applied, &name)),
        };

        tracing::info!(
            conference = %name,
            target = target.address(),
            target_call_sid = %target_call.sid,
            "Warm transfer conference built"
        );
        self.events
            .publish(DomainEvent::TransferStarted {
                mode: "warm".to_string(),
                customer_call_sid: req.customer_call_sid.clone(),
                target: target.address().to_string(),
                conference: Some(name.clone()),
            })
            .await;

        Ok(TransferResponse {
            ok: true,
            mode: "warm".to_string(),
            conference: Some(name),
            target_call_sid: Some(target_call.sid),
        })
    }

    /// Hang up the agent leg once a warm handoff is done.
    ///
    /// A leg that is already gone (unknown or terminal) counts as success.
    pub async fn complete(
        &self,
        req: &CompleteTransferRequest,
    ) -> DeskResult<CompleteTransferResponse> {
        required("agentCallSid", &req.agent_call_sid)?;

        let already_ended = match self.platform.fetch_call(&req.agent_call_sid).await {
            Ok(call) if call.status.is_terminal() => true,
            Ok(_) => match self.platform.hangup_call(&req.agent_call_sid).await {
                Ok(()) => false,
                Err(e) if e.is_not_found() => true,
                Err(e) => return Err(e),
            },
            Err(e) if e.is_not_found() => true,
            Err(e) => return Err(e),
        };

        Ok(CompleteTransferResponse {
            ok: true,
            already_ended,
        })
    }
}

fn partial_failure(source: DeskError, applied: Vec<&'static str>, conference: &str) -> TransferError {
    if !applied.is_empty() {
        tracing::error!(
            conference,
            applied_legs = ?applied,
            error = %source,
            "Warm transfer failed after legs were redirected"
        );
    }
    TransferError {
        source,
        applied_legs: applied,
    }
}

fn record_transfer(mode: &str, success: bool) {
    if let Ok(m) = METRICS.as_ref() {
        m.record_transfer(mode, success);
    }
}

// =============================================================================
// TESTS
// =============================================================================

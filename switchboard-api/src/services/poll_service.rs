//! Poll Service
//!
//! Bounded retry loop used by every wait on an eventually-consistent
//! platform resource. The loop always ends: either the probe reports
//! success or the policy's attempt budget runs out.

use switchboard_core::{DeskResult, PollPolicy};

use crate::telemetry::METRICS;

/// What one probe of the resource observed.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T, S> {
    /// The resource reached the wanted state.
    Done(T),
    /// Not yet; carries the last observed state when there was one.
    Retry(Option<S>),
}

/// Final result of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T, S> {
    Ready(T),
    Exhausted { last: Option<S>, attempts: u32 },
}

/// Probe until `probe` returns [`Attempt::Done`] or the budget is spent.
///
/// Errors from the probe abort the loop immediately; "not there yet" must be
/// expressed as [`Attempt::Retry`]. At least one probe always runs.
///
/// # Arguments
/// - `policy`: Attempt count and delay schedule
/// - `resource`: Metric label for the resource being waited on
/// - `probe`: Called with the zero-based attempt number
pub async fn poll_until<T, S, F, Fut>(
    policy: &PollPolicy,
    resource: &'static str,
    mut probe: F,
) -> DeskResult<PollOutcome<T, S>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = DeskResult<Attempt<T, S>>>,
{
    let attempts = policy.attempts.max(1);
    let mut last = None;

    for attempt in 0..attempts {
        match probe(attempt).await {
            Ok(Attempt::Done(value)) => {
                record_poll(resource, "ready");
                return Ok(PollOutcome::Ready(value));
            }
            Ok(Attempt::Retry(observed)) => {
                if observed.is_some() {
                    last = observed;
                }
            }
            Err(e) => {
                record_poll(resource, "error");
                return Err(e);
            }
        }

        if attempt + 1 < attempts {
            tracing::trace!(resource, attempt, "Resource not ready, retrying");
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
    }

    record_poll(resource, "exhausted");
    tracing::warn!(resource, attempts, "Poll budget exhausted");
    Ok(PollOutcome::Exhausted { last, attempts })
}

fn record_poll(resource: &str, outcome: &str) {
    if let Ok(m) = METRICS.as_ref() {
        m.record_poll(resource, outcome);
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Switchboard Storage - Hold Session Store
//!
//! Hold sessions are application state the platform does not track: when a
//! leg went on hold, so the duration can be reported when it comes off.
//! Call sites depend on the [`HoldTimerStore`] trait; the in-memory
//! implementation loses its contents on restart, which only degrades the
//! reported duration to unknown.

use async_trait::async_trait;
use dashmap::DashMap;
use switchboard_core::Timestamp;
use tracing::debug;

/// One open hold. Sessions are keyed by the held call SID alone; the task
/// is kept alongside so task cleanup can find them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldSession {
    pub task_sid: Option<String>,
    pub started_at: Timestamp,
}

/// Hold start times keyed by the held call SID.
#[async_trait]
pub trait HoldTimerStore: Send + Sync {
    /// Record a hold start. A second start for the same call keeps the
    /// earlier timestamp, and adopts the task SID if the first lacked one.
    async fn start(&self, call_sid: &str, task_sid: Option<&str>, at: Timestamp);

    /// Remove and return the session for `call_sid`, if one was recorded.
    async fn take(&self, call_sid: &str) -> Option<HoldSession>;

    /// Discard every session belonging to `task_sid`. Returns how many went.
    async fn clear_task(&self, task_sid: &str) -> usize;

    /// Discard sessions started before `cutoff`, whose stop never arrived.
    async fn prune_started_before(&self, cutoff: Timestamp) -> usize;

    async fn len(&self) -> usize;
}

/// Process-memory [`HoldTimerStore`].
#[derive(Debug, Default)]
pub struct InMemoryHoldTimerStore {
    sessions: DashMap<String, HoldSession>,
}

impl InMemoryHoldTimerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HoldTimerStore for InMemoryHoldTimerStore {
    async fn start(&self, call_sid: &str, task_sid: Option<&str>, at: Timestamp) {
        debug!(call_sid = %call_sid, task_sid = ?task_sid, "Hold session started");
        let mut session = self
            .sessions
            .entry(call_sid.to_string())
            .or_insert_with(|| HoldSession {
                task_sid: None,
                started_at: at,
            });
        if session.task_sid.is_none() {
            session.task_sid = task_sid.map(str::to_string);
        }
    }

    async fn take(&self, call_sid: &str) -> Option<HoldSession> {
        self.sessions.remove(call_sid).map(|(_, session)| session)
    }

    async fn clear_task(&self, task_sid: &str) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.task_sid.as_deref() != Some(task_sid));
        before.saturating_sub(self.sessions.len())
    }

    async fn prune_started_before(&self, cutoff: Timestamp) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.started_at >= cutoff);
        before.saturating_sub(self.sessions.len())
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_take_consumes_session() {
        let store = InMemoryHoldTimerStore::new();
        let at = Utc::now();

        store.start("CA1", Some("WT1"), at).await;
        let session = store.take("CA1").await;
        assert_eq!(session.map(|s| s.started_at), Some(at));
        assert_eq!(store.take("CA1").await, None);
    }

    #[tokio::test]
    async fn test_restart_keeps_first_start() {
        let store = InMemoryHoldTimerStore::new();
        let first = Utc::now() - Duration::seconds(30);

        store.start("CA1", None, first).await;
        store.start("CA1", Some("WT1"), Utc::now()).await;
        let session = store.take("CA1").await;
        assert_eq!(
            session,
            Some(HoldSession {
                task_sid: Some("WT1".to_string()),
                started_at: first,
            })
        );
    }

    #[tokio::test]
    async fn test_session_found_whether_or_not_task_given() {
        let store = InMemoryHoldTimerStore::new();
        let at = Utc::now();

        store.start("CA1", Some("WT1"), at).await;
        assert_eq!(store.take("CA1").await.map(|s| s.started_at), Some(at));

        store.start("CA2", None, at).await;
        assert_eq!(store.take("CA2").await.map(|s| s.started_at), Some(at));
    }

    #[tokio::test]
    async fn test_clear_task_only_touches_that_task() {
        let store = InMemoryHoldTimerStore::new();
        store.start("CA1", Some("WT1"), Utc::now()).await;
        store.start("CA2", Some("WT1"), Utc::now()).await;
        store.start("CA3", Some("WT2"), Utc::now()).await;
        store.start("CA4", None, Utc::now()).await;

        assert_eq!(store.clear_task("WT1").await, 2);
        assert_eq!(store.len().await, 2);
        assert!(store.take("CA3").await.is_some());
        assert!(store.take("CA4").await.is_some());
    }

    #[tokio::test]
    async fn test_prune_drops_abandoned_sessions() {
        let store = InMemoryHoldTimerStore::new();
        let now = Utc::now();
        store.start("CA_OLD", None, now - Duration::hours(13)).await;
        store.start("CA_NEW", None, now).await;

        assert_eq!(store.prune_started_before(now - Duration::hours(12)).await, 1);
        assert!(store.take("CA_OLD").await.is_none());
        assert!(store.take("CA_NEW").await.is_some());
    }
}

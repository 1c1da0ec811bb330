//! Presence Service
//!
//! Worker availability as desktops see it.

use std::sync::Arc;

use chrono::Utc;
use switchboard_core::{DeskError, DeskResult, PresenceSnapshot, Worker};
use switchboard_events::{DomainEvent, EventHub};
use switchboard_platform::PlatformGateway;

#[derive(Clone)]
pub struct PresenceService {
    platform: Arc<dyn PlatformGateway>,
    events: EventHub,
}

impl PresenceService {
    pub fn new(platform: Arc<dyn PlatformGateway>, events: EventHub) -> Self {
        Self { platform, events }
    }

    pub async fn snapshot(&self) -> DeskResult<PresenceSnapshot> {
        let workers = self.platform.list_workers().await?;
        Ok(PresenceSnapshot::from_workers(&workers, Utc::now()))
    }

    /// Recompute the snapshot and push it to every connected desktop.
    pub async fn broadcast(&self) -> DeskResult<PresenceSnapshot> {
        let snapshot = self.snapshot().await?;
        tracing::debug!(
            workers = snapshot.workers.len(),
            available = snapshot.available_count(),
            "Broadcasting presence"
        );
        self.events
            .publish(DomainEvent::PresenceUpdate {
                snapshot: snapshot.clone(),
            })
            .await;
        Ok(snapshot)
    }

    /// Move a worker to another activity, then broadcast.
    ///
    /// A failed broadcast is logged; the activity change already happened.
    pub async fn set_activity(&self, worker_sid: &str, activity_sid: &str) -> DeskResult<Worker> {
        let activity_sid = activity_sid.trim();
        if activity_sid.is_empty() {
            return Err(DeskError::validation("activitySid", "is required"));
        }

        let worker = self
            .platform
            .update_worker_activity(worker_sid, activity_sid)
            .await?;
        tracing::info!(
            worker_sid,
            activity = ?worker.activity_name,
            available = worker.available,
            "Worker activity changed"
        );

        if let Err(e) = self.broadcast().await {
            tracing::warn!(worker_sid, error = %e, "Presence broadcast failed");
        }
        Ok(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::Activity;
    use switchboard_events::RingEventLog;
    use switchboard_platform::InMemoryPlatform;

    async fn seeded() -> (Arc<InMemoryPlatform>, EventHub, PresenceService) {
        let platform = Arc::new(InMemoryPlatform::new());
        platform
            .add_activity(Activity {
                sid: "WA_IDLE".to_string(),
                friendly_name: "Available".to_string(),
                available: true,
            })
            .await;
        for (sid, name) in [("WK2", "bob"), ("WK1", "alice")] {
            platform
                .add_worker(Worker {
                    sid: sid.to_string(),
                    friendly_name: name.to_string(),
                    activity_sid: None,
                    activity_name: Some("Offline".to_string()),
                    available: false,
                    attributes: Default::default(),
                })
                .await;
        }
        let events = EventHub::new(Arc::new(RingEventLog::new(8)), 8);
        let service = PresenceService::new(platform.clone(), events.clone());
        (platform, events, service)
    }

    #[tokio::test]
    async fn test_set_activity_broadcasts_snapshot() -> DeskResult<()> {
        let (_, events, service) = seeded().await;
        let mut rx = events.subscribe();

        let worker = service.set_activity("WK1", "WA_IDLE").await?;
        assert!(worker.available);

        let record = rx
            .recv()
            .await
            .map_err(|e| DeskError::internal(e.to_string()))?;
        let DomainEvent::PresenceUpdate { snapshot } = record.event else {
            return Err(DeskError::internal("expected presence update"));
        };
        assert_eq!(snapshot.available_count(), 1);
        assert_eq!(snapshot.workers[0].friendly_name, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_activity_is_not_found() {
        let (_, events, service) = seeded().await;
        let err = service.set_activity("WK1", "WA_NOPE").await.err();
        assert!(err.map(|e| e.is_not_found()).unwrap_or(false));
        assert_eq!(events.log().len().await, 0);
    }

    #[tokio::test]
    async fn test_blank_activity_is_rejected() {
        let (_, _, service) = seeded().await;
        assert!(matches!(
            service.set_activity("WK1", " ").await,
            Err(DeskError::Validation { .. })
        ));
    }
}

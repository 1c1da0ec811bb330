//! Record-then-broadcast hub.

use crate::event::{DomainEvent, EventRecord};
use crate::log::EventLog;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Appends every published event to the [`EventLog`] and pushes it to all
/// subscribers.
///
/// Slow subscribers that fall more than `capacity` events behind observe a
/// lag and skip ahead; the log still holds what they missed.
#[derive(Clone)]
pub struct EventHub {
    log: Arc<dyn EventLog>,
    tx: broadcast::Sender<EventRecord>,
}

impl EventHub {
    pub fn new(log: Arc<dyn EventLog>, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { log, tx }
    }

    /// Record and broadcast an event. Never fails: no subscribers is normal.
    pub async fn publish(&self, event: DomainEvent) -> EventRecord {
        let record = EventRecord::new(event);
        self.log.append(record.clone()).await;

        let event_type = record.event.event_type();
        match self.tx.send(record.clone()) {
            Ok(receivers) => debug!(event_type, receivers, "Broadcast event"),
            Err(_) => debug!(event_type, "No receivers for event"),
        }
        record
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::RingEventLog;

    #[tokio::test]
    async fn test_publish_records_and_broadcasts() {
        let log = Arc::new(RingEventLog::new(8));
        let hub = EventHub::new(log.clone(), 8);
        let mut rx = hub.subscribe();

        let record = hub
            .publish(DomainEvent::TaskCanceled {
                task_sid: "WT1".to_string(),
                reason: "Duplicate conversation task".to_string(),
            })
            .await;

        let received = rx.recv().await;
        assert_eq!(received.ok(), Some(record.clone()));
        assert_eq!(log.recent(1).await, vec![record]);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_still_logs() {
        let log = Arc::new(RingEventLog::new(8));
        let hub = EventHub::new(log.clone(), 8);
        assert_eq!(hub.receiver_count(), 0);

        hub.publish(DomainEvent::ConversationClosed {
            conversation_sid: "CH1".to_string(),
            task_sid: None,
        })
        .await;
        assert_eq!(hub.log().len().await, 1);
    }
}

//! Recent-event log.

use crate::event::EventRecord;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Default number of events a [`RingEventLog`] retains.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 200;

/// Store for the most recent domain events.
///
/// Implementations may be in memory, a cache or a durable store. Readers get
/// newest first.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, record: EventRecord);

    /// Up to `limit` records, newest first.
    async fn recent(&self, limit: usize) -> Vec<EventRecord>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Bounded in-memory log. The oldest record is evicted once full.
///
/// Contents are lost on restart.
#[derive(Debug)]
pub struct RingEventLog {
    capacity: usize,
    entries: RwLock<VecDeque<EventRecord>>,
}

impl RingEventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RingEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

#[async_trait]
impl EventLog for RingEventLog {
    async fn append(&self, record: EventRecord) {
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    async fn recent(&self, limit: usize) -> Vec<EventRecord> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DomainEvent;
    use proptest::prelude::*;

    fn completed(sid: &str) -> EventRecord {
        EventRecord::new(DomainEvent::TaskCompleted {
            task_sid: sid.to_string(),
            reason: None,
            disposition: None,
        })
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let log = RingEventLog::new(10);
        log.append(completed("WT1")).await;
        log.append(completed("WT2")).await;
        log.append(completed("WT3")).await;

        let recent = log.recent(2).await;
        let sids: Vec<_> = recent.iter().filter_map(|r| r.event.task_sid()).collect();
        assert_eq!(sids, vec!["WT3", "WT2"]);
    }

    #[tokio::test]
    async fn test_evicts_oldest_when_full() {
        let log = RingEventLog::new(2);
        log.append(completed("WT1")).await;
        log.append(completed("WT2")).await;
        log.append(completed("WT3")).await;

        assert_eq!(log.len().await, 2);
        let sids: Vec<_> = log
            .recent(10)
            .await
            .iter()
            .filter_map(|r| r.event.task_sid().map(str::to_string))
            .collect();
        assert_eq!(sids, vec!["WT3", "WT2"]);
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_one() {
        let log = RingEventLog::new(0);
        assert_eq!(log.capacity(), 1);
        assert!(log.is_empty().await);
        log.append(completed("WT1")).await;
        assert_eq!(log.len().await, 1);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(capacity in 1usize..16, pushes in 0usize..64) {
            let runtime = tokio::runtime::Builder::new_current_thread().build();
            prop_assert!(runtime.is_ok());
            let Ok(runtime) = runtime else { return Ok(()) };
            let (len, recent) = runtime.block_on(async {
                let log = RingEventLog::new(capacity);
                for i in 0..pushes {
                    log.append(completed(&format!("WT{}", i))).await;
                }
                (log.len().await, log.recent(usize::MAX).await)
            });
            prop_assert_eq!(len, pushes.min(capacity));
            prop_assert_eq!(recent.len(), len);
            if pushes > 0 {
                let newest = format!("WT{}", pushes - 1);
                prop_assert_eq!(recent[0].event.task_sid(), Some(newest.as_str()));
            }
        }
    }
}

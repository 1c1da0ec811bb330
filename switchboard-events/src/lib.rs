//! Switchboard Events - Domain Event Broadcast
//!
//! Domain events emitted by the lifecycle, hold and transfer services, the
//! injected [`EventLog`] that keeps the most recent ones, and the
//! [`EventHub`] that records then pushes them to connected desktops.

pub mod event;
pub mod hub;
pub mod log;

pub use event::{DomainEvent, EventRecord};
pub use hub::EventHub;
pub use log::{EventLog, RingEventLog, DEFAULT_EVENT_LOG_CAPACITY};

//! Workers, activities and presence.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A worker availability state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub sid: String,
    pub friendly_name: String,
    pub available: bool,
}

/// An agent as the routing engine knows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub sid: String,
    pub friendly_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub attributes: Map<String, Value>,
}

impl Worker {
    /// Agent identity stored in attributes, falling back to the friendly name.
    pub fn contact_uri(&self) -> &str {
        self.attributes
            .get("contact_uri")
            .or_else(|| self.attributes.get("identity"))
            .and_then(Value::as_str)
            .unwrap_or(&self.friendly_name)
    }
}

/// Presence of a single worker as broadcast to desktops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WorkerPresence {
    pub worker_sid: String,
    pub friendly_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    pub available: bool,
}

impl From<&Worker> for WorkerPresence {
    fn from(worker: &Worker) -> Self {
        Self {
            worker_sid: worker.sid.clone(),
            friendly_name: worker.friendly_name.clone(),
            activity: worker.activity_name.clone(),
            available: worker.available,
        }
    }
}

/// Presence of every worker at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub workers: Vec<WorkerPresence>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub generated_at: Timestamp,
}

impl PresenceSnapshot {
    pub fn from_workers(workers: &[Worker], generated_at: Timestamp) -> Self {
        let mut workers: Vec<WorkerPresence> = workers.iter().map(WorkerPresence::from).collect();
        workers.sort_by(|a, b| a.friendly_name.cmp(&b.friendly_name));
        Self {
            workers,
            generated_at,
        }
    }

    pub fn available_count(&self) -> usize {
        self.workers.iter().filter(|w| w.available).count()
    }
}

//! Task-related API types

use serde::{Deserialize, Serialize};
use switchboard_core::{AssignmentStatus, Reservation, Task};

/// Query string of `GET /taskrouter/my-tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct MyTasksQuery {
    /// Comma-separated assignment statuses, case-insensitive
    #[serde(default)]
    pub statuses: Option<String>,
}

/// A task the agent holds or held a reservation for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MyTask {
    #[serde(flatten)]
    pub task: Task,
    /// Reservations of this task, in platform order
    pub reservations: Vec<Reservation>,
}

/// Body of `POST /taskrouter/tasks/:sid/complete`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub disposition: Option<String>,
    /// Wrap an `assigned` task first instead of rejecting it
    #[serde(default)]
    pub auto_wrap: bool,
}

/// Body of `POST /taskrouter/tasks/:sid/wrap`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WrapTaskRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub disposition: Option<String>,
}

/// Status of a task after a lifecycle command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub sid: String,
    pub assignment_status: AssignmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<Task> for TaskStatusResponse {
    fn from(task: Task) -> Self {
        Self {
            sid: task.sid,
            assignment_status: task.assignment_status,
            reason: task.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_request_defaults() -> Result<(), serde_json::Error> {
        let req: CompleteTaskRequest = serde_json::from_value(json!({}))?;
        assert!(!req.auto_wrap);
        assert!(req.reason.is_none());

        let req: CompleteTaskRequest =
            serde_json::from_value(json!({"autoWrap": true, "disposition": "Resolved"}))?;
        assert!(req.auto_wrap);
        assert_eq!(req.disposition.as_deref(), Some("Resolved"));
        Ok(())
    }

    #[test]
    fn test_my_task_flattens_task_fields() -> Result<(), serde_json::Error> {
        let item = MyTask {
            task: Task::new("WT1", AssignmentStatus::Assigned),
            reservations: Vec::new(),
        };
        let value = serde_json::to_value(&item)?;
        assert_eq!(value["sid"], "WT1");
        assert_eq!(value["assignmentStatus"], "assigned");
        assert_eq!(value["reservations"], json!([]));
        Ok(())
    }
}

//! Task Lifecycle Routes
//!
//! The signed-in agent's task list and the wrap/complete commands.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::TaskLifecycle,
    state::AppState,
    types::{CompleteTaskRequest, MyTask, MyTasksQuery, TaskStatusResponse, WrapTaskRequest},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /taskrouter/my-tasks - Tasks the agent holds reservations for
#[utoipa::path(
    get,
    path = "/taskrouter/my-tasks",
    tag = "Tasks",
    params(MyTasksQuery),
    responses(
        (status = 200, description = "Tasks with their reservations", body = [MyTask]),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 502, description = "Platform unreachable", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn my_tasks(
    State(lifecycle): State<TaskLifecycle>,
    AuthExtractor(agent): AuthExtractor,
    Query(query): Query<MyTasksQuery>,
) -> ApiResult<Json<Vec<MyTask>>> {
    let tasks = lifecycle
        .list_mine(&agent.worker_sid, query.statuses.as_deref())
        .await?;
    Ok(Json(tasks))
}

/// POST /taskrouter/tasks/{sid}/complete - Complete a task
#[utoipa::path(
    post,
    path = "/taskrouter/tasks/{sid}/complete",
    tag = "Tasks",
    params(
        ("sid" = String, Path, description = "Task SID")
    ),
    request_body = CompleteTaskRequest,
    responses(
        (status = 200, description = "Task completed", body = TaskStatusResponse),
        (status = 400, description = "Task is not wrapping", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn complete_task(
    State(lifecycle): State<TaskLifecycle>,
    AuthExtractor(agent): AuthExtractor,
    Path(sid): Path<String>,
    Json(req): Json<CompleteTaskRequest>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let task = lifecycle
        .complete(&sid, &req, Some(&agent.worker_sid))
        .await?;
    Ok(Json(TaskStatusResponse::from(task)))
}

/// POST /taskrouter/tasks/{sid}/wrap - Move an assigned task to wrapping
#[utoipa::path(
    post,
    path = "/taskrouter/tasks/{sid}/wrap",
    tag = "Tasks",
    params(
        ("sid" = String, Path, description = "Task SID")
    ),
    request_body = WrapTaskRequest,
    responses(
        (status = 200, description = "Task is wrapping", body = TaskStatusResponse),
        (status = 400, description = "Task cannot wrap from its status", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn wrap_task(
    State(lifecycle): State<TaskLifecycle>,
    AuthExtractor(agent): AuthExtractor,
    Path(sid): Path<String>,
    Json(req): Json<WrapTaskRequest>,
) -> ApiResult<Json<TaskStatusResponse>> {
    tracing::debug!(task_sid = %sid, agent_id = %agent.agent_id, "Wrap requested");
    let task = lifecycle
        .wrap_force(&sid, req.reason.as_deref(), req.disposition.as_deref())
        .await?;
    Ok(Json(TaskStatusResponse::from(task)))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the task routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/my-tasks", get(my_tasks))
        .route("/tasks/:sid/complete", post(complete_task))
        .route("/tasks/:sid/wrap", post(wrap_task))
        .with_state(state)
}

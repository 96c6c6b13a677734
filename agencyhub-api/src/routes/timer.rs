/// Task timers
///
/// - `POST /api/tasks/:id/timer/start` - `time:track`, 409 if already running
/// - `POST /api/tasks/:id/timer/stop` - `time:track`, 404 if nothing is running
/// - `GET /api/tasks/:id/timer/status` - `time:track`
/// - `GET /api/tasks/:id/time-logs` - `tasks:read`, every log on the task
///
/// Timers are per user: starting one on a task does not affect teammates'
/// timers on the same task.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiPath,
    response::ApiResponse,
};
use agencyhub_shared::{
    auth::{authorization::require_permission, middleware::AuthContext, permissions::Permission},
    events::ActivityKind,
    models::{
        task::Task,
        time_log::{TimeLog, TimerStatus},
    },
};
use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// Optional body of the start request
#[derive(Debug, Default, Deserialize)]
pub struct StartTimerRequest {
    pub note: Option<String>,
}

async fn ensure_task(state: &AppState, auth: &AuthContext, task_id: Uuid) -> ApiResult<Task> {
    Task::find(&state.db, auth.organization_id, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

pub async fn start_timer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
    body: Option<Json<StartTimerRequest>>,
) -> ApiResult<ApiResponse<TimeLog>> {
    require_permission(&state.db, &auth, Permission::TimeTrack).await?;
    ensure_task(&state, &auth, task_id).await?;

    let note = body.and_then(|Json(req)| req.note).filter(|n| !n.trim().is_empty());
    let log = TimeLog::start(&state.db, auth.organization_id, task_id, auth.user_id, note).await?;

    state.publish(&auth, ActivityKind::TimerStarted, task_id);
    Ok(ApiResponse::created(log, "Timer started"))
}

pub async fn stop_timer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<TimeLog>> {
    require_permission(&state.db, &auth, Permission::TimeTrack).await?;
    ensure_task(&state, &auth, task_id).await?;

    let log = TimeLog::stop(&state.db, auth.organization_id, task_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No running timer for this task".to_string()))?;

    state.publish(&auth, ActivityKind::TimerStopped, task_id);
    Ok(ApiResponse::ok(log, "Timer stopped"))
}

pub async fn timer_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<TimerStatus>> {
    require_permission(&state.db, &auth, Permission::TimeTrack).await?;
    ensure_task(&state, &auth, task_id).await?;

    let running =
        TimeLog::find_running(&state.db, auth.organization_id, task_id, auth.user_id).await?;
    let total = TimeLog::total_seconds_for_task(&state.db, auth.organization_id, task_id).await?;

    Ok(ApiResponse::ok(
        TimerStatus::new(running, total, Utc::now()),
        "Timer status retrieved",
    ))
}

pub async fn list_time_logs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Vec<TimeLog>>> {
    require_permission(&state.db, &auth, Permission::TasksRead).await?;
    ensure_task(&state, &auth, task_id).await?;

    let logs = TimeLog::list_for_task(&state.db, auth.organization_id, task_id).await?;
    Ok(ApiResponse::ok(logs, "Time logs retrieved"))
}

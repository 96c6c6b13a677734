/// Task endpoints
///
/// - `GET /api/tasks?project_id=&status=&assignee_id=&limit=&offset=` - `tasks:read`
/// - `POST /api/tasks` - `tasks:write`
/// - `GET|PUT|DELETE /api/tasks/:id` - read / write / write
///
/// Timers on a task live in [`super::timer`].

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, ValidatedJson},
    response::ApiResponse,
    routes::{ensure_member_of_org, ensure_project_in_org},
};
use agencyhub_shared::{
    auth::{authorization::require_permission, middleware::AuthContext, permissions::Permission},
    events::ActivityKind,
    models::{
        task::{CreateTask, Task, TaskFilter, UpdateTask},
        Page,
    },
};
use axum::{extract::State, Extension};
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<ApiResponse<Vec<Task>>> {
    require_permission(&state.db, &auth, Permission::TasksRead).await?;

    let tasks = Task::list(&state.db, auth.organization_id, &filter, page).await?;
    Ok(ApiResponse::ok(tasks, "Tasks retrieved"))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(data): ValidatedJson<CreateTask>,
) -> ApiResult<ApiResponse<Task>> {
    require_permission(&state.db, &auth, Permission::TasksWrite).await?;

    ensure_project_in_org(&state.db, auth.organization_id, Some(data.project_id)).await?;
    ensure_member_of_org(&state.db, auth.organization_id, data.assignee_id).await?;

    let task = Task::create(&state.db, auth.organization_id, auth.user_id, data).await?;

    state.publish(&auth, ActivityKind::TaskCreated, task.id);
    Ok(ApiResponse::created(task, "Task created"))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Task>> {
    require_permission(&state.db, &auth, Permission::TasksRead).await?;

    let task = Task::find(&state.db, auth.organization_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(task, "Task retrieved"))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(data): ValidatedJson<UpdateTask>,
) -> ApiResult<ApiResponse<Task>> {
    require_permission(&state.db, &auth, Permission::TasksWrite).await?;

    ensure_member_of_org(&state.db, auth.organization_id, data.assignee_id).await?;

    let task = Task::update(&state.db, auth.organization_id, id, data)
        .await?
        .ok_or_else(not_found)?;

    state.publish(&auth, ActivityKind::TaskUpdated, task.id);
    Ok(ApiResponse::ok(task, "Task updated"))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    require_permission(&state.db, &auth, Permission::TasksWrite).await?;

    if !Task::soft_delete(&state.db, auth.organization_id, id).await? {
        return Err(not_found());
    }

    state.publish(&auth, ActivityKind::TaskDeleted, id);
    Ok(ApiResponse::ok((), "Task deleted"))
}

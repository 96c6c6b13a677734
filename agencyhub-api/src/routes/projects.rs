/// Project endpoints
///
/// - `GET /api/projects?status=&client_id=&limit=&offset=` - `projects:read`
/// - `POST /api/projects` - `projects:write`
/// - `GET|PUT|DELETE /api/projects/:id` - read / write / write
///
/// A referenced client must belong to the caller's organization, and a due
/// date may not precede the start date.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, ValidatedJson},
    response::ApiResponse,
    routes::ensure_client_in_org,
};
use agencyhub_shared::{
    auth::{authorization::require_permission, middleware::AuthContext, permissions::Permission},
    events::ActivityKind,
    models::{
        project::{dates_in_order, CreateProject, Project, ProjectFilter, UpdateProject},
        Page,
    },
};
use axum::{extract::State, Extension};
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::NotFound("Project not found".to_string())
}

fn dates_out_of_order() -> ApiError {
    ApiError::invalid_field("due_date", "Due date must not be before the start date")
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<ApiResponse<Vec<Project>>> {
    require_permission(&state.db, &auth, Permission::ProjectsRead).await?;

    let projects = Project::list(&state.db, auth.organization_id, &filter, page).await?;
    Ok(ApiResponse::ok(projects, "Projects retrieved"))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(data): ValidatedJson<CreateProject>,
) -> ApiResult<ApiResponse<Project>> {
    require_permission(&state.db, &auth, Permission::ProjectsWrite).await?;

    if !data.dates_in_order() {
        return Err(dates_out_of_order());
    }
    ensure_client_in_org(&state.db, auth.organization_id, data.client_id).await?;

    let project = Project::create(&state.db, auth.organization_id, auth.user_id, data).await?;

    state.publish(&auth, ActivityKind::ProjectCreated, project.id);
    Ok(ApiResponse::created(project, "Project created"))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Project>> {
    require_permission(&state.db, &auth, Permission::ProjectsRead).await?;

    let project = Project::find(&state.db, auth.organization_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(project, "Project retrieved"))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(data): ValidatedJson<UpdateProject>,
) -> ApiResult<ApiResponse<Project>> {
    require_permission(&state.db, &auth, Permission::ProjectsWrite).await?;

    let current = Project::find(&state.db, auth.organization_id, id)
        .await?
        .ok_or_else(not_found)?;
    if !dates_in_order(
        data.start_date.or(current.start_date),
        data.due_date.or(current.due_date),
    ) {
        return Err(dates_out_of_order());
    }
    ensure_client_in_org(&state.db, auth.organization_id, data.client_id).await?;

    let project = Project::update(&state.db, auth.organization_id, id, data)
        .await?
        .ok_or_else(not_found)?;

    state.publish(&auth, ActivityKind::ProjectUpdated, project.id);
    Ok(ApiResponse::ok(project, "Project updated"))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    require_permission(&state.db, &auth, Permission::ProjectsWrite).await?;

    if !Project::soft_delete(&state.db, auth.organization_id, id).await? {
        return Err(not_found());
    }

    state.publish(&auth, ActivityKind::ProjectDeleted, id);
    Ok(ApiResponse::ok((), "Project deleted"))
}

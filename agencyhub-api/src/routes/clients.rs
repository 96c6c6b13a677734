/// Client endpoints
///
/// - `GET /api/clients?search=&limit=&offset=` - `clients:read`
/// - `POST /api/clients` - `clients:write`
/// - `GET /api/clients/:id` - `clients:read`
/// - `PUT /api/clients/:id` - `clients:write`
/// - `DELETE /api/clients/:id` - `clients:write`, soft delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, ValidatedJson},
    response::ApiResponse,
};
use agencyhub_shared::{
    auth::{authorization::require_permission, middleware::AuthContext, permissions::Permission},
    events::ActivityKind,
    models::{
        client::{Client, ClientFilter, CreateClient, UpdateClient},
        Page,
    },
};
use axum::{extract::State, Extension};
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::NotFound("Client not found".to_string())
}

pub async fn list_clients(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<ClientFilter>,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<ApiResponse<Vec<Client>>> {
    require_permission(&state.db, &auth, Permission::ClientsRead).await?;

    let clients = Client::list(&state.db, auth.organization_id, &filter, page).await?;
    Ok(ApiResponse::ok(clients, "Clients retrieved"))
}

pub async fn create_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(data): ValidatedJson<CreateClient>,
) -> ApiResult<ApiResponse<Client>> {
    require_permission(&state.db, &auth, Permission::ClientsWrite).await?;

    let client = Client::create(&state.db, auth.organization_id, data).await?;

    state.publish(&auth, ActivityKind::ClientCreated, client.id);
    Ok(ApiResponse::created(client, "Client created"))
}

pub async fn get_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Client>> {
    require_permission(&state.db, &auth, Permission::ClientsRead).await?;

    let client = Client::find(&state.db, auth.organization_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(client, "Client retrieved"))
}

pub async fn update_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(data): ValidatedJson<UpdateClient>,
) -> ApiResult<ApiResponse<Client>> {
    require_permission(&state.db, &auth, Permission::ClientsWrite).await?;

    let client = Client::update(&state.db, auth.organization_id, id, data)
        .await?
        .ok_or_else(not_found)?;

    state.publish(&auth, ActivityKind::ClientUpdated, client.id);
    Ok(ApiResponse::ok(client, "Client updated"))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    require_permission(&state.db, &auth, Permission::ClientsWrite).await?;

    if !Client::soft_delete(&state.db, auth.organization_id, id).await? {
        return Err(not_found());
    }

    state.publish(&auth, ActivityKind::ClientDeleted, id);
    Ok(ApiResponse::ok((), "Client deleted"))
}

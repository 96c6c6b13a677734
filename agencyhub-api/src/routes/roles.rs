/// `GET /api/roles`: the role → permission table

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use agencyhub_shared::auth::{
    authorization::require_membership,
    middleware::AuthContext,
    permissions::{role_definitions, RoleDefinition},
};
use axum::{extract::State, Extension};

pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<RoleDefinition>>> {
    require_membership(&state.db, &auth).await?;
    Ok(ApiResponse::ok(role_definitions(), "Roles retrieved"))
}

/// Team management
///
/// # Endpoints
///
/// - `GET /api/users` - `users:read`, members with their roles
/// - `POST /api/users` - `users:manage`, add a user (existing or new account)
/// - `PUT /api/users/:id` - `users:manage`, change a member's role
/// - `DELETE /api/users/:id` - `users:manage`, remove a member
///
/// Only owners can hand out the owner role, and the last owner can neither
/// be demoted nor removed.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ValidatedJson},
    response::ApiResponse,
};
use agencyhub_shared::{
    auth::{
        authorization::{change_member_role, remove_member, require_permission},
        middleware::AuthContext,
        password,
        permissions::Permission,
    },
    events::ActivityKind,
    models::{
        membership::{CreateMembership, MemberRole, MemberSummary, Membership},
        user::{CreateUser, User},
    },
};
use axum::{extract::State, http::StatusCode, Extension};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    /// Defaults to `member`
    pub role: Option<MemberRole>,

    /// Initial password for a new account; without one the user signs in with Google
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    pub role: MemberRole,
}

/// Granting `owner` is reserved to owners
fn ensure_may_grant(caller: MemberRole, granted: MemberRole) -> ApiResult<()> {
    if granted == MemberRole::Owner && caller != MemberRole::Owner {
        return Err(ApiError::Forbidden(
            "Only owners can grant the owner role".to_string(),
        ));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<MemberSummary>>> {
    require_permission(&state.db, &auth, Permission::UsersRead).await?;

    let members = Membership::list_members(&state.db, auth.organization_id).await?;
    Ok(ApiResponse::ok(members, "Users retrieved"))
}

/// Adds a user to the caller's organization
///
/// An existing account with the e-mail is attached as-is; otherwise a new
/// account is created.
///
/// # Errors
///
/// - `409 Conflict`: already a member
pub async fn add_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<AddUserRequest>,
) -> ApiResult<ApiResponse<MemberSummary>> {
    let caller_role = require_permission(&state.db, &auth, Permission::UsersManage).await?;
    let role = req.role.unwrap_or(MemberRole::Member);
    ensure_may_grant(caller_role, role)?;

    let user = match User::find_by_email(&state.db, &req.email).await? {
        Some(user) => user,
        None => {
            let password_hash = match req.password.as_deref() {
                Some(plain) => {
                    password::validate_password_strength(plain)
                        .map_err(|e| ApiError::invalid_field("password", e))?;
                    Some(password::hash_password(plain)?)
                }
                None => None,
            };
            User::create(
                &state.db,
                CreateUser {
                    email: req.email,
                    password_hash,
                    name: req.name,
                    ..Default::default()
                },
            )
            .await?
        }
    };

    Membership::create(
        &state.db,
        CreateMembership {
            organization_id: auth.organization_id,
            user_id: user.id,
            role,
        },
    )
    .await?;

    info!(
        organization_id = %auth.organization_id,
        user_id = %user.id,
        role = role.as_str(),
        "Member added"
    );
    state.publish(&auth, ActivityKind::MemberAdded, user.id);

    let member = Membership::find_member(&state.db, auth.organization_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(ApiResponse::created(member, "User added"))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> ApiResult<ApiResponse<MemberSummary>> {
    let caller_role = require_permission(&state.db, &auth, Permission::UsersManage).await?;
    ensure_may_grant(caller_role, req.role)?;

    if caller_role != MemberRole::Owner
        && Membership::get_role(&state.db, auth.organization_id, user_id).await?
            == Some(MemberRole::Owner)
    {
        return Err(ApiError::Forbidden(
            "Only owners can change another owner's role".to_string(),
        ));
    }

    change_member_role(&state.db, auth.organization_id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(
        organization_id = %auth.organization_id,
        %user_id,
        role = req.role.as_str(),
        "Member role changed"
    );
    state.publish(&auth, ActivityKind::MemberRoleChanged, user_id);

    let member = Membership::find_member(&state.db, auth.organization_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(ApiResponse::ok(member, "User role updated"))
}

pub async fn remove_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    let caller_role = require_permission(&state.db, &auth, Permission::UsersManage).await?;

    let target_role = Membership::get_role(&state.db, auth.organization_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    if target_role == MemberRole::Owner && caller_role != MemberRole::Owner {
        return Err(ApiError::Forbidden("Only owners can remove an owner".to_string()));
    }

    if !remove_member(&state.db, auth.organization_id, user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(organization_id = %auth.organization_id, %user_id, "Member removed");
    state.publish(&auth, ActivityKind::MemberRemoved, user_id);

    Ok(ApiResponse::new(StatusCode::OK, (), "User removed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_owners_grant_owner() {
        assert!(ensure_may_grant(MemberRole::Owner, MemberRole::Owner).is_ok());
        assert!(ensure_may_grant(MemberRole::Admin, MemberRole::Owner).is_err());
        assert!(ensure_may_grant(MemberRole::Admin, MemberRole::Finance).is_ok());
    }

    #[test]
    fn test_add_user_request_role_is_optional() {
        let req: AddUserRequest =
            serde_json::from_value(serde_json::json!({ "email": "ops@studio.example" })).unwrap();
        assert!(req.role.is_none());
        assert!(req.validate().is_ok());

        let req: AddUserRequest = serde_json::from_value(serde_json::json!({
            "email": "ops@studio.example",
            "role": "team_lead",
        }))
        .unwrap();
        assert_eq!(req.role, Some(MemberRole::TeamLead));
    }
}

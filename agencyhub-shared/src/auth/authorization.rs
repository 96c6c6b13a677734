/// Authorization checks
///
/// Authentication tells us who is calling and for which organization. The
/// helpers here decide whether that caller may do something:
///
/// 1. **Membership**: the user must belong to the organization in the token
/// 2. **Permission**: the member's current role must grant the capability
/// 3. **Owner guard**: an organization never loses its last owner
///
/// Roles are read from `memberships` on every check, so demoting someone
/// takes effect immediately even though their token is still valid.
///
/// # Example
///
/// ```no_run
/// use agencyhub_shared::auth::authorization::require_permission;
/// use agencyhub_shared::auth::middleware::AuthContext;
/// use agencyhub_shared::auth::permissions::Permission;
/// use sqlx::{PgConnection, PgPool};
///
/// async fn create_project(pool: &PgPool, auth: &AuthContext) -> Result<(), Box<dyn std::error::Error>> {
///     require_permission(pool, auth, Permission::ProjectsWrite).await?;
///     // ... insert the project
///     Ok(())
/// }
/// ```

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::middleware::AuthContext;
use super::permissions::{role_has_permission, Permission};
use crate::models::membership::{MemberRole, Membership};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of this organization")]
    NotMember(Uuid),

    #[error("Missing permission: {}", .permission.as_str())]
    MissingPermission {
        permission: Permission,
        role: MemberRole,
    },

    #[error("An organization must keep at least one owner")]
    LastOwner,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Confirms the caller belongs to the organization in their token
///
/// # Returns
///
/// The caller's current role.
///
/// # Errors
///
/// `AuthzError::NotMember` when the membership is gone, for example after
/// the user was removed from the team.
pub async fn require_membership(pool: &PgPool, auth: &AuthContext) -> Result<MemberRole, AuthzError> {
    Membership::get_role(pool, auth.organization_id, auth.user_id)
        .await?
        .ok_or(AuthzError::NotMember(auth.organization_id))
}

/// Checks that `role` grants `permission`
pub fn check_permission(role: MemberRole, permission: Permission) -> Result<(), AuthzError> {
    if role_has_permission(role, permission) {
        Ok(())
    } else {
        Err(AuthzError::MissingPermission { permission, role })
    }
}

/// Looks up the caller's role and checks it grants `permission`
///
/// # Returns
///
/// The caller's role, so handlers that need it do not query twice.
///
/// # Errors
///
/// - `AuthzError::NotMember` if the caller left the organization
/// - `AuthzError::MissingPermission` if the role does not grant it
pub async fn require_permission(
    pool: &PgPool,
    auth: &AuthContext,
    permission: Permission,
) -> Result<MemberRole, AuthzError> {
    let role = require_membership(pool, auth).await?;
    check_permission(role, permission)?;
    Ok(role)
}

/// Decides whether a change to an owner's membership leaves an owner behind
///
/// `new_role` is `None` when the membership is being removed.
pub fn owner_change_allowed(
    current_role: MemberRole,
    new_role: Option<MemberRole>,
    owner_count: i64,
) -> bool {
    let stays_owner = new_role == Some(MemberRole::Owner);
    current_role != MemberRole::Owner || stays_owner || owner_count > 1
}

/// Refuses to demote or remove the organization's last owner
///
/// Locks the owner rows on `conn`, so the check holds until the caller's
/// transaction commits. Run the membership write on the same transaction.
///
/// # Errors
///
/// `AuthzError::LastOwner` when `target_user_id` is the only owner and the
/// change would take that away.
pub async fn ensure_owner_remains(
    conn: &mut PgConnection,
    organization_id: Uuid,
    target_user_id: Uuid,
    new_role: Option<MemberRole>,
) -> Result<(), AuthzError> {
    let owners = Membership::lock_owners(conn, organization_id).await?;
    if !owners.contains(&target_user_id) {
        return Ok(());
    }

    if owner_change_allowed(MemberRole::Owner, new_role, owners.len() as i64) {
        Ok(())
    } else {
        Err(AuthzError::LastOwner)
    }
}

/// Changes a member's role without ever leaving the organization ownerless
///
/// # Returns
///
/// The updated membership, or `None` if the user is not a member.
pub async fn change_member_role(
    pool: &PgPool,
    organization_id: Uuid,
    target_user_id: Uuid,
    role: MemberRole,
) -> Result<Option<Membership>, AuthzError> {
    let mut tx = pool.begin().await?;
    ensure_owner_remains(&mut tx, organization_id, target_user_id, Some(role)).await?;
    let membership = Membership::update_role(&mut *tx, organization_id, target_user_id, role).await?;
    tx.commit().await?;

    Ok(membership)
}

/// Removes a member unless they are the last owner
///
/// Returns false when the user was not a member.
pub async fn remove_member(
    pool: &PgPool,
    organization_id: Uuid,
    target_user_id: Uuid,
) -> Result<bool, AuthzError> {
    let mut tx = pool.begin().await?;
    ensure_owner_remains(&mut tx, organization_id, target_user_id, None).await?;
    let removed = Membership::delete(&mut *tx, organization_id, target_user_id).await?;
    tx.commit().await?;

    Ok(removed)
}

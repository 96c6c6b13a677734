/// API route handlers, one module per resource
///
/// Handlers follow the same shape: check the caller's permission, call the
/// model, publish an activity event after a write, and wrap the result in
/// [`ApiResponse`](crate::response::ApiResponse).

pub mod analytics;
pub mod auth;
pub mod clients;
pub mod events;
pub mod health;
pub mod invoices;
pub mod organization;
pub mod projects;
pub mod quotations;
pub mod roles;
pub mod tasks;
pub mod timer;
pub mod users;

use crate::error::{ApiError, ApiResult};
use agencyhub_shared::models::{client::Client, membership::Membership, project::Project};
use sqlx::PgPool;
use uuid::Uuid;

/// Rejects a `client_id` that is not a live client of the organization
pub(crate) async fn ensure_client_in_org(
    pool: &PgPool,
    organization_id: Uuid,
    client_id: Option<Uuid>,
) -> ApiResult<()> {
    match client_id {
        Some(id) if !Client::exists(pool, organization_id, id).await? => {
            Err(ApiError::invalid_field("client_id", "Client not found"))
        }
        _ => Ok(()),
    }
}

/// Rejects a `project_id` that is not a live project of the organization
pub(crate) async fn ensure_project_in_org(
    pool: &PgPool,
    organization_id: Uuid,
    project_id: Option<Uuid>,
) -> ApiResult<()> {
    match project_id {
        Some(id) if !Project::exists(pool, organization_id, id).await? => {
            Err(ApiError::invalid_field("project_id", "Project not found"))
        }
        _ => Ok(()),
    }
}

/// Rejects an assignee who is not a member of the organization
pub(crate) async fn ensure_member_of_org(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Option<Uuid>,
) -> ApiResult<()> {
    match user_id {
        Some(id) if Membership::get_role(pool, organization_id, id).await?.is_none() => {
            Err(ApiError::invalid_field("assignee_id", "Assignee is not a member of this organization"))
        }
        _ => Ok(()),
    }
}

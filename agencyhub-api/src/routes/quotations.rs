/// Quotation endpoints
///
/// # Endpoints
///
/// - `GET /api/quotations?status=&client_id=&limit=&offset=` - `quotations:read`
/// - `POST /api/quotations` - `quotations:write`, created as `draft`
/// - `GET /api/quotations/:id` - `quotations:read`
/// - `PUT /api/quotations/:id` - `quotations:write`, content only
/// - `PUT /api/quotations/:id/status` - `quotations:write`
/// - `POST /api/quotations/:id/convert` - `quotations:write` and `projects:write`
/// - `DELETE /api/quotations/:id` - `quotations:write`, soft delete
///
/// # Status machine
///
/// ```text
/// draft ──→ sent ──→ accepted ──→ converted
///   │        │  │       │
///   │        │  └→ expired ──→ sent
///   │        └───→ rejected ←──┘
///   └→ accepted | rejected
/// ```
///
/// `rejected` and `converted` are terminal. `converted` is reached only
/// through the convert endpoint, which creates the project in the same
/// transaction.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, ValidatedJson},
    response::ApiResponse,
    routes::ensure_client_in_org,
};
use agencyhub_shared::{
    auth::{
        authorization::{check_permission, require_permission},
        middleware::AuthContext,
        permissions::Permission,
    },
    events::ActivityKind,
    models::{
        project::Project,
        quotation::{
            CreateQuotation, Quotation, QuotationFilter, QuotationStatus, UpdateQuotation,
        },
        Page,
    },
};
use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

fn not_found() -> ApiError {
    ApiError::NotFound("Quotation not found".to_string())
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: QuotationStatus,
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub quotation: Quotation,
    pub project: Project,
}

pub async fn list_quotations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<QuotationFilter>,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<ApiResponse<Vec<Quotation>>> {
    require_permission(&state.db, &auth, Permission::QuotationsRead).await?;

    let quotations = Quotation::list(&state.db, auth.organization_id, &filter, page).await?;
    Ok(ApiResponse::ok(quotations, "Quotations retrieved"))
}

pub async fn create_quotation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(data): ValidatedJson<CreateQuotation>,
) -> ApiResult<ApiResponse<Quotation>> {
    require_permission(&state.db, &auth, Permission::QuotationsWrite).await?;
    ensure_client_in_org(&state.db, auth.organization_id, Some(data.client_id)).await?;

    let quotation = Quotation::create(&state.db, auth.organization_id, auth.user_id, data).await?;

    state.publish(&auth, ActivityKind::QuotationCreated, quotation.id);
    Ok(ApiResponse::created(quotation, "Quotation created"))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Quotation>> {
    require_permission(&state.db, &auth, Permission::QuotationsRead).await?;

    let quotation = Quotation::find(&state.db, auth.organization_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(quotation, "Quotation retrieved"))
}

/// Edits title, description, validity and items
///
/// # Errors
///
/// - `409 Conflict`: the quotation was already converted
pub async fn update_quotation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(data): ValidatedJson<UpdateQuotation>,
) -> ApiResult<ApiResponse<Quotation>> {
    require_permission(&state.db, &auth, Permission::QuotationsWrite).await?;

    let quotation = Quotation::update(&state.db, auth.organization_id, id, data).await?;

    state.publish(&auth, ActivityKind::QuotationUpdated, quotation.id);
    Ok(ApiResponse::ok(quotation, "Quotation updated"))
}

/// # Errors
///
/// - `400 Bad Request`: the move is not allowed from the current status,
///   including any attempt to set `converted` directly
/// - `409 Conflict`: the quotation was already converted
pub async fn update_quotation_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<ApiResponse<Quotation>> {
    require_permission(&state.db, &auth, Permission::QuotationsWrite).await?;

    if req.status == QuotationStatus::Converted {
        return Err(ApiError::invalid_field(
            "status",
            "Use the convert endpoint to convert a quotation",
        ));
    }

    let quotation =
        Quotation::update_status(&state.db, auth.organization_id, id, req.status).await?;

    state.publish(&auth, ActivityKind::QuotationStatusChanged, quotation.id);
    Ok(ApiResponse::ok(quotation, "Quotation status updated"))
}

/// Turns an accepted quotation into a project
///
/// The project takes the quotation's client, title and description, and
/// its total as budget.
///
/// # Errors
///
/// - `400 Bad Request`: the quotation is not `accepted`
/// - `403 Forbidden`: the caller may not create projects
/// - `409 Conflict`: already converted
pub async fn convert_quotation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<ConversionResponse>> {
    let role = require_permission(&state.db, &auth, Permission::QuotationsWrite).await?;
    check_permission(role, Permission::ProjectsWrite)?;

    let (quotation, project) =
        Quotation::convert_to_project(&state.db, auth.organization_id, id, auth.user_id).await?;

    info!(
        quotation_id = %quotation.id,
        project_id = %project.id,
        organization_id = %auth.organization_id,
        "Quotation converted to project"
    );
    state.publish(&auth, ActivityKind::QuotationConverted, quotation.id);
    state.publish(&auth, ActivityKind::ProjectCreated, project.id);

    Ok(ApiResponse::created(
        ConversionResponse { quotation, project },
        "Quotation converted to project",
    ))
}

pub async fn delete_quotation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    require_permission(&state.db, &auth, Permission::QuotationsWrite).await?;

    if !Quotation::soft_delete(&state.db, auth.organization_id, id).await? {
        return Err(not_found());
    }

    state.publish(&auth, ActivityKind::QuotationDeleted, id);
    Ok(ApiResponse::ok((), "Quotation deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_request_parses_snake_case() {
        let req: UpdateStatusRequest =
            serde_json::from_value(serde_json::json!({ "status": "accepted" })).unwrap();
        assert_eq!(req.status, QuotationStatus::Accepted);

        assert!(serde_json::from_value::<UpdateStatusRequest>(
            serde_json::json!({ "status": "archived" })
        )
        .is_err());
    }

    #[test]
    fn test_status_route_edges() {
        use QuotationStatus::*;

        assert!(!Draft.can_transition_to(Expired));
        assert!(Sent.can_transition_to(Expired));
        assert!(Expired.can_transition_to(Sent));
        assert!(Accepted.can_transition_to(Rejected));
        assert!(!Accepted.can_transition_to(Converted));
    }
}

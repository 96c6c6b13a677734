/// Invoice endpoints
///
/// - `GET /api/invoices?status=&client_id=&project_id=&limit=&offset=` - `invoices:read`
/// - `POST /api/invoices` - `invoices:write`, number generated when omitted
/// - `GET /api/invoices/:id` - `invoices:read`
/// - `PUT /api/invoices/:id` - `invoices:write`, totals recomputed from the items
/// - `DELETE /api/invoices/:id` - `invoices:write`, soft delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, ValidatedJson},
    response::ApiResponse,
    routes::{ensure_client_in_org, ensure_project_in_org},
};
use agencyhub_shared::{
    auth::{authorization::require_permission, middleware::AuthContext, permissions::Permission},
    events::ActivityKind,
    models::{
        invoice::{CreateInvoice, Invoice, InvoiceFilter, UpdateInvoice},
        Page,
    },
};
use axum::{extract::State, Extension};
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::NotFound("Invoice not found".to_string())
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<InvoiceFilter>,
    ApiQuery(page): ApiQuery<Page>,
) -> ApiResult<ApiResponse<Vec<Invoice>>> {
    require_permission(&state.db, &auth, Permission::InvoicesRead).await?;

    let invoices = Invoice::list(&state.db, auth.organization_id, &filter, page).await?;
    Ok(ApiResponse::ok(invoices, "Invoices retrieved"))
}

/// Creates an invoice for a client, optionally tied to one of its projects
///
/// # Errors
///
/// - `400 Bad Request`: unknown client or project, invalid line items
/// - `409 Conflict`: explicit `invoice_number` already used
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(data): ValidatedJson<CreateInvoice>,
) -> ApiResult<ApiResponse<Invoice>> {
    require_permission(&state.db, &auth, Permission::InvoicesWrite).await?;
    ensure_client_in_org(&state.db, auth.organization_id, Some(data.client_id)).await?;
    ensure_project_in_org(&state.db, auth.organization_id, data.project_id).await?;

    let invoice = Invoice::create(&state.db, auth.organization_id, auth.user_id, data).await?;

    state.publish(&auth, ActivityKind::InvoiceCreated, invoice.id);
    Ok(ApiResponse::created(invoice, "Invoice created"))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Invoice>> {
    require_permission(&state.db, &auth, Permission::InvoicesRead).await?;

    let invoice = Invoice::find(&state.db, auth.organization_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(invoice, "Invoice retrieved"))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(data): ValidatedJson<UpdateInvoice>,
) -> ApiResult<ApiResponse<Invoice>> {
    require_permission(&state.db, &auth, Permission::InvoicesWrite).await?;

    let invoice = Invoice::update(&state.db, auth.organization_id, id, data)
        .await?
        .ok_or_else(not_found)?;

    state.publish(&auth, ActivityKind::InvoiceUpdated, invoice.id);
    Ok(ApiResponse::ok(invoice, "Invoice updated"))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    require_permission(&state.db, &auth, Permission::InvoicesWrite).await?;

    if !Invoice::soft_delete(&state.db, auth.organization_id, id).await? {
        return Err(not_found());
    }

    state.publish(&auth, ActivityKind::InvoiceDeleted, id);
    Ok(ApiResponse::ok((), "Invoice deleted"))
}

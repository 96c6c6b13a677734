/// Dashboard figures, `analytics:read`
///
/// - `GET /api/analytics/dashboard` - counters for the organization
/// - `GET /api/analytics/revenue` - paid revenue per month, oldest first

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use agencyhub_shared::{
    auth::{authorization::require_permission, middleware::AuthContext, permissions::Permission},
    models::analytics::{dashboard_summary, monthly_revenue, DashboardSummary, MonthlyRevenue},
};
use axum::{extract::State, Extension};

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<DashboardSummary>> {
    require_permission(&state.db, &auth, Permission::AnalyticsRead).await?;

    let summary = dashboard_summary(&state.db, auth.organization_id).await?;
    Ok(ApiResponse::ok(summary, "Dashboard retrieved"))
}

pub async fn revenue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<MonthlyRevenue>>> {
    require_permission(&state.db, &auth, Permission::AnalyticsRead).await?;

    let series = monthly_revenue(&state.db, auth.organization_id).await?;
    Ok(ApiResponse::ok(series, "Revenue retrieved"))
}

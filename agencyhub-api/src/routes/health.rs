/// Health check endpoints
///
/// # Endpoints
///
/// - `GET /api/health`: liveness, never touches the database
/// - `GET /api/health/ready`: readiness, 503 while the database is unreachable
///
/// Neither response uses the `{ statusCode, data, message }` envelope.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use agencyhub_shared::db::{
    migrations::{get_migration_status, MigrationStatus},
    pool::{get_pool_stats, health_check as ping_database, PoolStats},
};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub pool: PoolStats,
    pub migrations: MigrationStatus,
}

/// `GET /api/health`
///
/// ```json
/// { "status": "ok", "timestamp": "2025-03-18T09:30:00Z" }
/// ```
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

/// `GET /api/health/ready`
pub async fn readiness_check(State(state): State<AppState>) -> ApiResult<Json<ReadinessResponse>> {
    ping_database(&state.db).await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        ApiError::ServiceUnavailable("Database unavailable".to_string())
    })?;

    let migrations = get_migration_status(&state.db).await?;

    Ok(Json(ReadinessResponse {
        status: if migrations.is_up_to_date { "ready" } else { "migrating" },
        version: env!("CARGO_PKG_VERSION"),
        database: "connected",
        pool: get_pool_stats(&state.db),
        migrations,
    }))
}

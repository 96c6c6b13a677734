/// Projects
///
/// A project groups tasks and time for one engagement. It may belong to a
/// client and may have been created from an accepted quotation, in which
/// case `quotation_id` points back at it and the budget is the quoted total.
///
/// # Example
///
/// ```no_run
/// use agencyhub_shared::models::project::{CreateProject, Project, ProjectFilter, ProjectStatus};
/// use agencyhub_shared::models::Page;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, organization_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// Project::create(&pool, organization_id, user_id, CreateProject {
///     name: "Spring campaign".to_string(),
///     budget_cents: Some(1_500_000),
///     ..Default::default()
/// }).await?;
///
/// let active = Project::list(&pool, organization_id, &ProjectFilter {
///     status: Some(ProjectStatus::Active),
///     ..Default::default()
/// }, Page::default()).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::quotation::Quotation;
use super::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    /// Planning, active and on-hold projects still need work
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ProjectStatus::Planning | ProjectStatus::Active | ProjectStatus::OnHold
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub budget_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateProject {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    /// Defaults to `planning`
    pub status: Option<ProjectStatus>,
    #[validate(range(min = 0))]
    pub budget_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl CreateProject {
    pub fn dates_in_order(&self) -> bool {
        dates_in_order(self.start_date, self.due_date)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProject {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub status: Option<ProjectStatus>,
    #[validate(range(min = 0))]
    pub budget_cents: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub client_id: Option<Uuid>,
}

/// A due date may not precede the start date
pub fn dates_in_order(start: Option<NaiveDate>, due: Option<NaiveDate>) -> bool {
    match (start, due) {
        (Some(start), Some(due)) => due >= start,
        _ => true,
    }
}

const PROJECT_COLUMNS: &str = "id, organization_id, client_id, quotation_id, name, description, \
     status, budget_cents, start_date, due_date, created_by, created_at, updated_at";

impl Project {
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        created_by: Uuid,
        data: CreateProject,
    ) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects
                (organization_id, client_id, name, description, status,
                 budget_cents, start_date, due_date, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(data.client_id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.status.unwrap_or(ProjectStatus::Planning))
        .bind(data.budget_cents)
        .bind(data.start_date)
        .bind(data.due_date)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        debug!(project_id = %project.id, %organization_id, "Project created");
        Ok(project)
    }

    /// Inserts the project for an accepted quotation
    ///
    /// Runs on the caller's connection so it shares the conversion
    /// transaction that also marks the quotation converted.
    pub async fn create_from_quotation(
        conn: &mut PgConnection,
        quotation: &Quotation,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects
                (organization_id, client_id, quotation_id, name, description,
                 status, budget_cents, created_by)
             VALUES ($1, $2, $3, $4, $5, 'planning', $6, $7)
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(quotation.organization_id)
        .bind(quotation.client_id)
        .bind(quotation.id)
        .bind(&quotation.title)
        .bind(&quotation.description)
        .bind(quotation.total_cents)
        .bind(created_by)
        .fetch_one(conn)
        .await?;

        info!(
            project_id = %project.id,
            quotation_id = %quotation.id,
            organization_id = %quotation.organization_id,
            "Project created from quotation"
        );
        Ok(project)
    }

    pub async fn find(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn exists(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM projects
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL)",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_one(pool)
        .await
    }

    /// Newest first
    pub async fn list(
        pool: &PgPool,
        organization_id: Uuid,
        filter: &ProjectFilter,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE organization_id = $1 AND deleted_at IS NULL
               AND ($2::project_status IS NULL OR status = $2)
               AND ($3::uuid IS NULL OR client_id = $3)
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(organization_id)
        .bind(filter.status)
        .bind(filter.client_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                client_id = COALESCE($5, client_id),
                status = COALESCE($6, status),
                budget_cents = COALESCE($7, budget_cents),
                start_date = COALESCE($8, start_date),
                due_date = COALESCE($9, due_date),
                updated_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.client_id)
        .bind(data.status)
        .bind(data.budget_cents)
        .bind(data.start_date)
        .bind(data.due_date)
        .fetch_optional(pool)
        .await
    }

    pub async fn soft_delete(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projects SET deleted_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(organization_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_matches_database_labels() {
        for status in [
            ProjectStatus::Planning,
            ProjectStatus::Active,
            ProjectStatus::OnHold,
            ProjectStatus::Completed,
            ProjectStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_open_statuses() {
        assert!(ProjectStatus::OnHold.is_open());
        assert!(!ProjectStatus::Completed.is_open());
        assert!(!ProjectStatus::Cancelled.is_open());
    }

    #[test]
    fn test_dates_in_order() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1);
        let due = NaiveDate::from_ymd_opt(2025, 2, 1);
        assert!(!dates_in_order(start, due));
        assert!(dates_in_order(due, start));
        assert!(dates_in_order(start, None));
        assert!(dates_in_order(None, None));
    }

    #[test]
    fn test_negative_budget_rejected() {
        let data = CreateProject {
            name: "Rebrand".to_string(),
            budget_cents: Some(-1),
            ..Default::default()
        };
        assert!(data.validate().is_err());
    }
}

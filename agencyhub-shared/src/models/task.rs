/// Tasks inside projects
///
/// # Status Flow
///
/// ```text
/// todo → in_progress → review → done
/// ```
///
/// Any status may be set directly; the board lets cards move freely
/// between columns. Time is tracked against a task with
/// [`crate::models::time_log`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use super::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub estimated_minutes: Option<i32>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTask {
    pub project_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub estimated_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub estimated_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Uuid>,
}

const TASK_COLUMNS: &str = "id, organization_id, project_id, title, description, status, \
     priority, assignee_id, due_date, estimated_minutes, created_by, created_at, updated_at";

impl Task {
    /// Inserts a task; the caller checks the project belongs to the organization
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        created_by: Uuid,
        data: CreateTask,
    ) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks
                (organization_id, project_id, title, description, status, priority,
                 assignee_id, due_date, estimated_minutes, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(data.project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status.unwrap_or(TaskStatus::Todo))
        .bind(data.priority.unwrap_or(TaskPriority::Medium))
        .bind(data.assignee_id)
        .bind(data.due_date)
        .bind(data.estimated_minutes)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        debug!(task_id = %task.id, project_id = %task.project_id, "Task created");
        Ok(task)
    }

    pub async fn find(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
    }

    /// Most urgent first, then by due date
    pub async fn list(
        pool: &PgPool,
        organization_id: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE organization_id = $1 AND deleted_at IS NULL
               AND ($2::uuid IS NULL OR project_id = $2)
               AND ($3::task_status IS NULL OR status = $3)
               AND ($4::uuid IS NULL OR assignee_id = $4)
             ORDER BY priority DESC, due_date ASC NULLS LAST, created_at DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(organization_id)
        .bind(filter.project_id)
        .bind(filter.status)
        .bind(filter.assignee_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                status = COALESCE($5, status),
                priority = COALESCE($6, priority),
                assignee_id = COALESCE($7, assignee_id),
                due_date = COALESCE($8, due_date),
                estimated_minutes = COALESCE($9, estimated_minutes),
                updated_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.assignee_id)
        .bind(data.due_date)
        .bind(data.estimated_minutes)
        .fetch_optional(pool)
        .await
    }

    pub async fn soft_delete(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET deleted_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(organization_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Time tracking against tasks
///
/// A timer is a `time_logs` row whose `end_time` is still NULL. Stopping it
/// stamps `end_time` and stores the whole seconds elapsed.
///
/// # Concurrency
///
/// A partial unique index allows one running row per user and task:
///
/// ```sql
/// CREATE UNIQUE INDEX time_logs_running_key
///     ON time_logs(task_id, user_id) WHERE end_time IS NULL;
/// ```
///
/// [`TimeLog::start`] simply inserts and maps a violation of that index to
/// [`TimerError::AlreadyRunning`], so two concurrent starts cannot both win.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::is_unique_violation;

const RUNNING_TIMER_INDEX: &str = "time_logs_running_key";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeLog {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TimeLog {
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// Seconds counted so far; never negative even with clock skew
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        match (self.duration_seconds, self.end_time) {
            (Some(duration), _) => duration.max(0),
            (None, Some(end)) => (end - self.start_time).num_seconds().max(0),
            (None, None) => (now - self.start_time).num_seconds().max(0),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("A timer is already running for this task")]
    AlreadyRunning,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Snapshot returned by the timer status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TimerStatus {
    pub running: bool,
    pub time_log: Option<TimeLog>,
    /// Seconds on the running timer, 0 when stopped
    pub elapsed_seconds: i64,
    /// Seconds across all finished logs of the task
    pub total_seconds: i64,
}

impl TimerStatus {
    pub fn new(running: Option<TimeLog>, total_seconds: i64, now: DateTime<Utc>) -> Self {
        let elapsed_seconds = running.as_ref().map_or(0, |log| log.elapsed_seconds(now));
        Self {
            running: running.is_some(),
            time_log: running,
            elapsed_seconds,
            total_seconds,
        }
    }
}

const TIME_LOG_COLUMNS: &str =
    "id, organization_id, task_id, user_id, start_time, end_time, duration_seconds, note, created_at";

impl TimeLog {
    /// Starts a timer for `user_id` on `task_id`
    ///
    /// # Errors
    ///
    /// `TimerError::AlreadyRunning` if the user already has one running on the task.
    pub async fn start(
        pool: &PgPool,
        organization_id: Uuid,
        task_id: Uuid,
        user_id: Uuid,
        note: Option<String>,
    ) -> Result<Self, TimerError> {
        let log = sqlx::query_as::<_, TimeLog>(&format!(
            "INSERT INTO time_logs (organization_id, task_id, user_id, note)
             VALUES ($1, $2, $3, $4)
             RETURNING {TIME_LOG_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(task_id)
        .bind(user_id)
        .bind(note)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, Some(RUNNING_TIMER_INDEX)) {
                TimerError::AlreadyRunning
            } else {
                TimerError::Database(e)
            }
        })?;

        info!(time_log_id = %log.id, %task_id, %user_id, "Timer started");
        Ok(log)
    }

    /// Stops the user's running timer on the task
    ///
    /// # Returns
    ///
    /// The closed log, or `None` when no timer was running.
    pub async fn stop(
        pool: &PgPool,
        organization_id: Uuid,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let log = sqlx::query_as::<_, TimeLog>(&format!(
            "UPDATE time_logs
             SET end_time = NOW(),
                 duration_seconds = GREATEST(0, FLOOR(EXTRACT(EPOCH FROM (NOW() - start_time))))::bigint
             WHERE organization_id = $1 AND task_id = $2 AND user_id = $3 AND end_time IS NULL
             RETURNING {TIME_LOG_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        if let Some(ref log) = log {
            info!(
                time_log_id = %log.id,
                %task_id,
                duration_seconds = log.duration_seconds.unwrap_or_default(),
                "Timer stopped"
            );
        } else {
            debug!(%task_id, %user_id, "Stop requested without a running timer");
        }
        Ok(log)
    }

    pub async fn find_running(
        pool: &PgPool,
        organization_id: Uuid,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TimeLog>(&format!(
            "SELECT {TIME_LOG_COLUMNS} FROM time_logs
             WHERE organization_id = $1 AND task_id = $2 AND user_id = $3 AND end_time IS NULL"
        ))
        .bind(organization_id)
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Sum of finished logs on the task, all users
    pub async fn total_seconds_for_task(
        pool: &PgPool,
        organization_id: Uuid,
        task_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(duration_seconds), 0)::bigint FROM time_logs
             WHERE organization_id = $1 AND task_id = $2 AND end_time IS NOT NULL",
        )
        .bind(organization_id)
        .bind(task_id)
        .fetch_one(pool)
        .await
    }

    /// Most recent first
    pub async fn list_for_task(
        pool: &PgPool,
        organization_id: Uuid,
        task_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TimeLog>(&format!(
            "SELECT {TIME_LOG_COLUMNS} FROM time_logs
             WHERE organization_id = $1 AND task_id = $2
             ORDER BY start_time DESC"
        ))
        .bind(organization_id)
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}

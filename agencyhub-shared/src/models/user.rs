/// User accounts
///
/// A user is global; what they can see is decided by their memberships.
/// Accounts created through Google sign-in have no password hash until
/// one is set.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,           -- stored lowercase, unique
///     password_hash VARCHAR(255),
///     name VARCHAR(255),
///     avatar_url VARCHAR(512),
///     google_id VARCHAR(255),                -- unique when present
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ,
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use agencyhub_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "Priya@Studio.example".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     name: Some("Priya Nair".to_string()),
///     ..Default::default()
/// }).await?;
///
/// assert_eq!(user.email, "priya@studio.example");
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2id PHC string; never serialized
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    /// Normalized to lowercase before insert
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub google_id: Option<String>,
}

/// Profile fields that can be changed; outer `None` leaves a field alone,
/// `Some(None)` clears it
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub password_hash: Option<String>,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, avatar_url, google_id, created_at, updated_at, last_login_at";

/// Canonical form of an e-mail address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Inserts a user
    ///
    /// # Errors
    ///
    /// A unique violation on `users_email_key` when the address is taken.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateUser,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, name, avatar_url, google_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(normalize_email(&data.email))
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.avatar_url)
        .bind(data.google_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Case-insensitive lookup by e-mail
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_google_id(
        pool: &PgPool,
        google_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = $1 AND deleted_at IS NULL"
        ))
        .bind(google_id)
        .fetch_optional(pool)
        .await
    }

    /// Attaches a Google account to an existing password account
    ///
    /// The avatar is only filled in when the user has none.
    pub async fn link_google_account(
        pool: &PgPool,
        id: Uuid,
        google_id: &str,
        picture: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET google_id = $2, avatar_url = COALESCE(avatar_url, $3), updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(google_id)
        .bind(picture)
        .fetch_optional(pool)
        .await
    }

    /// Applies the fields present in `data`
    ///
    /// # Returns
    ///
    /// The updated user, or `None` if it does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${bind_count}"));
        }
        if data.avatar_url.is_some() {
            bind_count += 1;
            query.push_str(&format!(", avatar_url = ${bind_count}"));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${bind_count}"));
        }
        query.push_str(&format!(
            " WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);
        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(avatar_url) = data.avatar_url {
            q = q.bind(avatar_url);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }

        q.fetch_optional(pool).await
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Display name, falling back to the e-mail address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

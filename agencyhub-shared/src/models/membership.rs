/// Membership model: which users belong to which organization, and as what
///
/// # Schema
///
/// ```sql
/// CREATE TYPE member_role AS ENUM (
///     'owner', 'admin', 'project_manager', 'team_lead', 'member', 'finance', 'client'
/// );
///
/// CREATE TABLE memberships (
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role member_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (organization_id, user_id)
/// );
/// ```
///
/// What each role may do is defined in [`crate::auth::permissions`].
///
/// # Example
///
/// ```no_run
/// use agencyhub_shared::models::membership::{CreateMembership, Membership, MemberRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, organization_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// Membership::create(&pool, CreateMembership {
///     organization_id,
///     user_id,
///     role: MemberRole::ProjectManager,
/// }).await?;
///
/// let role = Membership::get_role(&pool, organization_id, user_id).await?;
/// assert_eq!(role, Some(MemberRole::ProjectManager));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

/// Role of a user inside one organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Created the organization; cannot be removed while they are the last owner
    Owner,
    Admin,
    ProjectManager,
    TeamLead,
    Member,
    Finance,
    /// External customer with read-only visibility
    Client,
}

impl MemberRole {
    pub const ALL: [MemberRole; 7] = [
        MemberRole::Owner,
        MemberRole::Admin,
        MemberRole::ProjectManager,
        MemberRole::TeamLead,
        MemberRole::Member,
        MemberRole::Finance,
        MemberRole::Client,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::ProjectManager => "project_manager",
            MemberRole::TeamLead => "team_lead",
            MemberRole::Member => "member",
            MemberRole::Finance => "finance",
            MemberRole::Client => "client",
        }
    }

    /// Human readable label for the roles screen
    pub fn label(&self) -> &'static str {
        match self {
            MemberRole::Owner => "Owner",
            MemberRole::Admin => "Admin",
            MemberRole::ProjectManager => "Project Manager",
            MemberRole::TeamLead => "Team Lead",
            MemberRole::Member => "Member",
            MemberRole::Finance => "Finance",
            MemberRole::Client => "Client",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's membership in an organization
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

/// Row of the team list: membership joined with the user's profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberSummary {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

const MEMBERSHIP_COLUMNS: &str = "organization_id, user_id, role, created_at";

impl Membership {
    /// Adds a user to an organization
    ///
    /// Accepts any executor so registration can create the organization,
    /// the user and the owner membership in one transaction.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if the user is already a member, or a
    /// foreign key violation if either side does not exist.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateMembership,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "INSERT INTO memberships (organization_id, user_id, role)
             VALUES ($1, $2, $3)
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(data.organization_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE organization_id = $1 AND user_id = $2"
        ))
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// The user's current role, or `None` if they are not a member
    pub async fn get_role(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT role FROM memberships WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// First organization the user joined; used to scope a fresh sign-in
    pub async fn primary_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships
             WHERE user_id = $1
             ORDER BY created_at ASC
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Changes a member's role; `None` if the membership does not exist
    pub async fn update_role<'e>(
        executor: impl PgExecutor<'e>,
        organization_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(&format!(
            "UPDATE memberships SET role = $3
             WHERE organization_id = $1 AND user_id = $2
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(executor)
        .await
    }

    /// Removes a member; returns false when there was nothing to remove
    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM memberships WHERE organization_id = $1 AND user_id = $2")
                .bind(organization_id)
                .bind(user_id)
                .execute(executor)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Locks the organization's owner rows until the transaction ends
    ///
    /// Rows are locked in `user_id` order so two callers cannot deadlock.
    /// A caller that waited sees the owners as committed by the other one.
    pub async fn lock_owners(
        conn: &mut PgConnection,
        organization_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM memberships
             WHERE organization_id = $1 AND role = 'owner'
             ORDER BY user_id
             FOR UPDATE",
        )
        .bind(organization_id)
        .fetch_all(conn)
        .await
    }

    /// Team list for an organization, owners first, then by name
    pub async fn list_members(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<MemberSummary>, sqlx::Error> {
        sqlx::query_as::<_, MemberSummary>(
            r#"
            SELECT u.id AS user_id, u.email, u.name, u.avatar_url,
                   m.role, m.created_at AS joined_at, u.last_login_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1 AND u.deleted_at IS NULL
            ORDER BY (m.role = 'owner') DESC, u.name ASC NULLS LAST, u.email ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_member(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberSummary>, sqlx::Error> {
        sqlx::query_as::<_, MemberSummary>(
            r#"
            SELECT u.id AS user_id, u.email, u.name, u.avatar_url,
                   m.role, m.created_at AS joined_at, u.last_login_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1 AND m.user_id = $2 AND u.deleted_at IS NULL
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}

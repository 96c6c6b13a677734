/// Clients of the agency
///
/// Projects, invoices and quotations point at a client. Deleting a client
/// is a soft delete so historic invoices keep their reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use super::Page;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateClient {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 64))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateClient {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 64))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Filters for the client list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFilter {
    /// Case-insensitive match on name, company or e-mail
    pub search: Option<String>,
}

const CLIENT_COLUMNS: &str =
    "id, organization_id, name, email, phone, company, address, notes, created_at, updated_at";

impl Client {
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        data: CreateClient,
    ) -> Result<Self, sqlx::Error> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "INSERT INTO clients (organization_id, name, email, phone, company, address, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(data.name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.company)
        .bind(data.address)
        .bind(data.notes)
        .fetch_one(pool)
        .await?;

        debug!(client_id = %client.id, %organization_id, "Client created");
        Ok(client)
    }

    pub async fn find(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
    }

    /// True if the client exists in the organization; used to validate references
    pub async fn exists(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM clients
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL)",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_one(pool)
        .await
    }

    /// Clients ordered by name
    pub async fn list(
        pool: &PgPool,
        organization_id: Uuid,
        filter: &ClientFilter,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients
             WHERE organization_id = $1 AND deleted_at IS NULL
               AND ($2::text IS NULL
                    OR name ILIKE '%' || $2 || '%'
                    OR company ILIKE '%' || $2 || '%'
                    OR email ILIKE '%' || $2 || '%')
             ORDER BY name ASC
             LIMIT $3 OFFSET $4"
        ))
        .bind(organization_id)
        .bind(filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        data: UpdateClient,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>(&format!(
            "UPDATE clients SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                company = COALESCE($6, company),
                address = COALESCE($7, address),
                notes = COALESCE($8, notes),
                updated_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(data.name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.company)
        .bind(data.address)
        .bind(data.notes)
        .fetch_optional(pool)
        .await
    }

    /// Marks the client deleted; false if it was not found
    pub async fn soft_delete(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE clients SET deleted_at = NOW()
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
    fn test_create_client_validation() {
        let ok = CreateClient {
            name: "Harbor Coffee".to_string(),
            email: Some("hello@harbor.example".to_string()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_email = CreateClient {
            email: Some("not-an-email".to_string()),
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let blank = CreateClient {
            name: String::new(),
            ..ok
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_update_client_allows_partial_body() {
        let update: UpdateClient = serde_json::from_str(r#"{"phone":"+1 555 0100"}"#).unwrap();
        assert!(update.validate().is_ok());
        assert!(update.name.is_none());
    }
}

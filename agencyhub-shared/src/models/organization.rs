/// Organizations: the tenant boundary
///
/// Every client, project, task, invoice and quotation belongs to exactly one
/// organization, and every query against those tables filters on it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organizations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(255) NOT NULL UNIQUE,
///     settings JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{types::Json, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// Free-form preferences (currency, invoice footer, branding)
    pub settings: Json<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOrganization {
    pub name: String,
    pub settings: Option<JsonValue>,
}

/// `settings` is merged into the stored object key by key
#[derive(Debug, Clone, Default)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub settings: Option<JsonValue>,
}

const ORGANIZATION_COLUMNS: &str = "id, name, slug, settings, created_at, updated_at";

/// URL-safe slug: lowercase ASCII words joined by single dashes
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "org".to_string()
    } else {
        slug.chars().take(48).collect::<String>().trim_end_matches('-').to_string()
    }
}

/// Slug with a short random suffix so two agencies may share a name
pub fn unique_slug(name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slugify(name), &suffix[..6])
}

impl Organization {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateOrganization,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "INSERT INTO organizations (name, slug, settings)
             VALUES ($1, $2, $3)
             RETURNING {ORGANIZATION_COLUMNS}"
        ))
        .bind(data.name.trim())
        .bind(unique_slug(&data.name))
        .bind(Json(data.settings.unwrap_or_else(|| serde_json::json!({}))))
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations
             WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Renames the organization and/or merges new settings keys
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateOrganization,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE organizations SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${bind_count}"));
        }
        if data.settings.is_some() {
            bind_count += 1;
            query.push_str(&format!(", settings = settings || ${bind_count}"));
        }
        query.push_str(&format!(
            " WHERE id = $1 AND deleted_at IS NULL RETURNING {ORGANIZATION_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, Organization>(&query).bind(id);
        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(settings) = data.settings {
            q = q.bind(Json(settings));
        }

        q.fetch_optional(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Bright Pixel Studio"), "bright-pixel-studio");
        assert_eq!(slugify("  Acme & Co.  "), "acme-co");
        assert_eq!(slugify("Ünïcode Agency"), "n-code-agency");
        assert_eq!(slugify("!!!"), "org");
    }

    #[test]
    fn test_slugify_truncates_long_names() {
        let slug = slugify(&"very long agency name ".repeat(10));
        assert!(slug.len() <= 48);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_unique_slug_has_suffix() {
        let first = unique_slug("Northwind");
        let second = unique_slug("Northwind");
        assert!(first.starts_with("northwind-"));
        assert_eq!(first.len(), "northwind-".len() + 6);
        assert_ne!(first, second);
    }
}

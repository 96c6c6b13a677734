/// Quotations
///
/// A quotation prices proposed work for a client. Once the client accepts
/// it, it can be converted into a project whose budget is the quoted total.
///
/// # State Machine
///
/// ```text
/// draft ──→ sent ──→ accepted ──→ converted
///   │        │  │       │
///   │        │  └→ expired ──→ sent
///   │        └───→ rejected ←──┘
///   └→ accepted | rejected
/// ```
///
/// `rejected` and `converted` are terminal. `converted` is only reachable
/// through [`Quotation::convert_to_project`], never through a plain status
/// change.
///
/// # Example
///
/// ```no_run
/// use agencyhub_shared::models::quotation::{Quotation, QuotationStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org: Uuid, id: Uuid, user: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// Quotation::update_status(&pool, org, id, QuotationStatus::Accepted).await?;
/// let (quotation, project) = Quotation::convert_to_project(&pool, org, id, user).await?;
/// assert_eq!(quotation.project_id, Some(project.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::billing::{compute_totals, format_document_number, next_sequence, BillingError, LineItem};
use super::project::Project;
use super::Page;

pub const QUOTATION_PREFIX: &str = "QUO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quotation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Converted,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
            QuotationStatus::Converted => "converted",
        }
    }

    /// Whether a status change request may move from `self` to `next`
    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;

        matches!(
            (self, next),
            (Draft, Sent | Accepted | Rejected)
                | (Sent, Accepted | Rejected | Expired)
                | (Accepted, Rejected)
                | (Expired, Sent)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuotationStatus::Rejected | QuotationStatus::Converted)
    }
}

/// Failures of quotation operations that are not plain database errors
#[derive(Debug, thiserror::Error)]
pub enum QuotationError {
    #[error("Quotation not found")]
    NotFound,

    #[error("Cannot change quotation status from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        from: QuotationStatus,
        to: QuotationStatus,
    },

    #[error("Quotation has already been converted to a project")]
    AlreadyConverted,

    #[error("Only accepted quotations can be converted (status is {})", .0.as_str())]
    NotAccepted(QuotationStatus),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quotation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    /// Set once converted
    pub project_id: Option<Uuid>,
    pub quotation_number: String,
    pub title: String,
    pub description: Option<String>,
    pub status: QuotationStatus,
    pub valid_until: Option<NaiveDate>,
    pub items: Json<Vec<LineItem>>,
    pub tax_rate_bps: i32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuotation {
    pub client_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub quotation_number: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub valid_until: Option<NaiveDate>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[validate(range(min = 0, max = 10_000))]
    #[serde(default)]
    pub tax_rate_bps: i32,
}

/// Editable content; status has its own operation
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuotation {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub valid_until: Option<NaiveDate>,
    #[validate(nested)]
    pub items: Option<Vec<LineItem>>,
    #[validate(range(min = 0, max = 10_000))]
    pub tax_rate_bps: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotationFilter {
    pub status: Option<QuotationStatus>,
    pub client_id: Option<Uuid>,
}

const QUOTATION_COLUMNS: &str = "id, organization_id, client_id, project_id, quotation_number, \
     title, description, status, valid_until, items, tax_rate_bps, subtotal_cents, tax_cents, \
     total_cents, created_by, created_at, updated_at";

impl Quotation {
    /// Inserts a draft quotation with computed totals
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        created_by: Uuid,
        data: CreateQuotation,
    ) -> Result<Self, BillingError> {
        let quotation_number = match data.quotation_number {
            Some(number) => number,
            None => {
                let year = Utc::now().year();
                let seq = next_sequence(
                    pool,
                    "quotations",
                    "quotation_number",
                    organization_id,
                    QUOTATION_PREFIX,
                    year,
                )
                .await?;
                format_document_number(QUOTATION_PREFIX, year, seq)
            }
        };
        let totals = compute_totals(&data.items, data.tax_rate_bps)?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "INSERT INTO quotations
                (organization_id, client_id, quotation_number, title, description, valid_until,
                 items, tax_rate_bps, subtotal_cents, tax_cents, total_cents, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {QUOTATION_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(data.client_id)
        .bind(&quotation_number)
        .bind(data.title)
        .bind(data.description)
        .bind(data.valid_until)
        .bind(Json(&data.items))
        .bind(data.tax_rate_bps)
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        info!(quotation_id = %quotation.id, %quotation_number, %organization_id, "Quotation created");
        Ok(quotation)
    }

    pub async fn find(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        organization_id: Uuid,
        filter: &QuotationFilter,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations
             WHERE organization_id = $1 AND deleted_at IS NULL
               AND ($2::quotation_status IS NULL OR status = $2)
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

    /// Edits content and recomputes totals
    ///
    /// # Errors
    ///
    /// `QuotationError::AlreadyConverted` for a converted quotation; its
    /// price is frozen into the project budget.
    pub async fn update(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        data: UpdateQuotation,
    ) -> Result<Self, QuotationError> {
        let current = Self::find(pool, organization_id, id)
            .await?
            .ok_or(QuotationError::NotFound)?;
        if current.status == QuotationStatus::Converted {
            return Err(QuotationError::AlreadyConverted);
        }

        let items = data.items.unwrap_or_else(|| current.items.0.clone());
        let tax_rate_bps = data.tax_rate_bps.unwrap_or(current.tax_rate_bps);
        let totals = compute_totals(&items, tax_rate_bps)?;

        sqlx::query_as::<_, Quotation>(&format!(
            "UPDATE quotations SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                valid_until = COALESCE($5, valid_until),
                items = $6,
                tax_rate_bps = $7,
                subtotal_cents = $8,
                tax_cents = $9,
                total_cents = $10,
                updated_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
               AND status <> 'converted'
             RETURNING {QUOTATION_COLUMNS}"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.valid_until)
        .bind(Json(&items))
        .bind(tax_rate_bps)
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .fetch_optional(pool)
        .await?
        .ok_or(QuotationError::NotFound)
    }

    /// Moves the quotation along the state machine
    ///
    /// The update is conditional on the status read, so a concurrent change
    /// makes this one fail rather than skip a state.
    ///
    /// # Errors
    ///
    /// - `QuotationError::NotFound`
    /// - `QuotationError::AlreadyConverted` for a converted quotation
    /// - `QuotationError::InvalidTransition` for any move the machine forbids
    pub async fn update_status(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        next: QuotationStatus,
    ) -> Result<Self, QuotationError> {
        let current = Self::find(pool, organization_id, id)
            .await?
            .ok_or(QuotationError::NotFound)?;

        if current.status == QuotationStatus::Converted {
            return Err(QuotationError::AlreadyConverted);
        }
        if !current.status.can_transition_to(next) {
            return Err(QuotationError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        let updated = sqlx::query_as::<_, Quotation>(&format!(
            "UPDATE quotations SET status = $4, updated_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND status = $3 AND deleted_at IS NULL
             RETURNING {QUOTATION_COLUMNS}"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(current.status)
        .bind(next)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(quotation) => {
                info!(
                    quotation_id = %id,
                    from = current.status.as_str(),
                    to = next.as_str(),
                    "Quotation status changed"
                );
                Ok(quotation)
            }
            None => {
                warn!(quotation_id = %id, "Quotation status changed concurrently");
                Err(QuotationError::InvalidTransition {
                    from: current.status,
                    to: next,
                })
            }
        }
    }

    /// Creates a project from an accepted quotation and marks it converted
    ///
    /// Runs in one transaction holding a row lock on the quotation, so two
    /// concurrent conversions produce exactly one project.
    ///
    /// # Errors
    ///
    /// - `QuotationError::NotFound`
    /// - `QuotationError::AlreadyConverted` if it was converted before
    /// - `QuotationError::NotAccepted` for any other status
    pub async fn convert_to_project(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        actor_id: Uuid,
    ) -> Result<(Self, Project), QuotationError> {
        let mut tx = pool.begin().await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(QuotationError::NotFound)?;

        match quotation.status {
            QuotationStatus::Accepted => {}
            QuotationStatus::Converted => return Err(QuotationError::AlreadyConverted),
            other => return Err(QuotationError::NotAccepted(other)),
        }

        let project = Project::create_from_quotation(&mut tx, &quotation, actor_id).await?;
        let quotation = Self::mark_converted(&mut tx, &quotation, project.id).await?;

        tx.commit().await?;
        Ok((quotation, project))
    }

    /// Sets status `converted` and links the project
    pub async fn mark_converted(
        conn: &mut sqlx::PgConnection,
        quotation: &Quotation,
        project_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Quotation>(&format!(
            "UPDATE quotations SET status = 'converted', project_id = $3, updated_at = NOW()
             WHERE id = $1 AND organization_id = $2
             RETURNING {QUOTATION_COLUMNS}"
        ))
        .bind(quotation.id)
        .bind(quotation.organization_id)
        .bind(project_id)
        .fetch_one(conn)
        .await
    }

    pub async fn soft_delete(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE quotations SET deleted_at = NOW()
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
    use QuotationStatus::*;

    const ALL: [QuotationStatus; 6] = [Draft, Sent, Accepted, Rejected, Expired, Converted];

    #[test]
    fn test_allowed_transitions() {
        let allowed = [
            (Draft, Sent),
            (Draft, Accepted),
            (Draft, Rejected),
            (Sent, Accepted),
            (Sent, Rejected),
            (Sent, Expired),
            (Accepted, Rejected),
            (Expired, Sent),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from.as_str(),
                    to.as_str()
                );
            }
        }
    }

    #[test]
    fn test_converted_only_via_conversion() {
        for from in ALL {
            assert!(!from.can_transition_to(Converted));
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(QuotationStatus::is_terminal) {
            assert!(ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_error_messages() {
        let err = QuotationError::InvalidTransition { from: Rejected, to: Sent };
        assert_eq!(err.to_string(), "Cannot change quotation status from rejected to sent");
        assert!(QuotationError::NotAccepted(Draft).to_string().contains("status is draft"));
    }
}

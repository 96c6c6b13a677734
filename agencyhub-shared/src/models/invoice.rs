/// Invoices
///
/// Line items are stored as JSONB; the subtotal, tax and total columns are
/// always recomputed from them on write so the stored amounts cannot drift.
/// Numbers default to `INV-<year>-<seq>` and are unique per organization.
///
/// # Status
///
/// `draft`, `sent`, `paid`, `overdue`, `cancelled`. Moving to `paid` stamps
/// `paid_at`, which drives the revenue report; moving away from `paid`
/// clears it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::billing::{compute_totals, format_document_number, next_sequence, BillingError, LineItem};
use super::Page;

pub const INVOICE_PREFIX: &str = "INV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Sent or overdue invoices are money the agency is still owed
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub items: Json<Vec<LineItem>>,
    pub tax_rate_bps: i32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    /// Generated when absent
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: Option<String>,
    pub status: Option<InvoiceStatus>,
    /// Defaults to today
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[validate(range(min = 0, max = 10_000))]
    #[serde(default)]
    pub tax_rate_bps: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInvoice {
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Replaces every line item
    #[validate(nested)]
    pub items: Option<Vec<LineItem>>,
    #[validate(range(min = 0, max = 10_000))]
    pub tax_rate_bps: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

const INVOICE_COLUMNS: &str = "id, organization_id, client_id, project_id, invoice_number, status, \
     issue_date, due_date, items, tax_rate_bps, subtotal_cents, tax_cents, total_cents, notes, \
     paid_at, created_by, created_at, updated_at";

impl Invoice {
    /// Inserts an invoice with computed totals
    ///
    /// # Errors
    ///
    /// - A unique violation on `invoices_number_key` if the number is taken
    /// - `BillingError::AmountTooLarge` if the totals overflow
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        created_by: Uuid,
        data: CreateInvoice,
    ) -> Result<Self, BillingError> {
        let issue_date = data.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let invoice_number = match data.invoice_number {
            Some(number) => number,
            None => {
                let year = issue_date.year();
                let seq = next_sequence(
                    pool,
                    "invoices",
                    "invoice_number",
                    organization_id,
                    INVOICE_PREFIX,
                    year,
                )
                .await?;
                format_document_number(INVOICE_PREFIX, year, seq)
            }
        };
        let totals = compute_totals(&data.items, data.tax_rate_bps)?;
        let status = data.status.unwrap_or(InvoiceStatus::Draft);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "INSERT INTO invoices
                (organization_id, client_id, project_id, invoice_number, status, issue_date,
                 due_date, items, tax_rate_bps, subtotal_cents, tax_cents, total_cents,
                 notes, paid_at, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                     CASE WHEN $5 = 'paid'::invoice_status THEN NOW() END, $14)
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(organization_id)
        .bind(data.client_id)
        .bind(data.project_id)
        .bind(&invoice_number)
        .bind(status)
        .bind(issue_date)
        .bind(data.due_date)
        .bind(Json(&data.items))
        .bind(data.tax_rate_bps)
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(data.notes)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        info!(
            invoice_id = %invoice.id,
            %invoice_number,
            %organization_id,
            total_cents = invoice.total_cents,
            "Invoice created"
        );
        Ok(invoice)
    }

    pub async fn find(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await
    }

    /// Newest issue date first
    pub async fn list(
        pool: &PgPool,
        organization_id: Uuid,
        filter: &InvoiceFilter,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices
             WHERE organization_id = $1 AND deleted_at IS NULL
               AND ($2::invoice_status IS NULL OR status = $2)
               AND ($3::uuid IS NULL OR client_id = $3)
               AND ($4::uuid IS NULL OR project_id = $4)
             ORDER BY issue_date DESC, created_at DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(organization_id)
        .bind(filter.status)
        .bind(filter.client_id)
        .bind(filter.project_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await
    }

    /// Applies the change and recomputes totals when items or tax rate change
    pub async fn update(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
        data: UpdateInvoice,
    ) -> Result<Option<Self>, BillingError> {
        let Some(current) = Self::find(pool, organization_id, id).await? else {
            return Ok(None);
        };

        let items = data.items.unwrap_or_else(|| current.items.0.clone());
        let tax_rate_bps = data.tax_rate_bps.unwrap_or(current.tax_rate_bps);
        let totals = compute_totals(&items, tax_rate_bps)?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices SET
                status = COALESCE($3, status),
                issue_date = COALESCE($4, issue_date),
                due_date = COALESCE($5, due_date),
                items = $6,
                tax_rate_bps = $7,
                subtotal_cents = $8,
                tax_cents = $9,
                total_cents = $10,
                notes = COALESCE($11, notes),
                paid_at = CASE
                    WHEN $3 IS NULL THEN paid_at
                    WHEN $3 = 'paid'::invoice_status THEN COALESCE(paid_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(data.status)
        .bind(data.issue_date)
        .bind(data.due_date)
        .bind(Json(&items))
        .bind(tax_rate_bps)
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(data.notes)
        .fetch_optional(pool)
        .await?;

        if let (Some(updated), Some(status)) = (&invoice, data.status) {
            if status != current.status {
                info!(
                    invoice_id = %updated.id,
                    from = current.status.as_str(),
                    to = status.as_str(),
                    "Invoice status changed"
                );
            }
        }
        Ok(invoice)
    }

    pub async fn soft_delete(
        pool: &PgPool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invoices SET deleted_at = NOW()
             WHERE id = $1 AND organization_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(organization_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

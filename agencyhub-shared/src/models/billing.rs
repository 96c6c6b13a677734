/// Line items, totals and document numbers shared by invoices and quotations
///
/// Money is integer cents throughout. Quantities may be fractional (hours
/// of work), so each line amount is rounded to the nearest cent once, and
/// tax is computed from the rounded subtotal with half-up rounding.

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

/// Largest tax rate accepted, in basis points (100%)
pub const MAX_TAX_RATE_BPS: i32 = 10_000;

/// Largest unit price accepted on a line item
pub const MAX_UNIT_PRICE_CENTS: i64 = 100_000_000_000;

/// Failures while pricing or storing an invoice or quotation
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Line item amounts exceed the largest representable total")]
    AmountTooLarge,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// One billable line on an invoice or quotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LineItem {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(range(min = 0.0, max = 1_000_000.0))]
    pub quantity: f64,
    #[validate(range(min = 0, max = 100_000_000_000i64))]
    pub unit_price_cents: i64,
}

impl LineItem {
    /// Rounded line amount, `None` when it does not fit in an `i64`
    pub fn amount_cents(&self) -> Option<i64> {
        let amount = (self.quantity * self.unit_price_cents as f64).round();
        // i64::MAX as f64 rounds up to 2^63, so the bound is exclusive
        (amount.is_finite() && amount.abs() < i64::MAX as f64).then_some(amount as i64)
    }
}

/// Computed amounts for a set of line items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Sums the line items and applies `tax_rate_bps` (1% = 100 bps)
///
/// # Example
///
/// ```
/// use agencyhub_shared::models::billing::{compute_totals, LineItem};
///
/// let items = vec![
///     LineItem { description: "Design".into(), quantity: 12.5, unit_price_cents: 9_000 },
///     LineItem { description: "Hosting".into(), quantity: 1.0, unit_price_cents: 4_999 },
/// ];
/// let totals = compute_totals(&items, 2_000).unwrap();
/// assert_eq!(totals.subtotal_cents, 117_499);
/// assert_eq!(totals.tax_cents, 23_500);
/// assert_eq!(totals.total_cents, 140_999);
/// ```
///
/// # Errors
///
/// `BillingError::AmountTooLarge` when a line, the subtotal or the total
/// overflows.
pub fn compute_totals(items: &[LineItem], tax_rate_bps: i32) -> Result<Totals, BillingError> {
    let subtotal_cents = items.iter().try_fold(0i64, |sum, item| {
        item.amount_cents()
            .and_then(|amount| sum.checked_add(amount))
            .ok_or(BillingError::AmountTooLarge)
    })?;

    let rate = i128::from(tax_rate_bps.clamp(0, MAX_TAX_RATE_BPS));
    let tax_cents = i64::try_from((i128::from(subtotal_cents) * rate + 5_000) / 10_000)
        .map_err(|_| BillingError::AmountTooLarge)?;
    let total_cents = subtotal_cents
        .checked_add(tax_cents)
        .ok_or(BillingError::AmountTooLarge)?;

    Ok(Totals {
        subtotal_cents,
        tax_cents,
        total_cents,
    })
}

/// Formats a document number such as `INV-2025-0042`
///
/// The sequence is zero-padded to four digits and simply grows past 9999.
pub fn format_document_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:04}")
}

/// Parses the sequence part of a number produced by [`format_document_number`]
pub fn parse_document_sequence(number: &str, prefix: &str, year: i32) -> Option<i64> {
    number
        .strip_prefix(&format!("{prefix}-{year}-"))
        .and_then(|rest| rest.parse().ok())
}

/// Next free sequence for `prefix` and `year` within an organization
///
/// Soft-deleted documents still hold their numbers, so they are counted.
/// Two concurrent creates can pick the same number; the unique constraint
/// rejects the second one.
pub(crate) async fn next_sequence<'e>(
    executor: impl PgExecutor<'e>,
    table: &'static str,
    column: &'static str,
    organization_id: Uuid,
    prefix: &str,
    year: i32,
) -> Result<i64, sqlx::Error> {
    let last: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(MAX(SUBSTRING({column} FROM $2)::bigint), 0)
         FROM {table}
         WHERE organization_id = $1 AND {column} ~ $2"
    ))
    .bind(organization_id)
    .bind(format!("^{prefix}-{year}-([0-9]+)$"))
    .fetch_one(executor)
    .await?;

    Ok(last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: f64, unit_price_cents: i64) -> LineItem {
        LineItem {
            description: "Work".to_string(),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn test_empty_items_total_zero() {
        assert_eq!(compute_totals(&[], 2_000).unwrap(), Totals::default());
    }

    #[test]
    fn test_fractional_quantity_rounds_per_line() {
        // 0.333 h at 100.00 = 33.30
        assert_eq!(item(0.333, 10_000).amount_cents(), Some(3_330));
        // 1.5 units at 0.33 = 0.495, rounds half away from zero
        assert_eq!(item(1.5, 33).amount_cents(), Some(50));
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 0.125 * 1000 = 125 → 12.5 cents tax rounds to 13
        let totals = compute_totals(&[item(1.0, 125)], 1_000).unwrap();
        assert_eq!(totals.tax_cents, 13);
        assert_eq!(totals.total_cents, 138);
    }

    #[test]
    fn test_tax_rate_is_clamped() {
        let totals = compute_totals(&[item(1.0, 1_000)], 25_000).unwrap();
        assert_eq!(totals.tax_cents, 1_000);

        let totals = compute_totals(&[item(1.0, 1_000)], -5).unwrap();
        assert_eq!(totals.tax_cents, 0);
    }

    #[test]
    fn test_document_numbers() {
        assert_eq!(format_document_number("INV", 2025, 7), "INV-2025-0007");
        assert_eq!(format_document_number("QUO", 2025, 12_345), "QUO-2025-12345");
        assert_eq!(parse_document_sequence("INV-2025-0007", "INV", 2025), Some(7));
        assert_eq!(parse_document_sequence("INV-2024-0007", "INV", 2025), None);
        assert_eq!(parse_document_sequence("custom-1", "INV", 2025), None);
    }

    #[test]
    fn test_line_item_validation() {
        assert!(item(2.0, 500).validate().is_ok());
        assert!(item(-1.0, 500).validate().is_err());
        assert!(item(1.0, -1).validate().is_err());
        assert!(item(1.0, MAX_UNIT_PRICE_CENTS).validate().is_ok());
        assert!(item(1.0, MAX_UNIT_PRICE_CENTS + 1).validate().is_err());

        let mut blank = item(1.0, 500);
        blank.description.clear();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_largest_valid_line_is_priced() {
        let top = item(1_000_000.0, MAX_UNIT_PRICE_CENTS);
        assert!(top.validate().is_ok());

        let totals = compute_totals(&[top], MAX_TAX_RATE_BPS).unwrap();
        assert_eq!(totals.subtotal_cents, 100_000_000_000_000_000);
        assert_eq!(totals.tax_cents, 100_000_000_000_000_000);
        assert_eq!(totals.total_cents, 200_000_000_000_000_000);
    }

    #[test]
    fn test_overflowing_amounts_are_rejected() {
        // Each line fits, the sum does not
        let items = vec![item(1_000_000.0, MAX_UNIT_PRICE_CENTS); 100];
        assert!(matches!(
            compute_totals(&items, 0),
            Err(BillingError::AmountTooLarge)
        ));

        // Subtotal fits, subtotal plus tax does not
        let items = vec![item(1_000_000.0, MAX_UNIT_PRICE_CENTS); 50];
        assert!(matches!(
            compute_totals(&items, MAX_TAX_RATE_BPS),
            Err(BillingError::AmountTooLarge)
        ));

        // Unvalidated input still fails cleanly instead of wrapping
        assert_eq!(item(1.0e12, i64::MAX / 1_000).amount_cents(), None);
        assert!(compute_totals(&[item(1.0, i64::MAX / 1_000)], 2_000).is_ok());
    }
}

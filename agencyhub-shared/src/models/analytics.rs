/// Dashboard analytics
///
/// Read-only aggregates over an organization's data. Revenue is the total
/// of invoices marked paid, bucketed by the month of `paid_at` (UTC).

use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Number of months in the revenue series, current month included
pub const REVENUE_MONTHS: u32 = 7;

/// Counters shown at the top of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DashboardSummary {
    pub active_projects: i64,
    pub open_tasks: i64,
    pub overdue_tasks: i64,
    pub clients: i64,
    pub team_members: i64,
    /// Sent and overdue invoices
    pub outstanding_invoice_cents: i64,
    pub revenue_this_month_cents: i64,
    /// Quotations sent but not yet answered
    pub pending_quotations: i64,
}

/// One point of the revenue chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue_cents: i64,
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Expands sparse `(month_start, cents)` rows into a dense series
///
/// Returns `months` entries, oldest first, ending with the month of
/// `today`. Months without a row get zero.
pub fn fill_revenue_series(
    rows: &[(NaiveDate, i64)],
    today: NaiveDate,
    months: u32,
) -> Vec<MonthlyRevenue> {
    let current = month_start(today);

    (0..months)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .map(|month| MonthlyRevenue {
            month: month.format("%Y-%m").to_string(),
            revenue_cents: rows
                .iter()
                .filter(|(row_month, _)| month_start(*row_month) == month)
                .map(|(_, cents)| *cents)
                .sum(),
        })
        .collect()
}

/// Aggregate counters for the organization's dashboard
pub async fn dashboard_summary(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<DashboardSummary, sqlx::Error> {
    sqlx::query_as::<_, DashboardSummary>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM projects
              WHERE organization_id = $1 AND deleted_at IS NULL AND status = 'active')
                AS active_projects,
            (SELECT COUNT(*) FROM tasks
              WHERE organization_id = $1 AND deleted_at IS NULL AND status <> 'done')
                AS open_tasks,
            (SELECT COUNT(*) FROM tasks
              WHERE organization_id = $1 AND deleted_at IS NULL AND status <> 'done'
                AND due_date < CURRENT_DATE)
                AS overdue_tasks,
            (SELECT COUNT(*) FROM clients
              WHERE organization_id = $1 AND deleted_at IS NULL)
                AS clients,
            (SELECT COUNT(*) FROM memberships
              WHERE organization_id = $1)
                AS team_members,
            (SELECT COALESCE(SUM(total_cents), 0)::bigint FROM invoices
              WHERE organization_id = $1 AND deleted_at IS NULL
                AND status IN ('sent', 'overdue'))
                AS outstanding_invoice_cents,
            (SELECT COALESCE(SUM(total_cents), 0)::bigint FROM invoices
              WHERE organization_id = $1 AND deleted_at IS NULL AND status = 'paid'
                AND paid_at >= date_trunc('month', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC')
                AS revenue_this_month_cents,
            (SELECT COUNT(*) FROM quotations
              WHERE organization_id = $1 AND deleted_at IS NULL AND status = 'sent')
                AS pending_quotations
        "#,
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await
}

/// Paid revenue for the last [`REVENUE_MONTHS`] months, oldest first
pub async fn monthly_revenue(
    pool: &PgPool,
    organization_id: Uuid,
) -> Result<Vec<MonthlyRevenue>, sqlx::Error> {
    let today = Utc::now().date_naive();
    let first_month = month_start(today)
        .checked_sub_months(Months::new(REVENUE_MONTHS - 1))
        .unwrap_or(today);

    let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
        r#"
        SELECT date_trunc('month', paid_at AT TIME ZONE 'UTC')::date AS month,
               COALESCE(SUM(total_cents), 0)::bigint AS revenue_cents
        FROM invoices
        WHERE organization_id = $1 AND deleted_at IS NULL AND status = 'paid'
          AND paid_at >= $2::date
        GROUP BY 1
        "#,
    )
    .bind(organization_id)
    .bind(first_month)
    .fetch_all(pool)
    .await?;

    Ok(fill_revenue_series(&rows, today, REVENUE_MONTHS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_series_has_seven_months_ending_now() {
        let series = fill_revenue_series(&[], date(2025, 3, 18), REVENUE_MONTHS);
        let months: Vec<&str> = series.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(
            months,
            ["2024-09", "2024-10", "2024-11", "2024-12", "2025-01", "2025-02", "2025-03"]
        );
        assert!(series.iter().all(|m| m.revenue_cents == 0));
    }

    #[test]
    fn test_rows_land_in_their_month() {
        let rows = [(date(2025, 1, 1), 120_000), (date(2025, 3, 1), 45_500)];
        let series = fill_revenue_series(&rows, date(2025, 3, 31), REVENUE_MONTHS);

        assert_eq!(series[4].month, "2025-01");
        assert_eq!(series[4].revenue_cents, 120_000);
        assert_eq!(series[5].revenue_cents, 0);
        assert_eq!(series[6].revenue_cents, 45_500);
    }

    #[test]
    fn test_rows_outside_window_ignored() {
        let rows = [(date(2024, 1, 1), 99_999)];
        let series = fill_revenue_series(&rows, date(2025, 3, 1), REVENUE_MONTHS);
        assert_eq!(series.iter().map(|m| m.revenue_cents).sum::<i64>(), 0);
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(date(2024, 2, 29)), date(2024, 2, 1));
    }
}

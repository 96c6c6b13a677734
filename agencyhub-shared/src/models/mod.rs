/// Database models for Agencyhub
///
/// Each model owns its SQL. Tenant-owned models take the caller's
/// `organization_id` on every operation and treat rows of other
/// organizations, and soft-deleted rows, as absent.
///
/// # Models
///
/// - `organization`: the tenant itself
/// - `user`: global accounts
/// - `membership`: user ↔ organization with a role
/// - `client`: the agency's customers
/// - `project`: engagements, optionally created from a quotation
/// - `task`: work items inside a project
/// - `time_log`: start/stop timers against tasks
/// - `invoice`: billed work, auto-numbered `INV-YYYY-NNNN`
/// - `quotation`: priced proposals, auto-numbered `QUO-YYYY-NNNN`
/// - `billing`: line items, totals and numbering shared by the two above
/// - `analytics`: dashboard counters and the monthly revenue series

use serde::Deserialize;

pub mod analytics;
pub mod billing;
pub mod client;
pub mod invoice;
pub mod membership;
pub mod organization;
pub mod project;
pub mod quotation;
pub mod task;
pub mod time_log;
pub mod user;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// `limit` / `offset` paging accepted by every list operation
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Limit clamped to `1..=200`, defaulting to 50
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// In-process activity feed
///
/// Handlers publish an [`ActivityEvent`] after a successful write and the
/// `/api/events` stream forwards the ones belonging to the subscriber's
/// organization. Delivery is best effort: the channel is bounded and a
/// subscriber that falls behind skips the events it missed.
///
/// # Example
///
/// ```
/// use agencyhub_shared::events::{ActivityEvent, ActivityKind, EventHub};
/// use uuid::Uuid;
///
/// let hub = EventHub::default();
/// let mut rx = hub.subscribe();
///
/// let org = Uuid::new_v4();
/// hub.publish(ActivityEvent::new(org, ActivityKind::ClientCreated, Uuid::new_v4(), Uuid::new_v4()));
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.organization_id, org);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::auth::permissions::Permission;

/// Buffered events per subscriber before it starts lagging
pub const DEFAULT_CAPACITY: usize = 256;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ClientCreated,
    ClientUpdated,
    ClientDeleted,
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TimerStarted,
    TimerStopped,
    InvoiceCreated,
    InvoiceUpdated,
    InvoiceDeleted,
    QuotationCreated,
    QuotationUpdated,
    QuotationStatusChanged,
    QuotationConverted,
    QuotationDeleted,
    MemberAdded,
    MemberRoleChanged,
    MemberRemoved,
    OrganizationUpdated,
}

impl ActivityKind {
    /// SSE event name, e.g. `task_created`
    pub fn as_str(&self) -> &'static str {
        use ActivityKind::*;
        match self {
            ClientCreated => "client_created",
            ClientUpdated => "client_updated",
            ClientDeleted => "client_deleted",
            ProjectCreated => "project_created",
            ProjectUpdated => "project_updated",
            ProjectDeleted => "project_deleted",
            TaskCreated => "task_created",
            TaskUpdated => "task_updated",
            TaskDeleted => "task_deleted",
            TimerStarted => "timer_started",
            TimerStopped => "timer_stopped",
            InvoiceCreated => "invoice_created",
            InvoiceUpdated => "invoice_updated",
            InvoiceDeleted => "invoice_deleted",
            QuotationCreated => "quotation_created",
            QuotationUpdated => "quotation_updated",
            QuotationStatusChanged => "quotation_status_changed",
            QuotationConverted => "quotation_converted",
            QuotationDeleted => "quotation_deleted",
            MemberAdded => "member_added",
            MemberRoleChanged => "member_role_changed",
            MemberRemoved => "member_removed",
            OrganizationUpdated => "organization_updated",
        }
    }

    /// Permission a subscriber needs to see this event; `None` for any member
    pub fn required_permission(&self) -> Option<Permission> {
        use ActivityKind::*;
        match self {
            ClientCreated | ClientUpdated | ClientDeleted => Some(Permission::ClientsRead),
            ProjectCreated | ProjectUpdated | ProjectDeleted => Some(Permission::ProjectsRead),
            TaskCreated | TaskUpdated | TaskDeleted | TimerStarted | TimerStopped => {
                Some(Permission::TasksRead)
            }
            InvoiceCreated | InvoiceUpdated | InvoiceDeleted => Some(Permission::InvoicesRead),
            QuotationCreated | QuotationUpdated | QuotationStatusChanged | QuotationConverted
            | QuotationDeleted => Some(Permission::QuotationsRead),
            MemberAdded | MemberRoleChanged | MemberRemoved => Some(Permission::UsersRead),
            OrganizationUpdated => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub organization_id: Uuid,
    pub kind: ActivityKind,
    /// Row the event is about
    pub entity_id: Uuid,
    /// User whose request caused it
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(organization_id: Uuid, kind: ActivityKind, entity_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            organization_id,
            kind,
            entity_id,
            actor_id,
            at: Utc::now(),
        }
    }
}

/// Fan-out of activity events to every open stream
///
/// Cloning is cheap; clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<ActivityEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends to current subscribers; with none, the event is dropped
    pub fn publish(&self, event: ActivityEvent) {
        match self.sender.send(event) {
            Ok(receivers) => trace!(receivers, "Activity event published"),
            Err(broadcast::error::SendError(event)) => {
                trace!(kind = event.kind.as_str(), "Activity event dropped, no subscribers")
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

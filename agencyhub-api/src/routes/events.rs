/// Live activity feed
///
/// `GET /api/events` streams the writes of the caller's organization as
/// Server-Sent Events. The event name is the activity kind and the data is
/// the JSON [`ActivityEvent`]:
///
/// ```text
/// event: task_updated
/// data: {"organization_id":"...","kind":"task_updated","entity_id":"...","actor_id":"...","at":"..."}
/// ```
///
/// Each subscriber only receives kinds its role may read, e.g. no invoice
/// events without `invoices:read`. The role is read once when the stream
/// opens; a role change applies on reconnect.
///
/// The feed is live only; nothing is replayed on reconnect. A subscriber
/// that falls behind the hub's buffer skips the missed events.

use crate::{app::AppState, error::ApiError};
use agencyhub_shared::{
    auth::{
        authorization::require_membership, middleware::AuthContext,
        permissions::role_has_permission,
    },
    events::ActivityEvent,
    models::membership::MemberRole,
};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::Stream;
use std::{convert::Infallible, time::Duration};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use uuid::Uuid;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

pub async fn activity_stream(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let role = require_membership(&state.db, &auth).await?;

    tracing::info!(
        organization_id = %auth.organization_id,
        user_id = %auth.user_id,
        role = role.as_str(),
        subscribers = state.events.subscriber_count() + 1,
        "Activity stream opened"
    );

    let organization_id = auth.organization_id;
    let stream = BroadcastStream::new(state.events.subscribe())
        .filter_map(move |message| to_sse_event(organization_id, role, message))
        .map(Ok);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// Keeps the organization's events the role may see and renders them
fn to_sse_event(
    organization_id: Uuid,
    role: MemberRole,
    message: Result<ActivityEvent, BroadcastStreamRecvError>,
) -> Option<Event> {
    let event = match message {
        Ok(event) if event.organization_id == organization_id => event,
        Ok(_) => return None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(%organization_id, skipped, "Activity stream lagged");
            return None;
        }
    };
    if let Some(permission) = event.kind.required_permission() {
        if !role_has_permission(role, permission) {
            return None;
        }
    }

    match Event::default().event(event.kind.as_str()).json_data(&event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode activity event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencyhub_shared::events::ActivityKind;

    #[test]
    fn test_other_organizations_are_filtered() {
        let mine = Uuid::new_v4();
        let event = ActivityEvent::new(Uuid::new_v4(), ActivityKind::ClientCreated, Uuid::new_v4(), Uuid::new_v4());

        assert!(to_sse_event(mine, MemberRole::Owner, Ok(event)).is_none());
    }

    #[test]
    fn test_own_events_are_rendered() {
        let mine = Uuid::new_v4();
        let event = ActivityEvent::new(mine, ActivityKind::TaskUpdated, Uuid::new_v4(), Uuid::new_v4());

        assert!(to_sse_event(mine, MemberRole::Member, Ok(event)).is_some());
    }

    #[test]
    fn test_lag_is_skipped() {
        assert!(to_sse_event(Uuid::new_v4(), MemberRole::Owner, Err(BroadcastStreamRecvError::Lagged(4))).is_none());
    }

    #[test]
    fn test_events_need_the_matching_read_permission() {
        let mine = Uuid::new_v4();
        let invoice = || ActivityEvent::new(mine, ActivityKind::InvoiceCreated, Uuid::new_v4(), Uuid::new_v4());
        let member = || ActivityEvent::new(mine, ActivityKind::MemberAdded, Uuid::new_v4(), Uuid::new_v4());

        assert!(to_sse_event(mine, MemberRole::Member, Ok(invoice())).is_none());
        assert!(to_sse_event(mine, MemberRole::Client, Ok(member())).is_none());
        assert!(to_sse_event(mine, MemberRole::Finance, Ok(invoice())).is_some());
        assert!(to_sse_event(mine, MemberRole::Owner, Ok(member())).is_some());

        let settings = ActivityEvent::new(mine, ActivityKind::OrganizationUpdated, mine, Uuid::new_v4());
        assert!(to_sse_event(mine, MemberRole::Client, Ok(settings)).is_some());
    }
}

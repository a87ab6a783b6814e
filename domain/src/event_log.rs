use async_trait::async_trait;
use entity::event_kind::EventKind;
use entity_api::session_event_log;
use events::{DomainEvent, EventHandler};
use log::*;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Writes one audit row per session lifecycle event.
pub struct EventLogHandler {
    db: Arc<DatabaseConnection>,
}

impl EventLogHandler {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn event_kind(event: &DomainEvent) -> EventKind {
    match event {
        DomainEvent::SessionStarted { .. } => EventKind::Started,
        DomainEvent::SessionStopped { .. } => EventKind::Stopped,
        DomainEvent::SessionJoined { .. } => EventKind::Joined,
        DomainEvent::SessionLeft { .. } => EventKind::Left,
    }
}

#[async_trait]
impl EventHandler for EventLogHandler {
    async fn handle(&self, event: &DomainEvent) {
        let kind = event_kind(event);
        let session_id = event.session_id();
        debug!("Handling {kind} event for session {session_id}");

        if let Err(e) =
            session_event_log::append(self.db.as_ref(), session_id, event.user_id(), kind).await
        {
            error!("Failed to log {kind} event for session {session_id}: {e}");
        }
    }
}

//! Session lifecycle events.
//!
//! Participant flows publish a [`DomainEvent`] after every successful lifecycle
//! transition. Handlers (the audit log being the built-in one) subscribe through
//! an [`EventPublisher`].
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = Uuid;

/// Lifecycle transitions of a session.
///
/// `user_id` is `None` for guests joining through a public link and for
/// system-triggered transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A meeting was created on the provider for a session that had none running.
    SessionStarted {
        session_id: Id,
        backend_id: String,
        user_id: Option<Id>,
    },
    /// The provider confirmed that the meeting was ended.
    SessionStopped {
        session_id: Id,
        backend_id: String,
        user_id: Option<Id>,
    },
    /// A join link was handed out.
    SessionJoined {
        session_id: Id,
        user_id: Option<Id>,
        moderator: bool,
    },
    SessionLeft {
        session_id: Id,
        user_id: Option<Id>,
    },
}

impl DomainEvent {
    pub fn session_id(&self) -> Id {
        match self {
            DomainEvent::SessionStarted { session_id, .. }
            | DomainEvent::SessionStopped { session_id, .. }
            | DomainEvent::SessionJoined { session_id, .. }
            | DomainEvent::SessionLeft { session_id, .. } => *session_id,
        }
    }

    pub fn user_id(&self) -> Option<Id> {
        match self {
            DomainEvent::SessionStarted { user_id, .. }
            | DomainEvent::SessionStopped { user_id, .. }
            | DomainEvent::SessionJoined { user_id, .. }
            | DomainEvent::SessionLeft { user_id, .. } => *user_id,
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like writing audit rows,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher where the flows can reach it.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers own their failures; publishing never fails.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventHandler for Collect {
        async fn handle(&self, event: &DomainEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_handler_in_order() {
        let first = Arc::new(Collect::default());
        let second = Arc::new(Collect::default());
        let publisher = EventPublisher::new()
            .with_handler(first.clone())
            .with_handler(second.clone());

        let event = DomainEvent::SessionLeft {
            session_id: Id::from_u128(1),
            user_id: Some(Id::from_u128(2)),
        };
        publisher.publish(event.clone()).await;

        assert_eq!(publisher.handler_count(), 2);
        assert_eq!(*first.seen.lock().unwrap(), vec![event.clone()]);
        assert_eq!(*second.seen.lock().unwrap(), vec![event]);
    }

    #[test]
    fn accessors_cover_every_variant() {
        let session_id = Id::from_u128(3);
        let event = DomainEvent::SessionStarted {
            session_id,
            backend_id: "bbb".to_string(),
            user_id: None,
        };

        assert_eq!(event.session_id(), session_id);
        assert_eq!(event.user_id(), None);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = DomainEvent::SessionJoined {
            session_id: Id::from_u128(4),
            user_id: None,
            moderator: false,
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "session_joined");
        assert_eq!(json["moderator"], false);
    }
}

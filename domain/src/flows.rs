//! Participant-facing flows: launch, join, leave, stop, guest join and the
//! recording screens.
//!
//! Each flow checks capabilities, drives the [`SessionService`] and publishes a
//! [`DomainEvent`] after every successful lifecycle transition.

use crate::authorization::{Authorization, Capabilities};
use crate::session::SessionService;
use crate::Id;
use entity::sessions::Model as Session;
use entity_api::session::LookupScope;
use events::{DomainEvent, EventPublisher};
use log::*;
use meeting_backend::{Participant, Recording};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Why a flow refused to continue. Detail stays in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowError {
    NotFound,
    Denied,
    NotRunning,
    Failed,
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let message = match self {
            FlowError::NotFound => "Session not found",
            FlowError::Denied => "Not allowed",
            FlowError::NotRunning => "This session is not running",
            FlowError::Failed => "The operation failed",
        };
        write!(f, "{message}")
    }
}

impl std::error::Error for FlowError {}

/// Where to send the participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinTarget {
    pub url: String,
    /// Render inside the host page instead of redirecting.
    pub embed: bool,
}

pub struct Flows {
    sessions: Arc<SessionService>,
    authorization: Arc<Authorization>,
    events: EventPublisher,
}

impl Flows {
    pub fn new(
        sessions: Arc<SessionService>,
        authorization: Arc<Authorization>,
        events: EventPublisher,
    ) -> Self {
        Self {
            sessions,
            authorization,
            events,
        }
    }

    async fn load(&self, session_id: Id, scope: LookupScope) -> Result<Session, FlowError> {
        self.sessions
            .get(session_id, scope)
            .await
            .ok_or(FlowError::NotFound)
    }

    async fn load_with_capabilities(
        &self,
        session_id: Id,
        scope: LookupScope,
        user_id: Id,
    ) -> Result<(Session, Capabilities), FlowError> {
        let session = self.load(session_id, scope).await?;
        let capabilities = self.authorization.capabilities(&session, user_id).await;
        Ok((session, capabilities))
    }

    /// Starts the meeting when needed, then joins it.
    ///
    /// Always-joinable backends are never started; their rooms exist on demand.
    pub async fn launch(
        &self,
        session_id: Id,
        scope: LookupScope,
        participant: &Participant,
        embed: bool,
    ) -> Result<JoinTarget, FlowError> {
        let user_id = participant.id.ok_or(FlowError::Denied)?;
        let (mut session, capabilities) =
            self.load_with_capabilities(session_id, scope, user_id).await?;

        if self.sessions.is_always_joinable(&session) {
            if !capabilities.join {
                return Err(FlowError::Denied);
            }
        } else if !self.sessions.is_running(&session).await {
            if !capabilities.start {
                return Err(FlowError::Denied);
            }

            session = self
                .sessions
                .start(&session)
                .await
                .ok_or(FlowError::Failed)?;

            self.events
                .publish(DomainEvent::SessionStarted {
                    session_id: session.id,
                    backend_id: session.backend_type.clone(),
                    user_id: Some(user_id),
                })
                .await;
        }

        self.enter(&session, participant, capabilities.moderate, embed)
            .await
    }

    /// Joins a meeting somebody else already started.
    pub async fn join(
        &self,
        session_id: Id,
        scope: LookupScope,
        participant: &Participant,
        embed: bool,
    ) -> Result<JoinTarget, FlowError> {
        let user_id = participant.id.ok_or(FlowError::Denied)?;
        let (session, capabilities) =
            self.load_with_capabilities(session_id, scope, user_id).await?;

        if !capabilities.join {
            return Err(FlowError::Denied);
        }

        if !self.is_joinable(&session).await {
            return Err(FlowError::NotRunning);
        }

        self.enter(&session, participant, capabilities.moderate, embed)
            .await
    }

    pub async fn leave(&self, session_id: Id, user_id: Option<Id>) -> Result<(), FlowError> {
        let session = self.load(session_id, LookupScope::Any).await?;

        self.events
            .publish(DomainEvent::SessionLeft {
                session_id: session.id,
                user_id,
            })
            .await;
        Ok(())
    }

    /// Ends the remote meeting. Only a confirmed end is recorded.
    pub async fn stop(
        &self,
        session_id: Id,
        scope: LookupScope,
        user_id: Id,
    ) -> Result<(), FlowError> {
        let (session, capabilities) =
            self.load_with_capabilities(session_id, scope, user_id).await?;

        if !capabilities.start {
            return Err(FlowError::Denied);
        }

        if !self.sessions.end(&session).await {
            return Err(FlowError::Failed);
        }

        self.events
            .publish(DomainEvent::SessionStopped {
                session_id: session.id,
                backend_id: session.backend_type.clone(),
                user_id: Some(user_id),
            })
            .await;
        Ok(())
    }

    /// Guest entry through a public link.
    pub async fn public_join(&self, token: &str, display_name: &str) -> Result<JoinTarget, FlowError> {
        let session = self
            .sessions
            .get_by_public_token(token)
            .await
            .ok_or(FlowError::NotFound)?;

        if !self.is_joinable(&session).await {
            return Err(FlowError::NotRunning);
        }

        let url = self
            .sessions
            .anonymous_join_url(&session, display_name)
            .await
            .ok_or(FlowError::Failed)?;

        self.events
            .publish(DomainEvent::SessionJoined {
                session_id: session.id,
                user_id: None,
                moderator: false,
            })
            .await;

        Ok(JoinTarget {
            url,
            embed: self.sessions.supports_embed(&session),
        })
    }

    /// Recordings visible to the user. Only administrators see unpublished ones.
    pub async fn recordings(
        &self,
        session_id: Id,
        scope: LookupScope,
        user_id: Id,
    ) -> Result<Vec<Recording>, FlowError> {
        let (session, capabilities) =
            self.load_with_capabilities(session_id, scope, user_id).await?;

        if !capabilities.join {
            return Err(FlowError::Denied);
        }

        let recordings = self.sessions.recordings(&session).await;
        if capabilities.administer {
            Ok(recordings)
        } else {
            Ok(recordings
                .into_iter()
                .filter(Recording::is_published)
                .collect())
        }
    }

    pub async fn publish_recording(
        &self,
        session_id: Id,
        scope: LookupScope,
        user_id: Id,
        recording_id: &str,
        publish: bool,
    ) -> Result<(), FlowError> {
        let (session, capabilities) =
            self.load_with_capabilities(session_id, scope, user_id).await?;

        if !capabilities.administer {
            return Err(FlowError::Denied);
        }

        if self
            .sessions
            .publish_recording(&session, recording_id, publish)
            .await
        {
            Ok(())
        } else {
            Err(FlowError::Failed)
        }
    }

    pub async fn delete_recording(
        &self,
        session_id: Id,
        scope: LookupScope,
        user_id: Id,
        recording_id: &str,
    ) -> Result<(), FlowError> {
        let (session, capabilities) =
            self.load_with_capabilities(session_id, scope, user_id).await?;

        if !capabilities.administer {
            return Err(FlowError::Denied);
        }

        if self.sessions.delete_recording(&session, recording_id).await {
            Ok(())
        } else {
            Err(FlowError::Failed)
        }
    }

    /// Soft-deletes the session for an administrator.
    pub async fn delete(
        &self,
        session_id: Id,
        scope: LookupScope,
        user_id: Id,
    ) -> Result<(), FlowError> {
        let (_, capabilities) = self.load_with_capabilities(session_id, scope, user_id).await?;

        if !capabilities.administer {
            return Err(FlowError::Denied);
        }

        if self.sessions.delete(session_id, scope).await {
            Ok(())
        } else {
            Err(FlowError::Failed)
        }
    }

    async fn is_joinable(&self, session: &Session) -> bool {
        self.sessions.is_always_joinable(session) || self.sessions.is_running(session).await
    }

    async fn enter(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
        embed: bool,
    ) -> Result<JoinTarget, FlowError> {
        let url = self
            .sessions
            .join_url(session, participant, is_moderator)
            .await
            .ok_or(FlowError::Failed)?;

        debug!(
            "Handing out join URL of session {} (moderator: {is_moderator})",
            session.id
        );
        self.events
            .publish(DomainEvent::SessionJoined {
                session_id: session.id,
                user_id: participant.id,
                moderator: is_moderator,
            })
            .await;

        Ok(JoinTarget {
            url,
            embed: embed && self.sessions.supports_embed(session),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{GroupPermissions, MembershipRole};
    use crate::event_log::EventLogHandler;
    use crate::test_support::{database, registry, session_model, StubBackend};
    use entity::{event_kind::EventKind, session_role::SessionRole, Container, ContainerKind};
    use entity_api::{session, session_event_log, session_user};
    use meeting_backend::Backend;
    use sea_orm::DatabaseConnection;
    use service::settings::{MemorySettings, Settings};

    const SPACE: Id = Id::from_u128(100);
    const CREATOR: Id = Id::from_u128(1);
    const MEMBER: Id = Id::from_u128(2);
    const OUTSIDER: Id = Id::from_u128(3);

    struct Fixture {
        db: Arc<DatabaseConnection>,
        flows: Flows,
    }

    async fn fixture(backend: &Arc<StubBackend>) -> Fixture {
        let db = Arc::new(database().await);
        let settings: Arc<dyn Settings> = Arc::new(MemorySettings::new());
        let registry = Arc::new(registry(settings, &[backend.clone() as Arc<dyn Backend>]));

        let permissions = Arc::new(GroupPermissions::new());
        permissions.add_member(SPACE, MEMBER, MembershipRole::Member);
        permissions.set_state(
            Container::space(SPACE),
            crate::authorization::ModulePermission::JoinSession,
            crate::authorization::Group::Other,
            Some(crate::authorization::PermissionState::Deny),
        );

        let authorization = Arc::new(Authorization::new(db.clone(), permissions));
        let sessions = Arc::new(SessionService::new(
            db.clone(),
            registry,
            authorization.clone(),
        ));
        let events = EventPublisher::new().with_handler(Arc::new(EventLogHandler::new(db.clone())));

        Fixture {
            flows: Flows::new(sessions, authorization, events),
            db,
        }
    }

    async fn space_session(db: &DatabaseConnection, backend: &str) -> Session {
        let mut model = session_model(backend, "standup");
        model.container_id = Some(SPACE);
        model.container_kind = Some(ContainerKind::Space);
        model.creator_user_id = CREATOR;
        session::create(db, model).await.unwrap()
    }

    fn scope() -> LookupScope {
        LookupScope::Container(Container::space(SPACE))
    }

    fn person(id: Id, name: &str) -> Participant {
        Participant::user(id, name)
    }

    async fn logged(db: &DatabaseConnection, session_id: Id) -> Vec<(EventKind, Option<Id>)> {
        session_event_log::find_by_session(db, session_id)
            .await
            .unwrap()
            .into_iter()
            .map(|row| (row.event_type, row.user_id))
            .collect()
    }

    #[tokio::test]
    async fn launch_starts_then_joins_as_moderator() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        let target = fixture
            .flows
            .launch(stored.id, scope(), &person(CREATOR, "Ada"), true)
            .await
            .unwrap();

        assert_eq!(backend.create_calls(), 1);
        assert!(target.embed);
        assert!(target.url.contains("name=Ada"));
        // The creator administers but is no moderator by role alone.
        assert!(target.url.ends_with("moderator=false"));
        assert!(target.url.contains(&format!("rooms-{}", stored.id.simple())));
        assert_eq!(
            logged(&fixture.db, stored.id).await,
            vec![
                (EventKind::Started, Some(CREATOR)),
                (EventKind::Joined, Some(CREATOR))
            ]
        );
    }

    #[tokio::test]
    async fn launch_joins_a_running_meeting_without_starting() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        backend.set_running(true);
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        fixture
            .flows
            .launch(stored.id, scope(), &person(MEMBER, "Grace"), false)
            .await
            .unwrap();

        assert_eq!(backend.create_calls(), 0);
        assert_eq!(
            logged(&fixture.db, stored.id).await,
            vec![(EventKind::Joined, Some(MEMBER))]
        );
    }

    #[tokio::test]
    async fn launch_without_start_rights_is_denied() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        let result = fixture
            .flows
            .launch(stored.id, scope(), &person(MEMBER, "Grace"), false)
            .await;

        assert_eq!(result, Err(FlowError::Denied));
        assert_eq!(backend.create_calls(), 0);
        assert!(logged(&fixture.db, stored.id).await.is_empty());
    }

    #[tokio::test]
    async fn failed_start_reports_failure_without_events() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based").failing_create());
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        let result = fixture
            .flows
            .launch(stored.id, scope(), &person(CREATOR, "Ada"), false)
            .await;

        assert_eq!(result, Err(FlowError::Failed));
        assert_eq!(backend.join_calls(), 0);
        assert!(logged(&fixture.db, stored.id).await.is_empty());
    }

    #[tokio::test]
    async fn always_joinable_sessions_launch_without_starting() {
        let backend = Arc::new(StubBackend::new("ephemeral", "Ephemeral").always_joinable());
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "ephemeral").await;

        fixture
            .flows
            .launch(stored.id, scope(), &person(MEMBER, "Grace"), false)
            .await
            .unwrap();
        fixture
            .flows
            .join(stored.id, scope(), &person(MEMBER, "Grace"), false)
            .await
            .unwrap();

        assert_eq!(backend.create_calls(), 0);
        assert_eq!(backend.running_calls(), 0);
        assert_eq!(backend.join_calls(), 2);
    }

    #[tokio::test]
    async fn join_requires_rights_and_a_running_meeting() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        let outsider = fixture
            .flows
            .join(stored.id, scope(), &person(OUTSIDER, "Eve"), false)
            .await;
        assert_eq!(outsider, Err(FlowError::Denied));

        let early = fixture
            .flows
            .join(stored.id, scope(), &person(MEMBER, "Grace"), false)
            .await;
        assert_eq!(early, Err(FlowError::NotRunning));

        backend.set_running(true);
        let target = fixture
            .flows
            .join(stored.id, scope(), &person(MEMBER, "Grace"), true)
            .await
            .unwrap();
        assert!(target.url.ends_with("moderator=false"));

        let guest = fixture
            .flows
            .join(stored.id, scope(), &Participant::guest("Visitor"), false)
            .await;
        assert_eq!(guest, Err(FlowError::Denied));
    }

    #[tokio::test]
    async fn explicit_moderators_join_as_moderators() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        backend.set_running(true);
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;
        session_user::replace_for_role(
            fixture.db.as_ref(),
            stored.id,
            SessionRole::Moderator,
            &[OUTSIDER],
            &[],
        )
        .await
        .unwrap();

        let target = fixture
            .flows
            .join(stored.id, scope(), &person(OUTSIDER, "Eve"), false)
            .await
            .unwrap();

        assert!(target.url.ends_with("moderator=true"));
    }

    #[tokio::test]
    async fn join_outside_the_owning_scope_is_not_found() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        let result = fixture
            .flows
            .join(stored.id, LookupScope::Global, &person(MEMBER, "Grace"), false)
            .await;

        assert_eq!(result, Err(FlowError::NotFound));
    }

    #[tokio::test]
    async fn stop_logs_only_confirmed_ends() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        backend.set_running(true);
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        assert_eq!(
            fixture.flows.stop(stored.id, scope(), MEMBER).await,
            Err(FlowError::Denied)
        );
        assert_eq!(backend.end_calls(), 0);

        fixture.flows.stop(stored.id, scope(), CREATOR).await.unwrap();
        assert_eq!(backend.end_calls(), 1);
        assert_eq!(
            logged(&fixture.db, stored.id).await,
            vec![(EventKind::Stopped, Some(CREATOR))]
        );
    }

    #[tokio::test]
    async fn relaunch_after_stop_creates_the_meeting_again() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based").recreate_safe());
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;
        let creator = person(CREATOR, "Ada");

        fixture.flows.launch(stored.id, scope(), &creator, false).await.unwrap();
        backend.set_running(true);
        fixture.flows.stop(stored.id, scope(), CREATOR).await.unwrap();

        let stopped = session::find_by_id(fixture.db.as_ref(), stored.id).await.unwrap();
        assert_eq!(stopped.meeting_id(), None);

        let target = fixture.flows.launch(stored.id, scope(), &creator, false).await.unwrap();

        assert_eq!(backend.create_calls(), 2);
        assert!(target.url.contains(&format!("rooms-{}", stored.id.simple())));
    }

    #[tokio::test]
    async fn relaunch_without_stop_keeps_the_meeting() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;
        let creator = person(CREATOR, "Ada");

        fixture.flows.launch(stored.id, scope(), &creator, false).await.unwrap();
        fixture.flows.launch(stored.id, scope(), &creator, false).await.unwrap();

        assert_eq!(backend.create_calls(), 1);
        assert_eq!(backend.join_calls(), 2);
    }

    #[tokio::test]
    async fn leave_is_logged() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        fixture.flows.leave(stored.id, Some(MEMBER)).await.unwrap();

        assert_eq!(
            logged(&fixture.db, stored.id).await,
            vec![(EventKind::Left, Some(MEMBER))]
        );
        assert_eq!(
            fixture.flows.leave(Id::from_u128(404), None).await,
            Err(FlowError::NotFound)
        );
    }

    #[tokio::test]
    async fn guests_join_through_the_public_token() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let mut model = session_model("rooms", "open-house");
        model.public_join = true;
        model.public_token = Some("t0ken".to_string());
        let stored = session::create(fixture.db.as_ref(), model).await.unwrap();

        assert_eq!(
            fixture.flows.public_join("t0ken", "Visitor").await,
            Err(FlowError::NotRunning)
        );
        assert_eq!(
            fixture.flows.public_join("wrong", "Visitor").await,
            Err(FlowError::NotFound)
        );

        backend.set_running(true);
        let target = fixture.flows.public_join("t0ken", "  ").await.unwrap();

        assert!(target.url.contains("name=Guest"));
        assert!(target.url.ends_with("moderator=false"));
        assert_eq!(
            logged(&fixture.db, stored.id).await,
            vec![(EventKind::Joined, None)]
        );
    }

    #[tokio::test]
    async fn public_join_on_a_non_embeddable_backend_redirects() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based").without_embed());
        backend.set_running(true);
        let fixture = fixture(&backend).await;
        let mut model = session_model("rooms", "open-house");
        model.public_join = true;
        model.public_token = Some("t0ken".to_string());
        session::create(fixture.db.as_ref(), model).await.unwrap();

        let target = fixture.flows.public_join("t0ken", "Visitor").await.unwrap();

        assert!(!target.embed);
    }

    #[tokio::test]
    async fn recordings_are_filtered_for_non_administrators() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based").with_recordings());
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        assert_eq!(fixture.flows.recordings(stored.id, scope(), MEMBER).await.unwrap().len(), 1);
        assert_eq!(
            fixture.flows.recordings(stored.id, scope(), OUTSIDER).await,
            Err(FlowError::Denied)
        );

        assert_eq!(
            fixture
                .flows
                .publish_recording(stored.id, scope(), MEMBER, "r1", false)
                .await,
            Err(FlowError::Denied)
        );
        fixture
            .flows
            .publish_recording(stored.id, scope(), CREATOR, "r1", false)
            .await
            .unwrap();
        fixture
            .flows
            .delete_recording(stored.id, scope(), CREATOR, "r1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn recording_actions_fail_on_backends_without_recordings() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        assert!(fixture
            .flows
            .recordings(stored.id, scope(), CREATOR)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            fixture
                .flows
                .publish_recording(stored.id, scope(), CREATOR, "r1", true)
                .await,
            Err(FlowError::Failed)
        );
    }

    #[tokio::test]
    async fn only_administrators_delete() {
        let backend = Arc::new(StubBackend::new("rooms", "Room Based"));
        let fixture = fixture(&backend).await;
        let stored = space_session(&fixture.db, "rooms").await;

        assert_eq!(
            fixture.flows.delete(stored.id, scope(), MEMBER).await,
            Err(FlowError::Denied)
        );
        fixture.flows.delete(stored.id, scope(), CREATOR).await.unwrap();
        assert_eq!(
            fixture.flows.delete(stored.id, scope(), CREATOR).await,
            Err(FlowError::NotFound)
        );
    }
}

//! Orchestration of sessions over their backends.
//!
//! Every operation resolves the backend from the session's stored provider id and
//! turns backend and persistence failures into a logged negative result. No
//! provider error type reaches callers of this module.

use crate::authorization::Authorization;
use crate::backend::BackendRegistry;
use crate::Id;
use entity::{sessions::Model as Session, Container};
use entity_api::session::{self, ListScope, LookupScope};
use log::*;
use meeting_backend::{Backend, Participant, Recording};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;

/// What a user sees before entering a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LobbyState {
    /// Reported by the backend. Always false for always-joinable backends, which are
    /// never asked.
    pub running: bool,
    pub always_joinable: bool,
    pub can_start: bool,
    pub can_join: bool,
    pub is_moderator: bool,
}

impl LobbyState {
    pub fn is_joinable(&self) -> bool {
        self.running || self.always_joinable
    }
}

/// Session lookups and the meeting lifecycle, resolved per session to its backend.
pub struct SessionService {
    db: Arc<DatabaseConnection>,
    registry: Arc<BackendRegistry>,
    authorization: Arc<Authorization>,
}

impl SessionService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        registry: Arc<BackendRegistry>,
        authorization: Arc<Authorization>,
    ) -> Self {
        Self {
            db,
            registry,
            authorization,
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// A non-deleted session visible in `scope`.
    pub async fn get(&self, id: Id, scope: LookupScope) -> Option<Session> {
        match session::find_active(self.db.as_ref(), id, scope).await {
            Ok(found) => found,
            Err(e) => {
                error!("Failed to load session {id}: {e}");
                None
            }
        }
    }

    /// Resolves a guest link. Sessions with public join switched off never match.
    pub async fn get_by_public_token(&self, token: &str) -> Option<Session> {
        match session::find_by_public_token(self.db.as_ref(), token).await {
            Ok(found) => found,
            Err(e) => {
                error!("Failed to resolve public token: {e}");
                None
            }
        }
    }

    /// Sessions of one container, or the global ones, by `ord` then newest first.
    pub async fn list(&self, container: Option<Container>, only_enabled: bool) -> Vec<Session> {
        session::find_by_container(self.db.as_ref(), container, only_enabled)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to list sessions of {container:?}: {e}");
                Vec::new()
            })
    }

    /// Cross-container listing for administration, ordered like [`Self::list`].
    pub async fn list_all(&self, scope: ListScope, only_enabled: bool) -> Vec<Session> {
        session::find_by_scope(self.db.as_ref(), scope, only_enabled)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to list {scope:?} sessions: {e}");
                Vec::new()
            })
    }

    /// The session's backend when it is registered and configured.
    pub fn backend_for(&self, session: &Session) -> Option<Arc<dyn Backend>> {
        match self.registry.get(&session.backend_type) {
            Some(backend) if backend.is_configured() => Some(backend),
            Some(_) => {
                warn!(
                    "Backend {} of session {} is not configured",
                    session.backend_type, session.id
                );
                None
            }
            None => {
                warn!(
                    "Backend {} of session {} is not registered",
                    session.backend_type, session.id
                );
                None
            }
        }
    }

    /// Makes sure a remote meeting exists and returns the session carrying its
    /// reference.
    ///
    /// The stored row is re-read under a row lock held until the reference is
    /// written, so concurrent starts of one session create a single meeting. A
    /// stored reference is kept unless the backend is recreate-safe or reports the
    /// meeting gone; then a new meeting replaces it. `None` when the backend is
    /// missing or any step fails, with nothing written.
    pub async fn start(&self, session: &Session) -> Option<Session> {
        let backend = self.backend_for(session)?;

        let txn = match self.db.begin().await {
            Ok(txn) => txn,
            Err(e) => {
                error!("Failed to open transaction to start session {}: {e}", session.id);
                return None;
            }
        };

        let stored = match session::find_by_id_for_update(&txn, session.id).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to reload session {} before start: {e}", session.id);
                return None;
            }
        };

        let previous = match stored.meeting_id() {
            None => None,
            Some(current) if backend.is_recreate_safe() => {
                debug!(
                    "Re-creating {} meeting {current} of session {}",
                    backend.id(),
                    stored.id
                );
                Some(current.to_string())
            }
            Some(current) => match backend.meeting_exists(&stored).await {
                Ok(true) => {
                    debug!(
                        "Session {} already has {} meeting {current}, not creating another",
                        stored.id,
                        backend.id()
                    );
                    return Some(stored);
                }
                Ok(false) => {
                    info!(
                        "{} meeting {current} of session {} is gone, creating a new one",
                        backend.name(),
                        stored.id
                    );
                    Some(current.to_string())
                }
                Err(e) => {
                    warn!(
                        "Could not check {} meeting {current} of session {}, keeping it: {e}",
                        backend.id(),
                        stored.id
                    );
                    return Some(stored);
                }
            },
        };

        let meeting = match backend.create_meeting(&stored).await {
            Ok(meeting) => meeting,
            Err(e) => {
                error!(
                    "Failed to create {} meeting for session {}: {e}",
                    backend.id(),
                    stored.id
                );
                return None;
            }
        };

        let config = if meeting.config_updates.is_empty() {
            None
        } else {
            Some(meeting.merged_config(&stored.backend_config))
        };

        let written = match previous.as_deref() {
            None => {
                session::set_meeting_reference(&txn, stored.id, &meeting.meeting_id, config).await
            }
            Some(previous) => {
                session::replace_meeting_reference(
                    &txn,
                    stored.id,
                    previous,
                    &meeting.meeting_id,
                    config,
                )
                .await
            }
        };

        let started = match written {
            Ok(started) => started,
            Err(e) => {
                error!(
                    "Created {} meeting {} but failed to store it on session {}: {e}",
                    backend.id(),
                    meeting.meeting_id,
                    stored.id
                );
                return None;
            }
        };

        if let Err(e) = txn.commit().await {
            error!(
                "Created {} meeting {} but failed to commit it on session {}: {e}",
                backend.id(),
                meeting.meeting_id,
                stored.id
            );
            return None;
        }

        info!(
            "Started session {} on {} as meeting {}",
            started.id,
            backend.id(),
            meeting.meeting_id
        );
        Some(started)
    }

    /// Join link for a known participant. Callers decide the role; nothing is
    /// checked here.
    pub async fn join_url(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
    ) -> Option<String> {
        let backend = self.backend_for(session)?;
        match backend.join_url(session, participant, is_moderator).await {
            Ok(url) => Some(url),
            Err(e) => {
                error!(
                    "Failed to build {} join URL for session {}: {e}",
                    backend.id(),
                    session.id
                );
                None
            }
        }
    }

    /// Guest join link, `None` on backends without public join.
    pub async fn anonymous_join_url(&self, session: &Session, display_name: &str) -> Option<String> {
        let backend = self.backend_for(session)?;
        if !backend.supports_public_join() {
            warn!(
                "Backend {} does not support public join (session {})",
                backend.id(),
                session.id
            );
            return None;
        }

        match backend.anonymous_join_url(session, display_name).await {
            Ok(url) => Some(url),
            Err(e) => {
                error!(
                    "Failed to build {} guest join URL for session {}: {e}",
                    backend.id(),
                    session.id
                );
                None
            }
        }
    }

    /// False for sessions without a usable backend and on query failures.
    pub async fn is_running(&self, session: &Session) -> bool {
        let Some(backend) = self.backend_for(session) else {
            return false;
        };

        backend.is_running(session).await.unwrap_or_else(|e| {
            error!(
                "Failed to query {} for session {}: {e}",
                backend.id(),
                session.id
            );
            false
        })
    }

    /// Ends the remote meeting. A failure leaves the session untouched.
    ///
    /// After a confirmed end, recreate-safe backends drop the reference so the next
    /// start begins from scratch. Other backends keep it: their meeting object
    /// outlives the end and still owns its recordings.
    pub async fn end(&self, session: &Session) -> bool {
        let Some(backend) = self.backend_for(session) else {
            return false;
        };

        match backend.end_meeting(session).await {
            Ok(true) => {
                info!("Ended {} meeting of session {}", backend.id(), session.id);
                if backend.is_recreate_safe() && session.meeting_id().is_some() {
                    if let Err(e) =
                        session::clear_meeting_reference(self.db.as_ref(), session.id).await
                    {
                        warn!(
                            "Ended session {} but could not drop its meeting reference: {e}",
                            session.id
                        );
                    }
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!(
                    "Failed to end {} meeting of session {}: {e}",
                    backend.id(),
                    session.id
                );
                false
            }
        }
    }

    /// Soft-deletes the session. The remote meeting is left alone.
    pub async fn delete(&self, id: Id, scope: LookupScope) -> bool {
        if self.get(id, scope).await.is_none() {
            return false;
        }

        match session::soft_delete(self.db.as_ref(), id).await {
            Ok(_) => {
                info!("Deleted session {id}");
                true
            }
            Err(e) => {
                error!("Failed to delete session {id}: {e}");
                false
            }
        }
    }

    /// Recordings as the backend reports them. Empty when the backend has no
    /// recording support or the query fails; visibility filtering is up to callers.
    pub async fn recordings(&self, session: &Session) -> Vec<Recording> {
        let Some(backend) = self.recording_backend(session) else {
            return Vec::new();
        };

        backend.recordings(session).await.unwrap_or_else(|e| {
            error!(
                "Failed to list {} recordings of session {}: {e}",
                backend.id(),
                session.id
            );
            Vec::new()
        })
    }

    pub async fn publish_recording(
        &self,
        session: &Session,
        recording_id: &str,
        publish: bool,
    ) -> bool {
        let Some(backend) = self.recording_backend(session) else {
            return false;
        };

        backend
            .publish_recording(session, recording_id, publish)
            .await
            .unwrap_or_else(|e| {
                error!(
                    "Failed to publish {} recording {recording_id} of session {}: {e}",
                    backend.id(),
                    session.id
                );
                false
            })
    }

    pub async fn delete_recording(&self, session: &Session, recording_id: &str) -> bool {
        let Some(backend) = self.recording_backend(session) else {
            return false;
        };

        backend
            .delete_recording(session, recording_id)
            .await
            .unwrap_or_else(|e| {
                error!(
                    "Failed to delete {} recording {recording_id} of session {}: {e}",
                    backend.id(),
                    session.id
                );
                false
            })
    }

    fn recording_backend(&self, session: &Session) -> Option<Arc<dyn Backend>> {
        self.backend_for(session)
            .filter(|backend| backend.supports_recordings())
    }

    fn feature(&self, session: &Session, check: impl Fn(&dyn Backend) -> bool) -> bool {
        self.registry
            .get(&session.backend_type)
            .map(|backend| check(backend.as_ref()))
            .unwrap_or(false)
    }

    // Feature checks only need the backend to be registered, not configured.

    pub fn supports_recordings(&self, session: &Session) -> bool {
        self.feature(session, |backend| backend.supports_recordings())
    }

    pub fn supports_waiting_room(&self, session: &Session) -> bool {
        self.feature(session, |backend| backend.supports_waiting_room())
    }

    pub fn supports_presentation_upload(&self, session: &Session) -> bool {
        self.feature(session, |backend| backend.supports_presentation_upload())
    }

    pub fn supports_public_join(&self, session: &Session) -> bool {
        self.feature(session, |backend| backend.supports_public_join())
    }

    pub fn supports_embed(&self, session: &Session) -> bool {
        self.feature(session, |backend| backend.supports_embed())
    }

    pub fn is_always_joinable(&self, session: &Session) -> bool {
        self.feature(session, |backend| backend.is_always_joinable())
    }

    /// Everything the pre-join view of `user_id` needs.
    ///
    /// Always-joinable backends are never asked whether they run. For every other
    /// backend this costs one running check plus the capability lookup.
    pub async fn lobby(&self, session: &Session, user_id: Id) -> LobbyState {
        let capabilities = self.authorization.capabilities(session, user_id).await;
        let always_joinable = self.is_always_joinable(session);
        let running = !always_joinable && self.is_running(session).await;

        LobbyState {
            running,
            always_joinable,
            can_start: capabilities.start,
            can_join: capabilities.join,
            is_moderator: capabilities.moderate,
        }
    }
}

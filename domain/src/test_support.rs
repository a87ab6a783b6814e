//! Fixtures shared by the domain tests.

use crate::backend::{AllowList, BackendRegistry};
use async_trait::async_trait;
use chrono::Utc;
use entity::{sessions, Id};
use meeting_backend::{
    Backend, ConfigField, Error as BackendError, MeetingRef, Participant, Recording,
    RecordingState, Session,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::json;
use service::settings::Settings;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Fresh, fully migrated in-memory database on a single connection.
pub(crate) async fn database() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt)
        .await
        .expect("in-memory sqlite should connect");
    Migrator::up(&db, None)
        .await
        .expect("migrations should apply");
    db
}

pub(crate) fn session_model(backend_type: &str, name: &str) -> sessions::Model {
    let now = Utc::now().fixed_offset();
    sessions::Model {
        id: entity::new_id(),
        backend_type: backend_type.to_string(),
        backend_meeting_id: None,
        name: name.to_string(),
        title: None,
        description: None,
        moderator_pw: "moderator1".to_string(),
        attendee_pw: "attendee01".to_string(),
        container_id: None,
        container_kind: None,
        creator_user_id: Id::from_u128(1),
        enabled: true,
        ord: 0,
        public_join: false,
        public_token: None,
        join_can_start: false,
        join_can_moderate: false,
        has_waiting_room: false,
        allow_recording: true,
        mute_on_entry: false,
        image_file_id: None,
        camera_bg_image_file_id: None,
        presentation_file_id: None,
        presentation_preview_file_id: None,
        backend_config: json!({}),
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn registry(settings: Arc<dyn Settings>, backends: &[Arc<dyn Backend>]) -> BackendRegistry {
    let mut registry = BackendRegistry::new(AllowList::new(settings));
    for backend in backends {
        registry.register(backend.clone());
    }
    registry
}

/// In-memory backend that counts calls and can be told to fail.
pub(crate) struct StubBackend {
    id: String,
    name: String,
    configured: bool,
    always_joinable: bool,
    recordings: bool,
    embed: bool,
    fail_create: bool,
    recreate_safe: bool,
    running: AtomicBool,
    meetings_gone: AtomicBool,
    create_calls: AtomicUsize,
    join_calls: AtomicUsize,
    running_calls: AtomicUsize,
    end_calls: AtomicUsize,
}

impl StubBackend {
    pub(crate) fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            configured: true,
            always_joinable: false,
            recordings: false,
            embed: true,
            fail_create: false,
            recreate_safe: false,
            running: AtomicBool::new(false),
            meetings_gone: AtomicBool::new(false),
            create_calls: AtomicUsize::new(0),
            join_calls: AtomicUsize::new(0),
            running_calls: AtomicUsize::new(0),
            end_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub(crate) fn always_joinable(mut self) -> Self {
        self.always_joinable = true;
        self
    }

    pub(crate) fn with_recordings(mut self) -> Self {
        self.recordings = true;
        self
    }

    pub(crate) fn without_embed(mut self) -> Self {
        self.embed = false;
        self
    }

    pub(crate) fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub(crate) fn recreate_safe(mut self) -> Self {
        self.recreate_safe = true;
        self
    }

    pub(crate) fn into_arc(self) -> Arc<dyn Backend> {
        Arc::new(self)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Every meeting created so far disappears, as if deleted on the provider side.
    pub(crate) fn delete_remote_meetings(&self) {
        self.meetings_gone.store(true, Ordering::SeqCst);
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn join_calls(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn running_calls(&self) -> usize {
        self.running_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn end_calls(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for StubBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn icon(&self) -> &str {
        "fa-video-camera"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn session_config_fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::checkbox("muteAll", "Mute everyone").with_default(false),
            ConfigField::number("maxUsers", "Max users").with_default(0),
        ]
    }

    async fn create_meeting(&self, session: &Session) -> Result<MeetingRef, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_create {
            return Err(BackendError::Provider("create refused".to_string()));
        }
        self.meetings_gone.store(false, Ordering::SeqCst);

        Ok(MeetingRef::new(format!("{}-{}", self.id, session.id.simple()))
            .with_config("stub_join_url", format!("https://{}.example.com/j", self.id)))
    }

    async fn join_url(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
    ) -> Result<String, BackendError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://{}.example.com/{}?name={}&moderator={}",
            self.id,
            session.meeting_id().unwrap_or("none"),
            participant.display_name,
            is_moderator
        ))
    }

    async fn is_running(&self, _session: &Session) -> Result<bool, BackendError> {
        self.running_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.running.load(Ordering::SeqCst))
    }

    async fn end_meeting(&self, _session: &Session) -> Result<bool, BackendError> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(true)
    }

    fn is_recreate_safe(&self) -> bool {
        self.recreate_safe
    }

    async fn meeting_exists(&self, session: &Session) -> Result<bool, BackendError> {
        Ok(session.meeting_id().is_some() && !self.meetings_gone.load(Ordering::SeqCst))
    }

    fn supports_recordings(&self) -> bool {
        self.recordings
    }

    fn supports_embed(&self) -> bool {
        self.embed
    }

    fn is_always_joinable(&self) -> bool {
        self.always_joinable
    }

    async fn recordings(&self, session: &Session) -> Result<Vec<Recording>, BackendError> {
        if !self.recordings {
            return Err(BackendError::unsupported("Recordings"));
        }

        Ok(vec![Recording {
            backend: self.id.clone(),
            id: format!("rec-{}", session.id.simple()),
            name: Some(session.display_title().to_string()),
            url: None,
            started_at: None,
            ended_at: None,
            duration_secs: 60,
            state: RecordingState::Published,
            image_previews: Vec::new(),
            metadata: json!({}),
        }])
    }

    async fn publish_recording(
        &self,
        _session: &Session,
        _recording_id: &str,
        _publish: bool,
    ) -> Result<bool, BackendError> {
        Ok(self.recordings)
    }

    async fn delete_recording(
        &self,
        _session: &Session,
        _recording_id: &str,
    ) -> Result<bool, BackendError> {
        Ok(self.recordings)
    }
}

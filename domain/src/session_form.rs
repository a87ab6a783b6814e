//! Create and edit path for sessions.
//!
//! A [`SessionDraft`] carries everything a settings form edits. [`SessionForm::save`]
//! validates it and writes the session row together with its explicit participant
//! lists in one transaction.

use crate::backend::BackendRegistry;
use crate::error::{Error, ValidationErrorKind};
use crate::Id;
use chrono::Utc;
use entity::{session_role::SessionRole, sessions, Container};
use entity_api::{session, session_user};
use log::*;
use meeting_backend::{validate_config, with_defaults, ConfigField};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde_json::{Map, Value as Json};
use std::sync::Arc;

const SLUG_MAX_LEN: usize = 100;
const TITLE_MAX_LEN: usize = 200;
const SECRET_LEN: usize = 10;
const PUBLIC_TOKEN_LEN: usize = 48;
const FALLBACK_SLUG: &str = "session";

/// How one participant role is managed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParticipantPolicy {
    /// Module permissions decide; no override rows exist for the role.
    #[default]
    ByPermissions,
    /// Exactly these users hold override rows for the role.
    Explicit(Vec<Id>),
}

impl ParticipantPolicy {
    fn from_rows(user_ids: Vec<Id>) -> Self {
        if user_ids.is_empty() {
            ParticipantPolicy::ByPermissions
        } else {
            ParticipantPolicy::Explicit(user_ids)
        }
    }

    fn user_ids(&self) -> &[Id] {
        match self {
            ParticipantPolicy::ByPermissions => &[],
            ParticipantPolicy::Explicit(user_ids) => user_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    /// `None` until the session has been saved once.
    pub id: Option<Id>,
    /// Owning container of a new session. Ignored when editing.
    pub container: Option<Container>,
    pub creator_user_id: Id,
    pub backend_type: String,
    /// Slug; left empty it is derived from the title.
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub ord: i32,
    pub public_join: bool,
    pub join_can_start: bool,
    pub join_can_moderate: bool,
    pub has_waiting_room: bool,
    pub allow_recording: bool,
    pub mute_on_entry: bool,
    pub image_file_id: Option<Id>,
    pub camera_bg_image_file_id: Option<Id>,
    pub presentation_file_id: Option<Id>,
    pub presentation_preview_file_id: Option<Id>,
    /// Backend options, restricted to the fields the backend declares.
    pub backend_config: Json,
    pub moderators: ParticipantPolicy,
    pub attendees: ParticipantPolicy,
    moderator_pw: String,
    attendee_pw: String,
}

impl SessionDraft {
    /// Blank draft for a new session with freshly generated secrets.
    pub fn for_new(container: Option<Container>, creator_user_id: Id, backend_type: &str) -> Self {
        Self {
            id: None,
            container,
            creator_user_id,
            backend_type: backend_type.to_string(),
            name: String::new(),
            title: None,
            description: None,
            enabled: true,
            ord: 0,
            public_join: false,
            join_can_start: false,
            join_can_moderate: false,
            has_waiting_room: false,
            allow_recording: true,
            mute_on_entry: false,
            image_file_id: None,
            camera_bg_image_file_id: None,
            presentation_file_id: None,
            presentation_preview_file_id: None,
            backend_config: Json::Object(Map::new()),
            moderators: ParticipantPolicy::ByPermissions,
            attendees: ParticipantPolicy::ByPermissions,
            moderator_pw: random_string(SECRET_LEN),
            attendee_pw: random_string(SECRET_LEN),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub struct SessionForm {
    db: Arc<DatabaseConnection>,
    registry: Arc<BackendRegistry>,
}

impl SessionForm {
    pub fn new(db: Arc<DatabaseConnection>, registry: Arc<BackendRegistry>) -> Self {
        Self { db, registry }
    }

    /// Draft for a new session on the container's default backend, with that
    /// backend's option defaults filled in.
    pub fn draft_for_new(
        &self,
        container: Option<Container>,
        creator_user_id: Id,
    ) -> Result<SessionDraft, Error> {
        let backend = self
            .registry
            .default_backend(container.as_ref())
            .ok_or_else(|| Error::config("No video backend is available for this container"))?;

        let mut draft = SessionDraft::for_new(container, creator_user_id, backend.id());
        draft.backend_config = with_defaults(&backend.session_config_fields(), &draft.backend_config);
        Ok(draft)
    }

    /// Rebuilds the draft of a stored session, participant lists included.
    pub async fn load_draft(&self, session: &sessions::Model) -> Result<SessionDraft, Error> {
        let db = self.db.as_ref();
        let moderators = role_user_ids(db, session.id, SessionRole::Moderator).await?;
        let attendees = role_user_ids(db, session.id, SessionRole::Attendee).await?;

        let backend_config = match self.registry.get(&session.backend_type) {
            Some(backend) => {
                split_config(&backend.session_config_fields(), &session.backend_config).0
            }
            None => session.backend_config.clone(),
        };

        Ok(SessionDraft {
            id: Some(session.id),
            container: session.container(),
            creator_user_id: session.creator_user_id,
            backend_type: session.backend_type.clone(),
            name: session.name.clone(),
            title: session.title.clone(),
            description: session.description.clone(),
            enabled: session.enabled,
            ord: session.ord,
            public_join: session.public_join,
            join_can_start: session.join_can_start,
            join_can_moderate: session.join_can_moderate,
            has_waiting_room: session.has_waiting_room,
            allow_recording: session.allow_recording,
            mute_on_entry: session.mute_on_entry,
            image_file_id: session.image_file_id,
            camera_bg_image_file_id: session.camera_bg_image_file_id,
            presentation_file_id: session.presentation_file_id,
            presentation_preview_file_id: session.presentation_preview_file_id,
            backend_config,
            moderators: ParticipantPolicy::from_rows(moderators),
            attendees: ParticipantPolicy::from_rows(attendees),
            moderator_pw: session.moderator_pw.clone(),
            attendee_pw: session.attendee_pw.clone(),
        })
    }

    /// Validates and stores the draft.
    ///
    /// Secrets are only written when the session is created. The public token is
    /// generated the first time public join is on and kept from then on. Changing
    /// the backend drops the meeting reference and the options the old backend
    /// stored for itself.
    pub async fn save(&self, draft: &SessionDraft) -> Result<sessions::Model, Error> {
        let txn = self.db.begin().await?;

        let stored = match draft.id {
            Some(id) => {
                let stored = session::find_by_id(&txn, id).await?;
                if !stored.is_active() {
                    return Err(Error::not_found());
                }
                Some(stored)
            }
            None => None,
        };
        let container = match &stored {
            Some(stored) => stored.container(),
            None => draft.container,
        };

        let name = resolve_slug(&draft.name, draft.title.as_deref())?;
        if session::name_taken(&txn, &name, container, draft.id).await? {
            return Err(Error::validation(ValidationErrorKind::SlugTaken));
        }

        if draft
            .title
            .as_deref()
            .is_some_and(|title| title.chars().count() > TITLE_MAX_LEN)
        {
            return Err(Error::validation(ValidationErrorKind::Title));
        }

        let backend = self
            .registry
            .get(&draft.backend_type)
            .filter(|_| {
                self.registry
                    .is_allowed_for_container(&draft.backend_type, container.as_ref())
            })
            .ok_or_else(|| {
                Error::validation(ValidationErrorKind::BackendNotAllowed(
                    draft.backend_type.clone(),
                ))
            })?;

        let fields = backend.session_config_fields();
        let mut config = match &draft.backend_config {
            Json::Null => Map::new(),
            Json::Object(map) => map.clone(),
            other => {
                return Err(Error::validation(ValidationErrorKind::BackendConfig(
                    format!("expected an object, got {other}"),
                )))
            }
        };
        validate_config(&fields, &Json::Object(config.clone())).map_err(|e| {
            Error::validation(ValidationErrorKind::BackendConfig(e.to_string()))
        })?;

        let backend_changed = stored
            .as_ref()
            .is_some_and(|stored| stored.backend_type != draft.backend_type);
        if let Some(stored) = stored.as_ref().filter(|_| !backend_changed) {
            for (key, value) in split_config(&fields, &stored.backend_config).1 {
                config.entry(key).or_insert(value);
            }
        }

        let public_token = stored
            .as_ref()
            .and_then(|stored| stored.public_token.clone())
            .or_else(|| draft.public_join.then(|| random_string(PUBLIC_TOKEN_LEN)));

        let saved = match &stored {
            None => {
                let now = Utc::now().fixed_offset();
                let model = sessions::Model {
                    id: entity::new_id(),
                    backend_type: draft.backend_type.clone(),
                    backend_meeting_id: None,
                    name,
                    title: draft.title.clone(),
                    description: draft.description.clone(),
                    moderator_pw: draft.moderator_pw.clone(),
                    attendee_pw: draft.attendee_pw.clone(),
                    container_id: container.map(|c| c.id),
                    container_kind: container.map(|c| c.kind),
                    creator_user_id: draft.creator_user_id,
                    enabled: draft.enabled,
                    ord: draft.ord,
                    public_join: draft.public_join,
                    public_token,
                    join_can_start: draft.join_can_start,
                    join_can_moderate: draft.join_can_moderate,
                    has_waiting_room: draft.has_waiting_room,
                    allow_recording: draft.allow_recording,
                    mute_on_entry: draft.mute_on_entry,
                    image_file_id: draft.image_file_id,
                    camera_bg_image_file_id: draft.camera_bg_image_file_id,
                    presentation_file_id: draft.presentation_file_id,
                    presentation_preview_file_id: draft.presentation_preview_file_id,
                    backend_config: Json::Object(config),
                    deleted_at: None,
                    created_at: now,
                    updated_at: now,
                };
                session::create(&txn, model).await?
            }
            Some(stored) => {
                let model = sessions::Model {
                    backend_type: draft.backend_type.clone(),
                    name,
                    title: draft.title.clone(),
                    description: draft.description.clone(),
                    enabled: draft.enabled,
                    ord: draft.ord,
                    public_join: draft.public_join,
                    public_token,
                    join_can_start: draft.join_can_start,
                    join_can_moderate: draft.join_can_moderate,
                    has_waiting_room: draft.has_waiting_room,
                    allow_recording: draft.allow_recording,
                    mute_on_entry: draft.mute_on_entry,
                    image_file_id: draft.image_file_id,
                    camera_bg_image_file_id: draft.camera_bg_image_file_id,
                    presentation_file_id: draft.presentation_file_id,
                    presentation_preview_file_id: draft.presentation_preview_file_id,
                    backend_config: Json::Object(config),
                    ..stored.clone()
                };
                let updated = session::update(&txn, stored.id, model).await?;

                if backend_changed && stored.meeting_id().is_some() {
                    info!(
                        "Session {} moved from {} to {}, dropping its meeting reference",
                        stored.id, stored.backend_type, draft.backend_type
                    );
                    session::clear_meeting_reference(&txn, stored.id).await?
                } else {
                    updated
                }
            }
        };

        replace_participants(&txn, saved.id, draft).await?;
        txn.commit().await?;

        debug!("Saved session {} ({})", saved.id, saved.name);
        Ok(saved)
    }
}

/// Writes both explicit lists. Moderators go first so an attendee listed as
/// moderator too keeps only the moderator row.
async fn replace_participants(
    db: &impl ConnectionTrait,
    session_id: Id,
    draft: &SessionDraft,
) -> Result<(), Error> {
    let moderators = draft.moderators.user_ids();

    match &draft.moderators {
        ParticipantPolicy::ByPermissions => {
            session_user::delete_for_role(db, session_id, SessionRole::Moderator).await?;
        }
        ParticipantPolicy::Explicit(user_ids) => {
            session_user::replace_for_role(db, session_id, SessionRole::Moderator, user_ids, &[])
                .await?;
        }
    }

    match &draft.attendees {
        ParticipantPolicy::ByPermissions => {
            session_user::delete_for_role(db, session_id, SessionRole::Attendee).await?;
        }
        ParticipantPolicy::Explicit(user_ids) => {
            session_user::replace_for_role(
                db,
                session_id,
                SessionRole::Attendee,
                user_ids,
                moderators,
            )
            .await?;
        }
    }

    Ok(())
}

async fn role_user_ids(
    db: &impl ConnectionTrait,
    session_id: Id,
    role: SessionRole,
) -> Result<Vec<Id>, Error> {
    Ok(session_user::find_by_session(db, session_id, Some(role))
        .await?
        .into_iter()
        .map(|row| row.user_id)
        .collect())
}

fn resolve_slug(name: &str, title: Option<&str>) -> Result<String, Error> {
    let name = name.trim();
    let slug = if name.is_empty() {
        title
            .and_then(session::slug_from_title)
            .map(|slug| truncate_slug(&slug))
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| FALLBACK_SLUG.to_string())
    } else {
        name.to_string()
    };

    session::validate_slug(&slug, SLUG_MAX_LEN)
        .map_err(|_| Error::validation(ValidationErrorKind::Slug))?;
    Ok(slug)
}

fn truncate_slug(slug: &str) -> String {
    slug.chars()
        .take(SLUG_MAX_LEN)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

/// Splits a stored blob into the declared options and the keys the backend
/// manages itself.
fn split_config(fields: &[ConfigField], blob: &Json) -> (Json, Map<String, Json>) {
    let mut declared = Map::new();
    let mut managed = Map::new();

    if let Some(map) = blob.as_object() {
        for (key, value) in map {
            if fields.iter().any(|field| &field.name == key) {
                declared.insert(key.clone(), value.clone());
            } else {
                managed.insert(key.clone(), value.clone());
            }
        }
    }

    (Json::Object(declared), managed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, InternalErrorKind};
    use crate::test_support::{database, registry, StubBackend};
    use meeting_backend::Backend;
    use serde_json::json;
    use service::settings::{MemorySettings, Settings};

    const SPACE: Id = Id::from_u128(100);

    struct Fixture {
        db: Arc<DatabaseConnection>,
        registry: Arc<BackendRegistry>,
        form: SessionForm,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(database().await);
        let settings: Arc<dyn Settings> = Arc::new(MemorySettings::new());
        let backends = [
            StubBackend::new("rooms", "Room Based").into_arc(),
            StubBackend::new("ephemeral", "Ephemeral").always_joinable().into_arc(),
        ];
        let registry = Arc::new(registry(settings, &backends));
        Fixture {
            form: SessionForm::new(db.clone(), registry.clone()),
            registry,
            db,
        }
    }

    fn user(n: u128) -> Id {
        Id::from_u128(n)
    }

    fn validation_kind(err: Error) -> ValidationErrorKind {
        match err.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Validation(kind)) => kind,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    fn draft(fixture: &Fixture, name: &str) -> SessionDraft {
        let mut draft = fixture
            .form
            .draft_for_new(Some(Container::space(SPACE)), user(1))
            .unwrap();
        draft.backend_type = "rooms".to_string();
        draft.backend_config = json!({});
        draft.name = name.to_string();
        draft
    }

    #[tokio::test]
    async fn new_draft_gets_secrets_and_backend_defaults() {
        let fixture = fixture().await;

        let draft = fixture.form.draft_for_new(None, user(1)).unwrap();

        assert!(draft.is_new());
        assert_eq!(draft.moderator_pw.len(), SECRET_LEN);
        assert_eq!(draft.attendee_pw.len(), SECRET_LEN);
        assert_ne!(draft.moderator_pw, draft.attendee_pw);
        // Backends are sorted by name, so "Ephemeral" is the first allowed.
        assert_eq!(draft.backend_type, "ephemeral");
        assert_eq!(draft.backend_config, json!({"muteAll": false, "maxUsers": 0}));
    }

    #[tokio::test]
    async fn new_draft_needs_an_allowed_backend() {
        let fixture = fixture().await;
        fixture.registry.allow_list().set_global(&["missing".to_string()]);

        let err = fixture.form.draft_for_new(None, user(1)).unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
    }

    #[tokio::test]
    async fn secrets_survive_edits() {
        let fixture = fixture().await;
        let draft = draft(&fixture, "standup");

        let created = fixture.form.save(&draft).await.unwrap();
        assert_eq!(created.moderator_pw, draft.moderator_pw);
        assert_eq!(created.container(), Some(Container::space(SPACE)));

        let mut edit = fixture.form.load_draft(&created).await.unwrap();
        edit.title = Some("Daily standup".to_string());
        edit.moderator_pw = "tampered".to_string();
        let edited = fixture.form.save(&edit).await.unwrap();

        assert_eq!(edited.moderator_pw, created.moderator_pw);
        assert_eq!(edited.attendee_pw, created.attendee_pw);
        assert_eq!(edited.display_title(), "Daily standup");
    }

    #[tokio::test]
    async fn public_token_is_generated_once() {
        let fixture = fixture().await;
        let created = fixture.form.save(&draft(&fixture, "town-hall")).await.unwrap();
        assert_eq!(created.public_token, None);

        let mut edit = fixture.form.load_draft(&created).await.unwrap();
        edit.public_join = true;
        let enabled = fixture.form.save(&edit).await.unwrap();
        let token = enabled.public_token.clone().expect("token generated");
        assert_eq!(token.len(), PUBLIC_TOKEN_LEN);

        let again = fixture.form.save(&edit).await.unwrap();
        assert_eq!(again.public_token.as_deref(), Some(token.as_str()));

        edit.public_join = false;
        let disabled = fixture.form.save(&edit).await.unwrap();
        assert_eq!(disabled.public_token.as_deref(), Some(token.as_str()));
        assert!(session::find_by_public_token(fixture.db.as_ref(), &token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn slug_falls_back_to_title_then_default() {
        let fixture = fixture().await;

        let mut titled = draft(&fixture, "");
        titled.title = Some("Quarterly Planning!".to_string());
        let saved = fixture.form.save(&titled).await.unwrap();
        assert_eq!(saved.name, "quarterly-planning");

        let untitled = fixture.form.save(&draft(&fixture, "  ")).await.unwrap();
        assert_eq!(untitled.name, FALLBACK_SLUG);
    }

    #[tokio::test]
    async fn slug_rules_are_enforced() {
        let fixture = fixture().await;

        let err = fixture.form.save(&draft(&fixture, "Bad Slug")).await.unwrap_err();
        assert_eq!(validation_kind(err), ValidationErrorKind::Slug);

        let err = fixture
            .form
            .save(&draft(&fixture, &"a".repeat(SLUG_MAX_LEN + 1)))
            .await
            .unwrap_err();
        assert_eq!(validation_kind(err), ValidationErrorKind::Slug);

        fixture.form.save(&draft(&fixture, "standup")).await.unwrap();
        let err = fixture.form.save(&draft(&fixture, "standup")).await.unwrap_err();
        assert_eq!(validation_kind(err), ValidationErrorKind::SlugTaken);

        let mut elsewhere = draft(&fixture, "standup");
        elsewhere.container = None;
        assert!(fixture.form.save(&elsewhere).await.is_ok());
    }

    #[tokio::test]
    async fn long_titles_are_rejected() {
        let fixture = fixture().await;
        let mut draft = draft(&fixture, "standup");
        draft.title = Some("x".repeat(TITLE_MAX_LEN + 1));

        let err = fixture.form.save(&draft).await.unwrap_err();

        assert_eq!(validation_kind(err), ValidationErrorKind::Title);
    }

    #[tokio::test]
    async fn backend_must_be_allowed_for_the_container() {
        let fixture = fixture().await;
        fixture
            .registry
            .allow_list()
            .set_global(&["ephemeral".to_string()]);

        let err = fixture.form.save(&draft(&fixture, "standup")).await.unwrap_err();
        assert_eq!(
            validation_kind(err),
            ValidationErrorKind::BackendNotAllowed("rooms".to_string())
        );

        let mut unknown = draft(&fixture, "standup");
        unknown.backend_type = "gone".to_string();
        let err = fixture.form.save(&unknown).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn config_is_validated_against_the_backend_schema() {
        let fixture = fixture().await;

        let mut draft = draft(&fixture, "standup");
        draft.backend_config = json!({"muteAll": "yes"});
        let err = fixture.form.save(&draft).await.unwrap_err();
        assert!(matches!(
            validation_kind(err),
            ValidationErrorKind::BackendConfig(_)
        ));

        draft.backend_config = json!({"unknownOption": true});
        assert!(fixture.form.save(&draft).await.is_err());

        draft.backend_config = json!({"muteAll": true, "maxUsers": 25});
        let saved = fixture.form.save(&draft).await.unwrap();
        assert!(saved.config_bool("muteAll", false));
    }

    #[tokio::test]
    async fn backend_managed_options_survive_edits_on_the_same_backend() {
        let fixture = fixture().await;
        let created = fixture.form.save(&draft(&fixture, "standup")).await.unwrap();
        session::set_meeting_reference(
            fixture.db.as_ref(),
            created.id,
            "m-1",
            Some(json!({"stub_join_url": "https://rooms.example.com/j"})),
        )
        .await
        .unwrap();
        let started = session::find_by_id(fixture.db.as_ref(), created.id).await.unwrap();

        let mut edit = fixture.form.load_draft(&started).await.unwrap();
        assert_eq!(edit.backend_config, json!({}));
        edit.backend_config = json!({"muteAll": true});
        let edited = fixture.form.save(&edit).await.unwrap();

        assert_eq!(edited.meeting_id(), Some("m-1"));
        assert_eq!(
            edited.backend_config,
            json!({"muteAll": true, "stub_join_url": "https://rooms.example.com/j"})
        );
    }

    #[tokio::test]
    async fn switching_backend_drops_the_meeting_reference() {
        let fixture = fixture().await;
        let created = fixture.form.save(&draft(&fixture, "standup")).await.unwrap();
        let started = session::set_meeting_reference(
            fixture.db.as_ref(),
            created.id,
            "m-1",
            Some(json!({"stub_join_url": "https://rooms.example.com/j"})),
        )
        .await
        .unwrap();

        let mut edit = fixture.form.load_draft(&started).await.unwrap();
        edit.backend_type = "ephemeral".to_string();
        let moved = fixture.form.save(&edit).await.unwrap();

        assert_eq!(moved.backend_type, "ephemeral");
        assert_eq!(moved.meeting_id(), None);
        assert_eq!(moved.config_value("stub_join_url"), None);
    }

    #[tokio::test]
    async fn explicit_lists_are_replaced_not_merged() {
        let fixture = fixture().await;
        let mut draft = draft(&fixture, "standup");
        draft.moderators = ParticipantPolicy::Explicit(vec![user(2)]);
        draft.attendees = ParticipantPolicy::Explicit(vec![user(2), user(3), user(4)]);
        let created = fixture.form.save(&draft).await.unwrap();

        let loaded = fixture.form.load_draft(&created).await.unwrap();
        assert_eq!(loaded.moderators, ParticipantPolicy::Explicit(vec![user(2)]));
        let ParticipantPolicy::Explicit(mut attendees) = loaded.attendees.clone() else {
            panic!("attendees should be explicit");
        };
        attendees.sort();
        assert_eq!(attendees, vec![user(3), user(4)]);

        let mut edit = loaded;
        edit.attendees = ParticipantPolicy::ByPermissions;
        fixture.form.save(&edit).await.unwrap();
        edit.attendees = ParticipantPolicy::Explicit(vec![user(5)]);
        fixture.form.save(&edit).await.unwrap();

        let reloaded = fixture.form.load_draft(&created).await.unwrap();
        assert_eq!(reloaded.attendees, ParticipantPolicy::Explicit(vec![user(5)]));
        assert_eq!(reloaded.moderators, ParticipantPolicy::Explicit(vec![user(2)]));

        edit.moderators = ParticipantPolicy::ByPermissions;
        edit.attendees = ParticipantPolicy::ByPermissions;
        fixture.form.save(&edit).await.unwrap();
        let cleared = fixture.form.load_draft(&created).await.unwrap();
        assert_eq!(cleared.moderators, ParticipantPolicy::ByPermissions);
        assert_eq!(cleared.attendees, ParticipantPolicy::ByPermissions);
    }

    #[tokio::test]
    async fn deleted_sessions_cannot_be_edited() {
        let fixture = fixture().await;
        let created = fixture.form.save(&draft(&fixture, "standup")).await.unwrap();
        let edit = fixture.form.load_draft(&created).await.unwrap();
        session::soft_delete(fixture.db.as_ref(), created.id).await.unwrap();

        let err = fixture.form.save(&edit).await.unwrap_err();

        assert!(!err.is_validation());
        // The slug of a deleted session is free again.
        assert!(fixture.form.save(&draft(&fixture, "standup")).await.is_ok());
    }

    #[test]
    fn split_config_separates_declared_and_managed_keys() {
        let backend = StubBackend::new("rooms", "Room Based");
        let (declared, managed) = split_config(
            &backend.session_config_fields(),
            &json!({"muteAll": true, "zoom_join_url": "https://zoom.us/j/1"}),
        );

        assert_eq!(declared, json!({"muteAll": true}));
        assert_eq!(managed.get("zoom_join_url"), Some(&json!("https://zoom.us/j/1")));
    }
}

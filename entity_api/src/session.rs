use super::error::{EntityApiErrorKind, Error};
use entity::{
    sessions::{ActiveModel, Column, Entity, Model},
    Container, ContainerKind, Id,
};
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Condition, Expr},
    ActiveValue::{Set, Unchanged},
    QueryOrder, QuerySelect,
};
use slugify::slugify;

/// Where a keyed lookup is allowed to find a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupScope {
    /// Only sessions owned by this container.
    Container(Container),
    /// Only sessions without an owning container.
    Global,
    /// Any owner.
    Any,
}

/// Which owners a cross-container listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    Global,
    Spaces,
    Users,
    All,
}

pub async fn create(db: &impl ConnectionTrait, session_model: Model) -> Result<Model, Error> {
    debug!(
        "New Session Model to be inserted: {} ({})",
        session_model.name, session_model.backend_type
    );

    let now = chrono::Utc::now();

    let session_active_model: ActiveModel = ActiveModel {
        id: Set(session_model.id),
        backend_type: Set(session_model.backend_type),
        backend_meeting_id: Set(session_model.backend_meeting_id),
        name: Set(session_model.name),
        title: Set(session_model.title),
        description: Set(session_model.description),
        moderator_pw: Set(session_model.moderator_pw),
        attendee_pw: Set(session_model.attendee_pw),
        container_id: Set(session_model.container_id),
        container_kind: Set(session_model.container_kind),
        creator_user_id: Set(session_model.creator_user_id),
        enabled: Set(session_model.enabled),
        ord: Set(session_model.ord),
        public_join: Set(session_model.public_join),
        public_token: Set(session_model.public_token),
        join_can_start: Set(session_model.join_can_start),
        join_can_moderate: Set(session_model.join_can_moderate),
        has_waiting_room: Set(session_model.has_waiting_room),
        allow_recording: Set(session_model.allow_recording),
        mute_on_entry: Set(session_model.mute_on_entry),
        image_file_id: Set(session_model.image_file_id),
        camera_bg_image_file_id: Set(session_model.camera_bg_image_file_id),
        presentation_file_id: Set(session_model.presentation_file_id),
        presentation_preview_file_id: Set(session_model.presentation_preview_file_id),
        backend_config: Set(session_model.backend_config),
        deleted_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    Ok(session_active_model.insert(db).await?)
}

/// Writes the editable attributes of `model` onto the stored session.
///
/// Secrets, creator, owning container, meeting reference and lifecycle are never
/// touched here; they have dedicated operations.
pub async fn update(db: &impl ConnectionTrait, id: Id, model: Model) -> Result<Model, Error> {
    let session = find_by_id(db, id).await?;
    debug!("Existing Session model to be Updated: {}", session.id);

    let active_model: ActiveModel = ActiveModel {
        id: Unchanged(session.id),
        backend_type: Set(model.backend_type),
        backend_meeting_id: Unchanged(session.backend_meeting_id),
        name: Set(model.name),
        title: Set(model.title),
        description: Set(model.description),
        moderator_pw: Unchanged(session.moderator_pw),
        attendee_pw: Unchanged(session.attendee_pw),
        container_id: Unchanged(session.container_id),
        container_kind: Unchanged(session.container_kind),
        creator_user_id: Unchanged(session.creator_user_id),
        enabled: Set(model.enabled),
        ord: Set(model.ord),
        public_join: Set(model.public_join),
        public_token: Set(model.public_token),
        join_can_start: Set(model.join_can_start),
        join_can_moderate: Set(model.join_can_moderate),
        has_waiting_room: Set(model.has_waiting_room),
        allow_recording: Set(model.allow_recording),
        mute_on_entry: Set(model.mute_on_entry),
        image_file_id: Set(model.image_file_id),
        camera_bg_image_file_id: Set(model.camera_bg_image_file_id),
        presentation_file_id: Set(model.presentation_file_id),
        presentation_preview_file_id: Set(model.presentation_preview_file_id),
        backend_config: Set(model.backend_config),
        deleted_at: Unchanged(session.deleted_at),
        created_at: Unchanged(session.created_at),
        updated_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.update(db).await?)
}

/// Stores the provider-assigned meeting reference, but only while the session has none.
///
/// The write is conditional on the reference still being empty, so two concurrent
/// starts cannot both record a reference. The returned model always carries the
/// reference that won. `config` replaces the config blob when given.
pub async fn set_meeting_reference(
    db: &impl ConnectionTrait,
    id: Id,
    meeting_id: &str,
    config: Option<Json>,
) -> Result<Model, Error> {
    let mut update = Entity::update_many()
        .col_expr(Column::BackendMeetingId, Expr::value(meeting_id.to_string()))
        .col_expr(
            Column::UpdatedAt,
            Expr::value(chrono::Utc::now().fixed_offset()),
        )
        .filter(Column::Id.eq(id))
        .filter(
            Condition::any()
                .add(Column::BackendMeetingId.is_null())
                .add(Column::BackendMeetingId.eq("")),
        );

    if let Some(config) = config {
        update = update.col_expr(Column::BackendConfig, Expr::value(config));
    }

    let result = update.exec(db).await?;
    if result.rows_affected == 0 {
        warn!("Session {id} already carries a meeting reference, keeping the stored one");
    }

    find_by_id(db, id).await
}

/// Swaps a stale meeting reference for a new one.
///
/// Written only while the stored reference is still `previous`; otherwise the stored
/// row is returned unchanged.
pub async fn replace_meeting_reference(
    db: &impl ConnectionTrait,
    id: Id,
    previous: &str,
    meeting_id: &str,
    config: Option<Json>,
) -> Result<Model, Error> {
    let mut update = Entity::update_many()
        .col_expr(Column::BackendMeetingId, Expr::value(meeting_id.to_string()))
        .col_expr(
            Column::UpdatedAt,
            Expr::value(chrono::Utc::now().fixed_offset()),
        )
        .filter(Column::Id.eq(id))
        .filter(Column::BackendMeetingId.eq(previous));

    if let Some(config) = config {
        update = update.col_expr(Column::BackendConfig, Expr::value(config));
    }

    let result = update.exec(db).await?;
    if result.rows_affected == 0 {
        warn!("Meeting reference of session {id} changed since {previous}, keeping the stored one");
    }

    find_by_id(db, id).await
}

/// Drops the meeting reference so the next start creates a fresh meeting.
pub async fn clear_meeting_reference(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    let session = find_by_id(db, id).await?;
    debug!("Clearing meeting reference of session {id}");

    let active_model = ActiveModel {
        id: Unchanged(session.id),
        backend_meeting_id: Set(None),
        updated_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    Ok(active_model.update(db).await?)
}

/// Marks the session deleted. The row stays so that anything still pointing at it resolves.
pub async fn soft_delete(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    let session = find_by_id(db, id).await?;
    if !session.is_active() {
        return Ok(session);
    }

    let now = chrono::Utc::now();
    let active_model = ActiveModel {
        id: Unchanged(session.id),
        deleted_at: Set(Some(now.into())),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(active_model.update(db).await?)
}

/// Loads a session regardless of its lifecycle.
pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Like [`find_by_id`], holding a row lock until the surrounding transaction ends.
///
/// SQLite has no row locks; there the single writer serializes instead.
pub async fn find_by_id_for_update(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Loads a non-deleted session visible in `scope`.
pub async fn find_active(
    db: &impl ConnectionTrait,
    id: Id,
    scope: LookupScope,
) -> Result<Option<Model>, Error> {
    let query = Entity::find_by_id(id).filter(Column::DeletedAt.is_null());

    let query = match scope {
        LookupScope::Container(container) => query.filter(in_container(container)),
        LookupScope::Global => query.filter(Column::ContainerId.is_null()),
        LookupScope::Any => query,
    };

    Ok(query.one(db).await?)
}

/// Resolves a guest token. Empty tokens, disabled public join and deleted sessions
/// never resolve.
pub async fn find_by_public_token(
    db: &impl ConnectionTrait,
    token: &str,
) -> Result<Option<Model>, Error> {
    if token.trim().is_empty() {
        return Ok(None);
    }

    Ok(Entity::find()
        .filter(Column::PublicToken.eq(token))
        .filter(Column::PublicJoin.eq(true))
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?)
}

/// Non-deleted sessions of one container, or the global sessions when `container` is `None`.
pub async fn find_by_container(
    db: &impl ConnectionTrait,
    container: Option<Container>,
    only_enabled: bool,
) -> Result<Vec<Model>, Error> {
    let owner = match container {
        Some(container) => in_container(container),
        None => Condition::all().add(Column::ContainerId.is_null()),
    };

    list(db, owner, only_enabled).await
}

pub async fn find_by_scope(
    db: &impl ConnectionTrait,
    scope: ListScope,
    only_enabled: bool,
) -> Result<Vec<Model>, Error> {
    let owner = match scope {
        ListScope::Global => Condition::all().add(Column::ContainerId.is_null()),
        ListScope::Spaces => Condition::all().add(Column::ContainerKind.eq(ContainerKind::Space)),
        ListScope::Users => Condition::all().add(Column::ContainerKind.eq(ContainerKind::User)),
        ListScope::All => Condition::all(),
    };

    list(db, owner, only_enabled).await
}

async fn list(
    db: &impl ConnectionTrait,
    owner: Condition,
    only_enabled: bool,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find()
        .filter(owner)
        .filter(Column::DeletedAt.is_null());

    if only_enabled {
        query = query.filter(Column::Enabled.eq(true));
    }

    Ok(query
        .order_by_asc(Column::Ord)
        .order_by_desc(Column::Id)
        .all(db)
        .await?)
}

/// Whether another non-deleted session in the same owning scope already uses `name`.
pub async fn name_taken(
    db: &impl ConnectionTrait,
    name: &str,
    container: Option<Container>,
    exclude_id: Option<Id>,
) -> Result<bool, Error> {
    let owner = match container {
        Some(container) => in_container(container),
        None => Condition::all().add(Column::ContainerId.is_null()),
    };

    let mut query = Entity::find()
        .filter(owner)
        .filter(Column::Name.eq(name))
        .filter(Column::DeletedAt.is_null());

    if let Some(id) = exclude_id {
        query = query.filter(Column::Id.ne(id));
    }

    Ok(query.count(db).await? > 0)
}

/// URL-safe slug derived from a title, or `None` when nothing usable remains.
pub fn slug_from_title(title: &str) -> Option<String> {
    let slug = slugify!(title);
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Checks a caller-supplied slug: lowercase ASCII letters, digits and dashes, at most
/// `max_len` characters.
pub fn validate_slug(name: &str, max_len: usize) -> Result<(), Error> {
    let valid = !name.is_empty()
        && name.len() <= max_len
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::ValidationError,
        })
    }
}

fn in_container(container: Container) -> Condition {
    Condition::all()
        .add(Column::ContainerId.eq(container.id))
        .add(Column::ContainerKind.eq(container.kind))
}

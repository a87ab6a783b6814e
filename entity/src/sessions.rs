//! SeaORM Entity for the sessions table.
//! One row per conferencing unit, bound to exactly one provider.

use crate::container_kind::{Container, ContainerKind};
use crate::lifecycle::Lifecycle;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    /// Registry key of the provider serving this session.
    pub backend_type: String,

    /// Provider-assigned meeting reference. Only meaningful together with `backend_type`.
    pub backend_meeting_id: Option<String>,

    /// URL-safe slug, unique within the owning scope.
    pub name: String,

    pub title: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[serde(skip_serializing)]
    pub moderator_pw: String,

    #[serde(skip_serializing)]
    pub attendee_pw: String,

    pub container_id: Option<Id>,

    pub container_kind: Option<ContainerKind>,

    pub creator_user_id: Id,

    pub enabled: bool,

    /// Ordering hint, ascending.
    pub ord: i32,

    pub public_join: bool,

    /// Opaque guest token, generated the first time public join is enabled.
    #[serde(skip_serializing)]
    pub public_token: Option<String>,

    /// Participants may start the meeting.
    pub join_can_start: bool,

    /// Participants are moderators.
    pub join_can_moderate: bool,

    pub has_waiting_room: bool,

    pub allow_recording: bool,

    pub mute_on_entry: bool,

    pub image_file_id: Option<Id>,

    pub camera_bg_image_file_id: Option<Id>,

    pub presentation_file_id: Option<Id>,

    pub presentation_preview_file_id: Option<Id>,

    /// Provider-specific options, validated against the provider's field schema on save.
    pub backend_config: Json,

    pub deleted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::session_users::Entity")]
    SessionUsers,

    #[sea_orm(has_many = "super::session_event_logs::Entity")]
    SessionEventLogs,
}

impl Related<super::session_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SessionUsers.def()
    }
}

impl Related<super::session_event_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SessionEventLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_deleted_at(self.deleted_at)
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle().is_active()
    }

    /// The owning scope, or `None` for a global session.
    pub fn container(&self) -> Option<Container> {
        match (self.container_id, self.container_kind) {
            (Some(id), Some(kind)) => Some(Container { id, kind }),
            _ => None,
        }
    }

    pub fn meeting_id(&self) -> Option<&str> {
        self.backend_meeting_id
            .as_deref()
            .filter(|meeting_id| !meeting_id.is_empty())
    }

    /// Title for display, falling back to the slug.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn config_value(&self, key: &str) -> Option<&Json> {
        self.backend_config.as_object().and_then(|map| map.get(key))
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config_value(key)
            .and_then(Json::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Reads a boolean option. Accepts JSON booleans as well as `"1"`/`"0"` strings and
    /// numbers so that blobs written by older forms still read correctly.
    pub fn config_bool(&self, key: &str, default: bool) -> bool {
        match self.config_value(key) {
            Some(Json::Bool(value)) => *value,
            Some(Json::Number(number)) => number.as_i64().map(|n| n != 0).unwrap_or(default),
            Some(Json::String(value)) => matches!(value.as_str(), "1" | "true"),
            _ => default,
        }
    }

    pub fn config_i64(&self, key: &str) -> Option<i64> {
        match self.config_value(key)? {
            Json::Number(number) => number.as_i64(),
            Json::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }
}

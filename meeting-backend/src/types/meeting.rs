//! Meeting references and participant identities.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use entity::Id;

/// Provider-assigned reference to a created meeting.
///
/// `meeting_id` is opaque outside the adapter that produced it. `config_updates`
/// are entries the adapter wants merged into the session's option blob (e.g. join
/// and start links handed out by the provider at creation time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRef {
    pub meeting_id: String,
    #[serde(default)]
    pub config_updates: Map<String, Value>,
}

impl MeetingRef {
    pub fn new(meeting_id: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            config_updates: Map::new(),
        }
    }

    pub fn with_config(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config_updates.insert(key.to_string(), value.into());
        self
    }

    /// `base` with the config updates merged over it.
    pub fn merged_config(&self, base: &Value) -> Value {
        let mut map = base.as_object().cloned().unwrap_or_default();
        for (key, value) in &self.config_updates {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Who is joining. Guests joining through a public link have no `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Option<Id>,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl Participant {
    pub fn user(id: Id, display_name: &str) -> Self {
        Self {
            id: Some(id),
            display_name: display_name.to_string(),
            email: None,
            avatar_url: None,
        }
    }

    pub fn guest(display_name: &str) -> Self {
        let display_name = display_name.trim();
        Self {
            id: None,
            display_name: if display_name.is_empty() {
                "Guest".to_string()
            } else {
                display_name.to_string()
            },
            email: None,
            avatar_url: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_avatar_url(mut self, avatar_url: &str) -> Self {
        self.avatar_url = Some(avatar_url.to_string());
        self
    }

    pub fn is_guest(&self) -> bool {
        self.id.is_none()
    }
}

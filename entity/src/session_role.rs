use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role granted by an explicit per-user override row.
#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Serialize, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SessionRole {
    #[sea_orm(string_value = "moderator")]
    Moderator,
    #[sea_orm(string_value = "attendee")]
    Attendee,
}

impl SessionRole {
    /// Start permission implied by the role when an override row is written.
    pub fn default_can_start(&self) -> bool {
        matches!(self, SessionRole::Moderator)
    }
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Moderator => write!(fmt, "moderator"),
            SessionRole::Attendee => write!(fmt, "attendee"),
        }
    }
}

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The kind of organizational unit that can own sessions.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Deserialize, Serialize, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ContainerKind {
    /// A group workspace with members.
    #[sea_orm(string_value = "space")]
    Space,
    /// A personal profile.
    #[sea_orm(string_value = "user")]
    User,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerKind::Space => write!(fmt, "space"),
            ContainerKind::User => write!(fmt, "user"),
        }
    }
}

/// Reference to the owning scope of a session. Sessions without one are global.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Container {
    pub id: Id,
    pub kind: ContainerKind,
}

impl Container {
    pub fn space(id: Id) -> Self {
        Self {
            id,
            kind: ContainerKind::Space,
        }
    }

    pub fn user(id: Id) -> Self {
        Self {
            id,
            kind: ContainerKind::User,
        }
    }
}

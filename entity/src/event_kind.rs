use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Serialize, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum EventKind {
    #[sea_orm(string_value = "started")]
    Started,
    #[sea_orm(string_value = "stopped")]
    Stopped,
    #[sea_orm(string_value = "joined")]
    Joined,
    #[sea_orm(string_value = "left")]
    Left,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Started => write!(fmt, "started"),
            EventKind::Stopped => write!(fmt, "stopped"),
            EventKind::Joined => write!(fmt, "joined"),
            EventKind::Left => write!(fmt, "left"),
        }
    }
}

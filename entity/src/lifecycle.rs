use sea_orm::prelude::DateTimeWithTimeZone;

/// Whether a session can still be used. Deleted sessions keep their row so that
/// anything still referencing them resolves, but they never show up in lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Deleted(DateTimeWithTimeZone),
}

impl Lifecycle {
    pub fn from_deleted_at(deleted_at: Option<DateTimeWithTimeZone>) -> Self {
        match deleted_at {
            Some(at) => Lifecycle::Deleted(at),
            None => Lifecycle::Active,
        }
    }

    pub fn deleted_at(&self) -> Option<DateTimeWithTimeZone> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted(at) => Some(*at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

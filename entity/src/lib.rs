use uuid::Uuid;

pub mod container_kind;
pub mod event_kind;
pub mod lifecycle;
pub mod session_event_logs;
pub mod session_role;
pub mod session_users;
pub mod sessions;

pub use container_kind::{Container, ContainerKind};

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;

/// Generates a time-ordered id so that sorting by id descending lists the newest rows first.
pub fn new_id() -> Id {
    Uuid::now_v7()
}

pub use entity::{
    session_event_logs, session_users, sessions, Container, ContainerKind, Id,
};

pub mod error;
pub mod session;
pub mod session_event_log;
pub mod session_user;

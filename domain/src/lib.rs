//! Video-conferencing sessions over pluggable backends.
//!
//! The crate wires the backend registry, the authorization resolver and the
//! orchestration service together, and ships the built-in backends under
//! [`gateway`].
//!
//! Persistence types are re-exported from `entity_api` so that callers of `domain`
//! never depend on the entity layer directly.
pub use entity_api::{
    session::{ListScope, LookupScope},
    session_event_logs, session_users, sessions, Container, ContainerKind, Id,
};

pub use meeting_backend::{Backend, BackendDescriptor, Participant, Recording};

pub mod authorization;
pub mod backend;
pub mod error;
pub mod event_log;
pub mod flows;
pub mod gateway;
pub mod jwt;
pub mod session;
pub mod session_form;

pub use authorization::{Authorization, Capabilities, GroupPermissions, PermissionChecker};
pub use backend::{BackendContext, BackendLoader, BackendRegistry};
pub use event_log::EventLogHandler;
pub use flows::{FlowError, Flows, JoinTarget};
pub use session::{LobbyState, SessionService};
pub use session_form::{ParticipantPolicy, SessionDraft, SessionForm};

#[cfg(test)]
pub(crate) mod test_support;

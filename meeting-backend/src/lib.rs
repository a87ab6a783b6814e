//! Conferencing backend abstraction.
//!
//! This crate defines the contract every video-conferencing provider adapter
//! implements:
//! - Identification and configuration readiness
//! - The meeting lifecycle (create, join, is-running, end)
//! - Feature flags with shared defaults
//! - Optional recording management
//! - A declarative schema for provider-specific session options
//!
//! Providers differ wildly (pre-created rooms, ephemeral URL rooms, OAuth-managed
//! SaaS meetings), yet callers only ever see [`Backend`].

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::Error;
pub use traits::backend::Backend;
pub use types::config_field::{validate_config, with_defaults, ConfigField, FieldKind};
pub use types::descriptor::{BackendDescriptor, Features};
pub use types::meeting::{MeetingRef, Participant};
pub use types::recording::{Recording, RecordingState};

/// The persisted session as adapters see it.
pub type Session = entity::sessions::Model;

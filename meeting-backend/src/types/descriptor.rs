//! In-memory description of a registered backend.

use serde::Serialize;

/// Feature-support flags of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Features {
    pub recordings: bool,
    pub waiting_room: bool,
    pub presentation_upload: bool,
    pub public_join: bool,
    pub camera_background: bool,
    pub layout_options: bool,
    pub embed: bool,
    pub always_joinable: bool,
}

/// Snapshot of a backend's identity, readiness and features. Never persisted;
/// `configured` reflects the settings at the moment the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub configured: bool,
    pub features: Features,
}

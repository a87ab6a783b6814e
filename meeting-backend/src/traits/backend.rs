//! The capability contract implemented by every conferencing provider adapter.

use async_trait::async_trait;

use crate::error::Error;
use crate::types::config_field::ConfigField;
use crate::types::descriptor::{BackendDescriptor, Features};
use crate::types::meeting::{MeetingRef, Participant};
use crate::types::recording::Recording;
use crate::Session;

/// A video-conferencing provider.
///
/// Only identification, readiness and the four lifecycle operations are
/// required. Feature flags and recording operations carry shared defaults so an
/// adapter overrides only what differs:
///
/// | feature | default |
/// |---|---|
/// | waiting room, public join, embed | supported |
/// | recordings, presentation upload, camera background, layout options | unsupported |
/// | always joinable | no |
///
/// Recording operations on a backend without recording support fail with
/// [`Error::Unsupported`] rather than returning an empty result.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable lowercase identifier, also the settings namespace.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn icon(&self) -> &str;

    fn description(&self) -> String {
        format!("{} video conferencing backend", self.name())
    }

    /// True iff every setting this provider needs is present. Side-effect free.
    fn is_configured(&self) -> bool;

    /// Schema of the provider-specific session options.
    fn session_config_fields(&self) -> Vec<ConfigField> {
        Vec::new()
    }

    /// Creates the remote meeting for `session`.
    ///
    /// Callers invoke this while the session carries no meeting reference, or when
    /// the stored one is stale: the backend is recreate-safe or
    /// [`Backend::meeting_exists`] said the meeting is gone.
    async fn create_meeting(&self, session: &Session) -> Result<MeetingRef, Error>;

    /// Creating again for a session that already has a meeting is harmless and
    /// revives an ended meeting under the same reference.
    fn is_recreate_safe(&self) -> bool {
        false
    }

    /// Whether the referenced remote meeting still exists, running or not. Only
    /// consulted for backends that are not recreate-safe.
    async fn meeting_exists(&self, session: &Session) -> Result<bool, Error> {
        Ok(session.meeting_id().is_some())
    }

    async fn join_url(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
    ) -> Result<String, Error>;

    /// Join link for a guest without an account.
    async fn anonymous_join_url(
        &self,
        session: &Session,
        display_name: &str,
    ) -> Result<String, Error> {
        if !self.supports_public_join() {
            return Err(Error::unsupported("Public join"));
        }

        self.join_url(session, &Participant::guest(display_name), false)
            .await
    }

    /// Whether the remote meeting is live. A session that was never started is
    /// not running; that is `Ok(false)`, not an error.
    async fn is_running(&self, session: &Session) -> Result<bool, Error>;

    async fn end_meeting(&self, session: &Session) -> Result<bool, Error>;

    fn supports_recordings(&self) -> bool {
        false
    }

    fn supports_waiting_room(&self) -> bool {
        true
    }

    fn supports_presentation_upload(&self) -> bool {
        false
    }

    fn supports_public_join(&self) -> bool {
        true
    }

    fn supports_camera_background(&self) -> bool {
        false
    }

    fn supports_layout_options(&self) -> bool {
        false
    }

    fn supports_embed(&self) -> bool {
        true
    }

    /// Rooms that exist on demand and never report running. Lobby logic skips the
    /// running check for these and treats them as joinable.
    fn is_always_joinable(&self) -> bool {
        false
    }

    async fn recordings(&self, _session: &Session) -> Result<Vec<Recording>, Error> {
        Err(Error::unsupported("Recordings"))
    }

    async fn publish_recording(
        &self,
        _session: &Session,
        _recording_id: &str,
        _publish: bool,
    ) -> Result<bool, Error> {
        Err(Error::unsupported("Recordings"))
    }

    async fn delete_recording(&self, _session: &Session, _recording_id: &str) -> Result<bool, Error> {
        Err(Error::unsupported("Recordings"))
    }

    fn features(&self) -> Features {
        Features {
            recordings: self.supports_recordings(),
            waiting_room: self.supports_waiting_room(),
            presentation_upload: self.supports_presentation_upload(),
            public_join: self.supports_public_join(),
            camera_background: self.supports_camera_background(),
            layout_options: self.supports_layout_options(),
            embed: self.supports_embed(),
            always_joinable: self.is_always_joinable(),
        }
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            id: self.id().to_string(),
            name: self.name().to_string(),
            icon: self.icon().to_string(),
            description: self.description(),
            configured: self.is_configured(),
            features: self.features(),
        }
    }
}

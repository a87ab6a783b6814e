//! Jitsi Meet adapter.
//!
//! Jitsi rooms exist as soon as someone opens their URL, so there is no server
//! API to call. The adapter derives a stable room name from the session id and
//! passes per-session options in the URL fragment. Deployments with token
//! authentication get a signed room token appended as `jwt`.

use crate::backend::BackendContext;
use crate::jwt::{generate_jitsi_token, JitsiTokenRequest};
use async_trait::async_trait;
use log::*;
use meeting_backend::{Backend, ConfigField, Error as BackendError, MeetingRef, Participant, Session};
use secrecy::SecretString;
use serde_json::{Map, Value};
use service::config::{DEFAULT_JITSI_DOMAIN, DEFAULT_JITSI_ROOM_PREFIX};
use service::settings::ProviderSettings;
use std::sync::Arc;

pub const ID: &str = "jitsi";

pub fn build(context: &BackendContext) -> Result<Arc<dyn Backend>, BackendError> {
    Ok(Arc::new(Jitsi::new(context)))
}

pub struct Jitsi {
    settings: ProviderSettings,
}

impl Jitsi {
    pub fn new(context: &BackendContext) -> Self {
        Self {
            settings: context.provider_settings(ID),
        }
    }

    fn domain(&self) -> String {
        self.settings
            .get_or("domain", DEFAULT_JITSI_DOMAIN)
            .trim_end_matches('/')
            .to_string()
    }

    fn room_name(&self, session: &Session) -> String {
        if let Some(room) = session.meeting_id() {
            return room.to_string();
        }
        let prefix = self.settings.get_or("roomPrefix", DEFAULT_JITSI_ROOM_PREFIX);
        format!("{}_{}", prefix, session.id.simple())
    }

    /// App id and secret, only when both are set.
    fn jwt_credentials(&self) -> Option<(String, SecretString)> {
        let app_id = self.settings.get("jwtAppId")?;
        let secret = self.settings.get("jwtSecret")?;
        Some((app_id, SecretString::from(secret)))
    }

    fn room_config(&self, session: &Session, is_moderator: bool) -> Map<String, Value> {
        let mut config = Map::new();

        if session.mute_on_entry {
            config.insert("startWithAudioMuted".to_string(), Value::Bool(true));
            config.insert("startWithVideoMuted".to_string(), Value::Bool(true));
        } else if session.config_bool("startWithVideoMuted", false) {
            config.insert("startWithVideoMuted".to_string(), Value::Bool(true));
        }

        if session.has_waiting_room && is_moderator {
            config.insert("enableLobby".to_string(), Value::Bool(true));
        }

        if let Some(title) = session.title.as_deref().filter(|t| !t.is_empty()) {
            config.insert("subject".to_string(), Value::String(title.to_string()));
        }

        if !session.allow_recording {
            config.insert("disableRecording".to_string(), Value::Bool(true));
        }

        if session.config_bool("disableDeepLinking", true) {
            config.insert("disableDeepLinking".to_string(), Value::Bool(true));
        }

        config
    }

    fn room_url(&self, session: &Session, params: Vec<(&str, String)>) -> String {
        let mut url = format!("https://{}/{}", self.domain(), self.room_name(session));
        if !params.is_empty() {
            let fragment = params
                .iter()
                .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('#');
            url.push_str(&fragment);
        }
        url
    }
}

#[async_trait]
impl Backend for Jitsi {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Jitsi Meet"
    }

    fn icon(&self) -> &str {
        "fa-comments"
    }

    fn description(&self) -> String {
        "Free, open-source video conferencing. No account required. Uses public or self-hosted Jitsi servers.".to_string()
    }

    fn is_configured(&self) -> bool {
        self.settings.get("domain").is_some()
    }

    fn session_config_fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::checkbox("startWithVideoMuted", "Start with video muted")
                .with_hint("Participants join with camera off")
                .with_default(false),
            ConfigField::checkbox("disableDeepLinking", "Disable app download prompt")
                .with_hint("Skip the mobile app download suggestion")
                .with_default(true),
        ]
    }

    async fn create_meeting(&self, session: &Session) -> Result<MeetingRef, BackendError> {
        Ok(MeetingRef::new(self.room_name(session)))
    }

    async fn join_url(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
    ) -> Result<String, BackendError> {
        let mut params = vec![("userInfo.displayName", participant.display_name.clone())];

        if let Some(email) = participant.email.as_deref().filter(|e| !e.is_empty()) {
            params.push(("userInfo.email", email.to_string()));
        }

        let config = self.room_config(session, is_moderator);
        if !config.is_empty() {
            params.push(("config", Value::Object(config).to_string()));
        }

        if let Some((app_id, secret)) = self.jwt_credentials() {
            let room = self.room_name(session);
            let domain = self.domain();
            let token = generate_jitsi_token(&JitsiTokenRequest {
                app_id: &app_id,
                secret: &secret,
                domain: &domain,
                room: &room,
                participant,
                is_moderator,
                allow_recording: session.allow_recording,
            })
            .map_err(|e| {
                warn!("Failed to sign Jitsi token for session {}: {e}", session.id);
                BackendError::Other(Box::new(e))
            })?;
            params.push(("jwt", token));
        }

        Ok(self.room_url(session, params))
    }

    async fn anonymous_join_url(
        &self,
        session: &Session,
        display_name: &str,
    ) -> Result<String, BackendError> {
        let guest = Participant::guest(display_name);
        let mut params = vec![("userInfo.displayName", guest.display_name)];

        let config = self.room_config(session, false);
        if !config.is_empty() {
            params.push(("config", Value::Object(config).to_string()));
        }

        Ok(self.room_url(session, params))
    }

    /// Jitsi has no API to ask whether a room is occupied.
    async fn is_running(&self, _session: &Session) -> Result<bool, BackendError> {
        Ok(false)
    }

    /// Rooms close by themselves once the last participant leaves.
    async fn end_meeting(&self, _session: &Session) -> Result<bool, BackendError> {
        Ok(true)
    }

    fn is_always_joinable(&self) -> bool {
        true
    }
}

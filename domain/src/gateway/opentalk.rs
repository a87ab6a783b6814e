//! OpenTalk adapter.
//!
//! Rooms are created through the controller API with a static bearer token.
//! Each join asks the controller for a personal invite link and falls back to
//! the plain room URL of the web frontend when that fails.

use super::{decode_error, failure, network_error};
use crate::backend::BackendContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use meeting_auth::api_key::BearerTokenAuth;
use meeting_auth::http::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};
use meeting_backend::{
    Backend, ConfigField, Error as BackendError, MeetingRef, Participant, Recording,
    RecordingState, Session,
};
use rand::Rng;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{json, Value};
use service::settings::ProviderSettings;
use std::sync::{Arc, Mutex};

pub const ID: &str = "opentalk";
const NAME: &str = "OpenTalk";

pub fn build(context: &BackendContext) -> Result<Arc<dyn Backend>, BackendError> {
    Ok(Arc::new(OpenTalk::new(context)))
}

pub struct OpenTalk {
    settings: ProviderSettings,
    http_config: HttpClientConfig,
    /// Client for the current token, rebuilt when the token changes.
    client: Mutex<Option<(String, AuthenticatedClient)>>,
}

impl OpenTalk {
    pub fn new(context: &BackendContext) -> Self {
        Self {
            settings: context.provider_settings(ID),
            http_config: context.http.clone(),
            client: Mutex::new(None),
        }
    }

    fn api_url(&self) -> Result<String, BackendError> {
        self.settings
            .get("apiUrl")
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| BackendError::NotConfigured("OpenTalk API URL is not set".to_string()))
    }

    fn frontend_url(&self) -> Result<String, BackendError> {
        match self.settings.get("frontendUrl") {
            Some(url) => Ok(url.trim_end_matches('/').to_string()),
            None => self.api_url(),
        }
    }

    fn client(&self) -> Result<AuthenticatedClient, BackendError> {
        let token = self
            .settings
            .get("apiToken")
            .ok_or_else(|| BackendError::NotConfigured("OpenTalk API token is not set".to_string()))?;

        let mut cached = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_token, client)) = cached.as_ref() {
            if *cached_token == token {
                return Ok(client.clone());
            }
        }

        let client = AuthenticatedClientBuilder::new()
            .with_auth(Box::new(BearerTokenAuth::new(
                ID,
                SecretString::from(token.clone()),
            )))
            .with_timeout(self.http_config.timeout)
            .with_max_retries(self.http_config.max_retries)
            .with_user_agent(self.http_config.user_agent.clone())
            .build()?;

        *cached = Some((token, client.clone()));
        Ok(client)
    }

    fn room_id<'a>(&self, session: &'a Session) -> Result<&'a str, BackendError> {
        session.meeting_id().ok_or_else(|| {
            BackendError::NotFound(format!("Session {} has no OpenTalk room yet", session.id))
        })
    }

    async fn room(&self, room_id: &str) -> Result<ApiRoom, BackendError> {
        let url = format!("{}/v1/rooms/{room_id}", self.api_url()?);
        let response = self
            .client()?
            .get(&url)
            .send()
            .await
            .map_err(|e| network_error(NAME, "get room", e))?;

        if !response.status().is_success() {
            return Err(failure(NAME, "get room", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| decode_error(NAME, "get room", e))
    }

    /// Requests a personal invite link, or `None` when the controller refuses.
    async fn invite_link(&self, room_id: &str, invite: Value) -> Result<Option<String>, BackendError> {
        let url = format!("{}/v1/rooms/{room_id}/invites", self.api_url()?);
        let response = self
            .client()?
            .post(&url)
            .json(&invite)
            .send()
            .await
            .map_err(|e| network_error(NAME, "create invite", e))?;

        if !response.status().is_success() {
            failure(NAME, "create invite", response).await;
            return Ok(None);
        }

        let invite: ApiInvite = response
            .json()
            .await
            .map_err(|e| decode_error(NAME, "create invite", e))?;
        Ok(invite.invite_link.filter(|link| !link.is_empty()))
    }
}

#[async_trait]
impl Backend for OpenTalk {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        NAME
    }

    fn icon(&self) -> &str {
        "fa-users"
    }

    fn description(&self) -> String {
        "Secure open-source video conferencing made in Germany".to_string()
    }

    fn is_configured(&self) -> bool {
        self.settings.get("apiUrl").is_some() && self.settings.get("apiToken").is_some()
    }

    fn session_config_fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::checkbox("enableSip", "Enable SIP dial-in")
                .with_hint("Allow participants to join via phone/SIP")
                .with_default(false),
            ConfigField::checkbox("enableChat", "Enable chat")
                .with_hint("Allow text chat during the meeting")
                .with_default(true),
            ConfigField::checkbox("enableScreenShare", "Enable screen sharing")
                .with_hint("Allow participants to share their screen")
                .with_default(true),
            ConfigField::checkbox("enableTimer", "Show meeting timer")
                .with_hint("Display elapsed meeting time")
                .with_default(false),
        ]
    }

    async fn create_meeting(&self, session: &Session) -> Result<MeetingRef, BackendError> {
        let password = if session.public_join {
            None
        } else {
            Some(room_password())
        };

        let body = json!({
            "title": session.display_title(),
            "description": session.description.clone().unwrap_or_default(),
            "password": password,
            "waiting_room": session.has_waiting_room,
            "enable_sip": session.config_bool("enableSip", false),
        });

        let url = format!("{}/v1/rooms", self.api_url()?);
        let response = self
            .client()?
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(NAME, "create room", e))?;

        if !response.status().is_success() {
            return Err(failure(NAME, "create room", response).await);
        }

        let room: ApiRoom = response
            .json()
            .await
            .map_err(|e| decode_error(NAME, "create room", e))?;
        let room_id = room.id.ok_or_else(|| {
            BackendError::Provider("OpenTalk did not return a room id".to_string())
        })?;
        info!("Created OpenTalk room {room_id} for session {}", session.id);

        let mut meeting = MeetingRef::new(room_id);
        if let Some(invite_code) = room.invite_code {
            meeting = meeting.with_config("opentalk_invite_code", invite_code);
        }
        Ok(meeting)
    }

    async fn join_url(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
    ) -> Result<String, BackendError> {
        let room_id = self.room_id(session)?;

        let invite = json!({
            "room_id": room_id,
            "display_name": participant.display_name,
            "email": participant.email.clone().unwrap_or_default(),
            "avatar_url": participant.avatar_url.clone().unwrap_or_default(),
            "role": if is_moderator { "moderator" } else { "participant" },
        });

        match self.invite_link(room_id, invite).await? {
            Some(link) => Ok(link),
            None => Ok(format!("{}/room/{room_id}", self.frontend_url()?)),
        }
    }

    async fn anonymous_join_url(
        &self,
        session: &Session,
        display_name: &str,
    ) -> Result<String, BackendError> {
        let room_id = self.room_id(session)?;
        let guest = Participant::guest(display_name);

        let invite = json!({
            "room_id": room_id,
            "display_name": guest.display_name,
            "role": "guest",
        });

        match self.invite_link(room_id, invite).await? {
            Some(link) => Ok(link),
            None => Ok(format!(
                "{}/room/{room_id}?name={}",
                self.frontend_url()?,
                urlencoding::encode(&guest.display_name)
            )),
        }
    }

    async fn is_running(&self, session: &Session) -> Result<bool, BackendError> {
        let Some(room_id) = session.meeting_id() else {
            return Ok(false);
        };

        let room = self.room(room_id).await?;
        Ok(room.participant_count.unwrap_or(0) > 0)
    }

    async fn meeting_exists(&self, session: &Session) -> Result<bool, BackendError> {
        let Some(room_id) = session.meeting_id() else {
            return Ok(false);
        };

        match self.room(room_id).await {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn end_meeting(&self, session: &Session) -> Result<bool, BackendError> {
        let Some(room_id) = session.meeting_id() else {
            return Ok(true);
        };

        let url = format!("{}/v1/rooms/{room_id}/meeting", self.api_url()?);
        let response = self
            .client()?
            .delete(&url)
            .send()
            .await
            .map_err(|e| network_error(NAME, "end meeting", e))?;

        if !response.status().is_success() {
            failure(NAME, "end meeting", response).await;
            return Ok(false);
        }
        Ok(true)
    }

    fn supports_recordings(&self) -> bool {
        self.settings.get_bool("enableRecordings", false)
    }

    async fn recordings(&self, session: &Session) -> Result<Vec<Recording>, BackendError> {
        if !self.supports_recordings() {
            return Err(BackendError::unsupported("Recordings"));
        }
        let Some(room_id) = session.meeting_id() else {
            return Ok(Vec::new());
        };

        let url = format!("{}/v1/rooms/{room_id}/recordings", self.api_url()?);
        let response = self
            .client()?
            .get(&url)
            .send()
            .await
            .map_err(|e| network_error(NAME, "list recordings", e))?;

        if !response.status().is_success() {
            return Err(failure(NAME, "list recordings", response).await);
        }

        let recordings: Vec<ApiRecording> = response
            .json()
            .await
            .map_err(|e| decode_error(NAME, "list recordings", e))?;
        Ok(recordings
            .into_iter()
            .map(|recording| recording.into_recording(session))
            .collect())
    }

    async fn publish_recording(
        &self,
        _session: &Session,
        recording_id: &str,
        publish: bool,
    ) -> Result<bool, BackendError> {
        if !self.supports_recordings() {
            return Err(BackendError::unsupported("Recordings"));
        }

        let url = format!("{}/v1/recordings/{recording_id}", self.api_url()?);
        let response = self
            .client()?
            .patch(&url)
            .json(&json!({ "published": publish }))
            .send()
            .await
            .map_err(|e| network_error(NAME, "publish recording", e))?;

        if !response.status().is_success() {
            failure(NAME, "publish recording", response).await;
            return Ok(false);
        }
        Ok(true)
    }

    async fn delete_recording(
        &self,
        _session: &Session,
        recording_id: &str,
    ) -> Result<bool, BackendError> {
        if !self.supports_recordings() {
            return Err(BackendError::unsupported("Recordings"));
        }

        let url = format!("{}/v1/recordings/{recording_id}", self.api_url()?);
        let response = self
            .client()?
            .delete(&url)
            .send()
            .await
            .map_err(|e| network_error(NAME, "delete recording", e))?;

        if !response.status().is_success() {
            failure(NAME, "delete recording", response).await;
            return Ok(false);
        }
        Ok(true)
    }
}

/// 16 hex characters.
fn room_password() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Deserialize)]
struct ApiRoom {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    invite_code: Option<String>,
    #[serde(default)]
    participant_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiInvite {
    #[serde(default)]
    invite_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRecording {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    duration: Option<i64>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    playback_url: Option<String>,
    #[serde(default)]
    published: bool,
}

impl ApiRecording {
    fn into_recording(self, session: &Session) -> Recording {
        let duration_secs = match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).num_seconds(),
            _ => self.duration.unwrap_or(0),
        };

        let metadata = json!({
            "download_url": self.download_url,
            "playback_url": self.playback_url,
            "published": self.published,
        });

        Recording {
            backend: ID.to_string(),
            id: self.id,
            name: self.title.or_else(|| session.title.clone()),
            url: self.download_url.or(self.playback_url),
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_secs,
            state: if self.published {
                RecordingState::Published
            } else {
                RecordingState::Unpublished
            },
            image_previews: Vec::new(),
            metadata,
        }
    }
}

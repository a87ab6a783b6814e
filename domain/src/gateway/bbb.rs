//! BigBlueButton adapter.
//!
//! Every API call is a GET (or a POST carrying a presentation) whose query string
//! is signed with the server's shared secret. Responses are XML documents rooted
//! at `<response>` with a `returncode` of `SUCCESS` or `FAILED`.

use super::{decode_error, download_url, failure, http_client, network_error, PUBLIC_JOIN_PATH};
use crate::backend::BackendContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use meeting_auth::checksum::QueryChecksum;
use meeting_auth::http::AuthenticatedClient;
use meeting_backend::{
    Backend, ConfigField, Error as BackendError, MeetingRef, Participant, Recording,
    RecordingState, Session,
};
use reqwest::header::CONTENT_TYPE;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use service::settings::ProviderSettings;
use std::sync::Arc;

pub const ID: &str = "bbb";
const NAME: &str = "BigBlueButton";
const EXIT_PATH: &str = "/sessions/exit";
const DEFAULT_LAYOUT: &str = "CUSTOM_LAYOUT";

pub fn build(context: &BackendContext) -> Result<Arc<dyn Backend>, BackendError> {
    Ok(Arc::new(BigBlueButton::new(context)?))
}

pub struct BigBlueButton {
    settings: ProviderSettings,
    http: AuthenticatedClient,
    base_url: String,
}

impl BigBlueButton {
    pub fn new(context: &BackendContext) -> Result<Self, BackendError> {
        Ok(Self {
            settings: context.provider_settings(ID),
            http: http_client(&context.http)?,
            base_url: context.base_url.clone(),
        })
    }

    /// Signer for the configured server, built fresh so settings changes apply
    /// without a restart.
    fn signer(&self) -> Result<QueryChecksum, BackendError> {
        let url = self
            .settings
            .get("url")
            .ok_or_else(|| BackendError::NotConfigured("BigBlueButton URL is not set".to_string()))?;
        let secret = self.settings.get("secret").ok_or_else(|| {
            BackendError::NotConfigured("BigBlueButton secret is not set".to_string())
        })?;

        let api_url = format!("{}/api", url.trim_end_matches('/'));
        Ok(QueryChecksum::new(&api_url, SecretString::from(secret))?)
    }

    async fn call(&self, call: &str, params: &[(&str, String)]) -> Result<ApiResponse, BackendError> {
        let url = self.signer()?.signed_url(call, params);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| network_error(NAME, call, e))?;

        read_response(call, response).await
    }

    async fn call_with_body(
        &self,
        call: &str,
        params: &[(&str, String)],
        body: String,
    ) -> Result<ApiResponse, BackendError> {
        let url = self.signer()?.signed_url(call, params);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| network_error(NAME, call, e))?;

        read_response(call, response).await
    }

    fn create_params(&self, session: &Session) -> Vec<(&'static str, String)> {
        let record = session.allow_recording.to_string();
        let mut params = vec![
            ("meetingID", session.id.to_string()),
            ("name", session.display_title().to_string()),
            ("attendeePW", session.attendee_pw.clone()),
            ("moderatorPW", session.moderator_pw.clone()),
            ("record", record.clone()),
            ("allowStartStopRecording", record),
            ("welcome", self.welcome_message(session)),
            ("muteOnStart", session.mute_on_entry.to_string()),
            ("allowModsToUnmuteUsers", "true".to_string()),
            ("allowModsToEjectCameras", "true".to_string()),
            ("allowPromoteGuestToModerator", "true".to_string()),
            ("breakout", "false".to_string()),
            ("meetingKeepEvents", "true".to_string()),
            (
                "guestPolicy",
                if session.has_waiting_room {
                    "ASK_MODERATOR"
                } else {
                    "ALWAYS_ACCEPT"
                }
                .to_string(),
            ),
            ("moderatorOnlyMessage", moderator_message(session)),
            (
                "logoutURL",
                format!("{}{}?highlight={}", self.base_url, EXIT_PATH, session.id),
            ),
            (
                "meetingLayout",
                session
                    .config_str("layout")
                    .unwrap_or(DEFAULT_LAYOUT)
                    .to_string(),
            ),
        ];

        for key in [
            "webcamsOnlyForModerator",
            "lockSettingsDisableMic",
            "lockSettingsDisablePrivateChat",
            "lockSettingsDisablePublicChat",
        ] {
            if session.config_bool(key, false) {
                params.push((key, "true".to_string()));
            }
        }

        if let Some(max) = session.config_i64("maxParticipants").filter(|max| *max > 0) {
            params.push(("maxParticipants", max.to_string()));
        }

        params
    }

    fn welcome_message(&self, session: &Session) -> String {
        let mut welcome = session
            .config_str("welcome")
            .or(session.description.as_deref())
            .unwrap_or_default()
            .to_string();

        if let (true, Some(token)) = (session.public_join, session.public_token.as_deref()) {
            let link = format!("{}{}/{}", self.base_url, PUBLIC_JOIN_PATH, token);
            welcome.push_str(&format!(
                "\n\n<br><br>Public join link: <a href=\"{link}\">{link}</a>"
            ));
        }

        welcome
    }

    fn presentation_body(&self, session: &Session) -> Option<String> {
        if session.presentation_file_id.is_none() {
            return None;
        }
        let url = download_url(&self.base_url, &session.id, "presentation");
        Some(format!(
            "<modules><module name=\"presentation\"><document url=\"{}\" filename=\"{}_presentation.pdf\"/></module></modules>",
            xml_escape(&url),
            xml_escape(&session.name)
        ))
    }

    fn join_params(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
    ) -> Vec<(&'static str, String)> {
        let user_id = match (&participant.email, participant.id) {
            (Some(email), _) => email.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => uuid::Uuid::new_v4().to_string(),
        };

        let mut params = vec![
            ("meetingID", session.id.to_string()),
            ("fullName", participant.display_name.clone()),
            (
                "role",
                if is_moderator { "MODERATOR" } else { "VIEWER" }.to_string(),
            ),
            ("userID", user_id),
        ];

        if let Some(avatar_url) = &participant.avatar_url {
            params.push(("avatarURL", avatar_url.clone()));
        }

        if session.camera_bg_image_file_id.is_some() {
            params.push((
                "webcamBackgroundURL",
                format!(
                    "{}&inline=true&embeddable=true",
                    download_url(&self.base_url, &session.id, "camera-bg-image")
                ),
            ));
        }

        params
    }
}

#[async_trait]
impl Backend for BigBlueButton {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        NAME
    }

    fn icon(&self) -> &str {
        "fa-video-camera"
    }

    fn description(&self) -> String {
        "Open-source web conferencing system for online learning".to_string()
    }

    fn is_configured(&self) -> bool {
        self.settings.get("url").is_some() && self.settings.get("secret").is_some()
    }

    fn session_config_fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::checkbox("webcamsOnlyForModerator", "Webcams only for moderators")
                .with_hint("Participants cannot share their webcam")
                .with_default(false),
            ConfigField::checkbox("lockSettingsDisableMic", "Disable microphone for participants")
                .with_default(false),
            ConfigField::checkbox("lockSettingsDisablePrivateChat", "Disable private chat")
                .with_default(false),
            ConfigField::checkbox("lockSettingsDisablePublicChat", "Disable public chat")
                .with_default(false),
            ConfigField::number("maxParticipants", "Max participants")
                .with_hint("0 = unlimited")
                .with_default(0),
            ConfigField::textarea("welcome", "Welcome message").with_default(""),
            ConfigField::radio(
                "layout",
                "Layout",
                &[
                    ("CUSTOM_LAYOUT", "Custom Layout"),
                    ("SMART_LAYOUT", "Smart Layout"),
                    ("PRESENTATION_FOCUS", "Presentation Focus"),
                    ("VIDEO_FOCUS", "Video Focus"),
                ],
            )
            .with_default(DEFAULT_LAYOUT),
        ]
    }

    async fn create_meeting(&self, session: &Session) -> Result<MeetingRef, BackendError> {
        let params = self.create_params(session);

        let response = match self.presentation_body(session) {
            Some(body) => self.call_with_body("create", &params, body).await?,
            None => self.call("create", &params).await?,
        };

        if !response.is_success() {
            error!(
                "BBB create failed for session {} ({}): {}",
                session.name,
                session.id,
                response.message()
            );
            return Err(BackendError::Provider(format!(
                "Failed to create BBB meeting: {}",
                response.message()
            )));
        }

        let mut meeting = MeetingRef::new(session.id.to_string());
        if let Some(internal_id) = response.internal_meeting_id {
            meeting = meeting.with_config("bbb_internal_meeting_id", internal_id);
        }
        Ok(meeting)
    }

    async fn join_url(
        &self,
        session: &Session,
        participant: &Participant,
        is_moderator: bool,
    ) -> Result<String, BackendError> {
        let params = self.join_params(session, participant, is_moderator);
        Ok(self.signer()?.signed_url("join", &params))
    }

    async fn is_running(&self, session: &Session) -> Result<bool, BackendError> {
        if session.meeting_id().is_none() {
            return Ok(false);
        }

        let response = self
            .call("isMeetingRunning", &[("meetingID", session.id.to_string())])
            .await?;
        Ok(response.is_success() && response.running.unwrap_or(false))
    }

    async fn end_meeting(&self, session: &Session) -> Result<bool, BackendError> {
        let response = self
            .call(
                "end",
                &[
                    ("meetingID", session.id.to_string()),
                    ("password", session.moderator_pw.clone()),
                ],
            )
            .await?;

        if !response.is_success() {
            warn!("BBB end failed for session {}: {}", session.id, response.message());
        }
        Ok(response.is_success())
    }

    /// Meetings are keyed by session id, and `create` on a known id returns it.
    fn is_recreate_safe(&self) -> bool {
        true
    }

    fn supports_recordings(&self) -> bool {
        true
    }

    fn supports_presentation_upload(&self) -> bool {
        true
    }

    fn supports_camera_background(&self) -> bool {
        true
    }

    fn supports_layout_options(&self) -> bool {
        true
    }

    async fn recordings(&self, session: &Session) -> Result<Vec<Recording>, BackendError> {
        let response = self
            .call("getRecordings", &[("meetingID", session.id.to_string())])
            .await?;

        if !response.is_success() {
            return Err(BackendError::Provider(format!(
                "BBB getRecordings failed: {}",
                response.message()
            )));
        }

        Ok(response
            .recordings
            .map(|recordings| recordings.recording)
            .unwrap_or_default()
            .into_iter()
            .map(ApiRecording::into_recording)
            .collect())
    }

    async fn publish_recording(
        &self,
        _session: &Session,
        recording_id: &str,
        publish: bool,
    ) -> Result<bool, BackendError> {
        let response = self
            .call(
                "publishRecordings",
                &[
                    ("recordID", recording_id.to_string()),
                    ("publish", publish.to_string()),
                ],
            )
            .await?;
        Ok(response.is_success())
    }

    async fn delete_recording(
        &self,
        _session: &Session,
        recording_id: &str,
    ) -> Result<bool, BackendError> {
        let response = self
            .call("deleteRecordings", &[("recordID", recording_id.to_string())])
            .await?;
        Ok(response.is_success())
    }
}

async fn read_response(call: &str, response: reqwest::Response) -> Result<ApiResponse, BackendError> {
    if !response.status().is_success() {
        return Err(failure(NAME, call, response).await);
    }

    let body = response
        .text()
        .await
        .map_err(|e| network_error(NAME, call, e))?;

    quick_xml::de::from_str(&body).map_err(|e| decode_error(NAME, call, e))
}

fn moderator_message(session: &Session) -> String {
    let mut message = "You are the moderator of this session. You have additional permissions and responsibilities.".to_string();
    message.push_str(if session.has_waiting_room {
        " Participants will wait until a moderator accepts them."
    } else {
        " Participants will enter directly."
    });
    message
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The `<response>` envelope shared by every call.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    returncode: String,
    #[serde(rename = "messageKey", default)]
    message_key: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    running: Option<bool>,
    #[serde(rename = "internalMeetingID", default)]
    internal_meeting_id: Option<String>,
    #[serde(default)]
    recordings: Option<ApiRecordings>,
}

impl ApiResponse {
    fn is_success(&self) -> bool {
        self.returncode.eq_ignore_ascii_case("SUCCESS")
    }

    fn message(&self) -> String {
        match (&self.message_key, &self.message) {
            (Some(key), Some(message)) => format!("{key}: {message}"),
            (Some(key), None) => key.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => self.returncode.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiRecordings {
    #[serde(default)]
    recording: Vec<ApiRecording>,
}

#[derive(Debug, Deserialize)]
struct ApiRecording {
    #[serde(rename = "recordID")]
    record_id: String,
    #[serde(rename = "meetingID", default)]
    meeting_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    published: bool,
    #[serde(default)]
    state: Option<String>,
    #[serde(rename = "startTime", default)]
    start_time: i64,
    #[serde(rename = "endTime", default)]
    end_time: i64,
    #[serde(default)]
    playback: Option<ApiPlayback>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPlayback {
    #[serde(default)]
    format: Vec<ApiFormat>,
}

#[derive(Debug, Deserialize)]
struct ApiFormat {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    preview: Option<ApiPreview>,
}

#[derive(Debug, Deserialize)]
struct ApiPreview {
    #[serde(default)]
    images: Option<ApiImages>,
}

#[derive(Debug, Deserialize)]
struct ApiImages {
    #[serde(default)]
    image: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    #[serde(rename = "$text", default)]
    url: String,
}

impl ApiRecording {
    fn into_recording(self) -> Recording {
        let formats = self.playback.map(|p| p.format).unwrap_or_default();

        // The presentation format is the one users expect to open; others are fallbacks.
        let primary = formats
            .iter()
            .find(|f| f.kind == "presentation")
            .or_else(|| formats.first());

        let url = primary.and_then(|f| f.url.clone());
        let image_previews = primary
            .and_then(|f| f.preview.as_ref())
            .and_then(|p| p.images.as_ref())
            .map(|images| {
                images
                    .image
                    .iter()
                    .map(|image| image.url.trim().to_string())
                    .filter(|url| !url.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let state = match self.state.as_deref() {
            Some(state) if !state.is_empty() => RecordingState::from_provider(state),
            _ if self.published => RecordingState::Published,
            _ => RecordingState::Unpublished,
        };

        let metadata = json!({
            "record_id": self.record_id,
            "meeting_id": self.meeting_id,
            "published": self.published,
            "formats": formats
                .iter()
                .map(|f| json!({ "type": f.kind, "url": f.url }))
                .collect::<Vec<_>>(),
        });

        Recording {
            backend: ID.to_string(),
            id: self.record_id,
            name: self.name,
            url,
            started_at: from_millis(self.start_time),
            ended_at: from_millis(self.end_time),
            duration_secs: ((self.end_time - self.start_time) / 1000).max(0),
            state,
            image_previews,
            metadata,
        }
    }
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

//! Zoom adapter.
//!
//! Talks to the Zoom REST API with a Server-to-Server OAuth app. Meetings are
//! created under one host user; everyone, moderators included, enters through
//! the meeting's join link since intranet users are not Zoom account holders.

use super::{decode_error, failure, http_client, network_error};
use crate::backend::BackendContext;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::*;
use meeting_auth::http::{AuthenticatedClient, HttpClientConfig};
use meeting_auth::oauth::ClientCredentials;
use meeting_backend::{
    Backend, ConfigField, Error as BackendError, MeetingRef, Participant, Recording,
    RecordingState, Session,
};
use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use service::settings::ProviderSettings;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ID: &str = "zoom";
const NAME: &str = "Zoom";
const DEFAULT_API_URL: &str = "https://api.zoom.us/v2";
const DEFAULT_TOKEN_URL: &str = "https://zoom.us/oauth/token";

pub(crate) const JOIN_URL_KEY: &str = "zoom_join_url";
pub(crate) const START_URL_KEY: &str = "zoom_start_url";
pub(crate) const PASSWORD_KEY: &str = "zoom_password";

pub fn build(context: &BackendContext) -> Result<Arc<dyn Backend>, BackendError> {
    Ok(Arc::new(Zoom::new(context)?))
}

/// Token source together with the credentials it was built from.
struct CachedCredentials {
    fingerprint: String,
    source: Arc<ClientCredentials>,
}

pub struct Zoom {
    settings: ProviderSettings,
    http: AuthenticatedClient,
    http_config: HttpClientConfig,
    credentials: Mutex<Option<CachedCredentials>>,
}

impl Zoom {
    pub fn new(context: &BackendContext) -> Result<Self, BackendError> {
        Ok(Self {
            settings: context.provider_settings(ID),
            http: http_client(&context.http)?,
            http_config: context.http.clone(),
            credentials: Mutex::new(None),
        })
    }

    fn api_url(&self) -> String {
        self.settings
            .get_or("apiUrl", DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string()
    }

    fn user_id(&self) -> String {
        self.settings.get_or("userId", "me")
    }

    /// The token source for the current credentials. Rebuilt, and its cached token
    /// dropped, whenever the settings change.
    async fn token_source(&self) -> Result<Arc<ClientCredentials>, BackendError> {
        let (Some(account_id), Some(client_id), Some(client_secret)) = (
            self.settings.get("accountId"),
            self.settings.get("clientId"),
            self.settings.get("clientSecret"),
        ) else {
            return Err(BackendError::NotConfigured(
                "Zoom account id, client id and client secret are required".to_string(),
            ));
        };

        let token_url = self.settings.get_or("tokenUrl", DEFAULT_TOKEN_URL);
        let fingerprint = format!("{account_id}|{client_id}|{client_secret}|{token_url}");

        let mut cached = self.credentials.lock().await;
        if let Some(credentials) = cached.as_ref() {
            if credentials.fingerprint == fingerprint {
                return Ok(credentials.source.clone());
            }
            debug!("Zoom credentials changed, discarding cached token");
        }

        let source = Arc::new(
            ClientCredentials::new(
                ID,
                &token_url,
                &client_id,
                SecretString::from(client_secret),
                &self.http_config,
            )?
            .with_grant_type("account_credentials")
            .with_param("account_id", &account_id),
        );

        *cached = Some(CachedCredentials {
            fingerprint,
            source: source.clone(),
        });
        Ok(source)
    }

    /// Sends one API request. A rejected token is dropped and the request retried
    /// once with a fresh one.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, BackendError> {
        let source = self.token_source().await?;
        let url = format!("{}{}", self.api_url(), path);

        for attempt in 0..2 {
            let token = source.access_token().await?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token.expose_secret());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| network_error(NAME, path, e))?;

            if response.status() == StatusCode::UNAUTHORIZED {
                if attempt == 0 {
                    debug!("Zoom rejected the access token, fetching a new one");
                    source.invalidate().await;
                    continue;
                }
                return Err(failure(NAME, path, response).await);
            }
            return Ok(response);
        }

        Err(BackendError::Authentication(
            "Zoom rejected a freshly issued access token".to_string(),
        ))
    }

    fn meeting_data(session: &Session) -> Value {
        let mut data = json!({
            "type": 2,
            "topic": session.display_title(),
            "agenda": session.description.clone().unwrap_or_default(),
            "settings": {
                "host_video": session.config_bool("hostVideo", true),
                "participant_video": session.config_bool("participantVideo", true),
                "join_before_host": true,
                "mute_upon_entry": session.mute_on_entry,
                "waiting_room": session.has_waiting_room,
                "auto_recording": session.config_str("autoRecording").unwrap_or("none"),
                "approval_type": 2,
                "meeting_authentication": false,
                "breakout_room": {
                    "enable": session.config_bool("enableBreakoutRooms", false),
                },
            },
        });

        if let Some(hosts) = session.config_str("alternativeHosts") {
            data["settings"]["alternative_hosts"] = Value::String(hosts.to_string());
        }

        data
    }

    async fn meeting(&self, meeting_id: &str) -> Result<ApiMeeting, BackendError> {
        let response = self
            .request(Method::GET, &format!("/meetings/{meeting_id}"), None)
            .await?;

        if !response.status().is_success() {
            return Err(failure(NAME, "get meeting", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| decode_error(NAME, "get meeting", e))
    }

    /// Pushes the session's current options onto the existing meeting. Failure only
    /// means the meeting runs with its previous options.
    async fn sync_meeting(&self, session: &Session, meeting_id: &str) {
        let path = format!("/meetings/{meeting_id}");
        match self
            .request(Method::PATCH, &path, Some(&Self::meeting_data(session)))
            .await
        {
            Ok(response) if response.status().is_success() => {
                trace!("Synced options of Zoom meeting {meeting_id}");
            }
            Ok(response) => {
                failure(NAME, "update meeting", response).await;
            }
            Err(e) => warn!("Failed to sync Zoom meeting {meeting_id}: {e}"),
        }
    }

    async fn link_for(&self, session: &Session, display_name: &str) -> Result<String, BackendError> {
        let meeting_id = session.meeting_id().ok_or_else(|| {
            BackendError::NotFound(format!("Session {} has no Zoom meeting yet", session.id))
        })?;

        if let Some(join_url) = session.config_str(JOIN_URL_KEY) {
            return Ok(with_display_name(join_url, display_name));
        }

        match self.meeting(meeting_id).await?.join_url {
            Some(join_url) => Ok(with_display_name(&join_url, display_name)),
            None => Err(BackendError::Provider(format!(
                "Zoom meeting {meeting_id} has no join URL"
            ))),
        }
    }
}

#[async_trait]
impl Backend for Zoom {
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
        "Cloud video conferencing via the Zoom API".to_string()
    }

    fn is_configured(&self) -> bool {
        self.settings.get("accountId").is_some()
            && self.settings.get("clientId").is_some()
            && self.settings.get("clientSecret").is_some()
    }

    fn session_config_fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::checkbox("hostVideo", "Host starts with video on")
                .with_hint("Start meeting with host video enabled")
                .with_default(true),
            ConfigField::checkbox("participantVideo", "Participants start with video on")
                .with_hint("Participants join with video enabled by default")
                .with_default(true),
            ConfigField::text("alternativeHosts", "Alternative hosts")
                .with_hint("Comma-separated email addresses of alternative hosts")
                .with_default(""),
            ConfigField::checkbox("enableBreakoutRooms", "Enable breakout rooms")
                .with_hint("Allow host to create breakout rooms during meeting")
                .with_default(false),
            ConfigField::select(
                "autoRecording",
                "Auto recording",
                &[
                    ("none", "Disabled"),
                    ("local", "Local recording"),
                    ("cloud", "Cloud recording"),
                ],
            )
            .with_hint("Automatically start recording when meeting begins")
            .with_default("none"),
        ]
    }

    async fn create_meeting(&self, session: &Session) -> Result<MeetingRef, BackendError> {
        let path = format!("/users/{}/meetings", self.user_id());
        let response = self
            .request(Method::POST, &path, Some(&Self::meeting_data(session)))
            .await?;

        if !response.status().is_success() {
            return Err(failure(NAME, "create meeting", response).await);
        }

        let meeting: ApiMeeting = response
            .json()
            .await
            .map_err(|e| decode_error(NAME, "create meeting", e))?;
        let meeting_id = id_string(&meeting.id);
        info!("Created Zoom meeting {meeting_id} for session {}", session.id);

        let mut meeting_ref = MeetingRef::new(meeting_id);
        if let Some(join_url) = meeting.join_url {
            meeting_ref = meeting_ref.with_config(JOIN_URL_KEY, join_url);
        }
        if let Some(start_url) = meeting.start_url {
            meeting_ref = meeting_ref.with_config(START_URL_KEY, start_url);
        }
        if let Some(password) = meeting.password {
            meeting_ref = meeting_ref.with_config(PASSWORD_KEY, password);
        }
        Ok(meeting_ref)
    }

    async fn join_url(
        &self,
        session: &Session,
        participant: &Participant,
        _is_moderator: bool,
    ) -> Result<String, BackendError> {
        if let Some(meeting_id) = session.meeting_id() {
            self.sync_meeting(session, meeting_id).await;
        }
        self.link_for(session, &participant.display_name).await
    }

    async fn anonymous_join_url(
        &self,
        session: &Session,
        display_name: &str,
    ) -> Result<String, BackendError> {
        self.link_for(session, &Participant::guest(display_name).display_name)
            .await
    }

    async fn is_running(&self, session: &Session) -> Result<bool, BackendError> {
        let Some(meeting_id) = session.meeting_id() else {
            return Ok(false);
        };

        match self.meeting(meeting_id).await {
            Ok(meeting) => Ok(meeting.status.as_deref() == Some("started")),
            Err(BackendError::NotFound(_)) => {
                debug!("Zoom meeting {meeting_id} no longer exists");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Scheduled meetings survive their end; only a deleted one is gone.
    async fn meeting_exists(&self, session: &Session) -> Result<bool, BackendError> {
        let Some(meeting_id) = session.meeting_id() else {
            return Ok(false);
        };

        match self.meeting(meeting_id).await {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound(_)) => {
                info!("Zoom meeting {meeting_id} of session {} was deleted", session.id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn end_meeting(&self, session: &Session) -> Result<bool, BackendError> {
        let Some(meeting_id) = session.meeting_id() else {
            return Ok(true);
        };

        let response = self
            .request(
                Method::PUT,
                &format!("/meetings/{meeting_id}/status"),
                Some(&json!({ "action": "end" })),
            )
            .await?;

        if !response.status().is_success() {
            failure(NAME, "end meeting", response).await;
            return Ok(false);
        }
        Ok(true)
    }

    fn supports_recordings(&self) -> bool {
        true
    }

    fn supports_embed(&self) -> bool {
        false
    }

    async fn recordings(&self, session: &Session) -> Result<Vec<Recording>, BackendError> {
        let Some(meeting_id) = session.meeting_id() else {
            return Ok(Vec::new());
        };

        let response = self
            .request(Method::GET, &format!("/meetings/{meeting_id}/recordings"), None)
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(failure(NAME, "list recordings", response).await);
        }

        let recordings: ApiRecordings = response
            .json()
            .await
            .map_err(|e| decode_error(NAME, "list recordings", e))?;
        Ok(recordings.into_recordings(session))
    }

    /// Zoom has no per-recording publish state.
    async fn publish_recording(
        &self,
        _session: &Session,
        _recording_id: &str,
        _publish: bool,
    ) -> Result<bool, BackendError> {
        Ok(true)
    }

    async fn delete_recording(
        &self,
        session: &Session,
        recording_id: &str,
    ) -> Result<bool, BackendError> {
        let Some(meeting_id) = session.meeting_id() else {
            return Ok(false);
        };

        let response = self
            .request(
                Method::DELETE,
                &format!("/meetings/{meeting_id}/recordings/{recording_id}"),
                None,
            )
            .await?;

        if !response.status().is_success() {
            failure(NAME, "delete recording", response).await;
            return Ok(false);
        }
        Ok(true)
    }
}

/// Appends `uname`, with spaces as `+` so redirects do not double-encode them.
fn with_display_name(url: &str, display_name: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}uname={}", display_name.replace(' ', "+"))
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ApiMeeting {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    join_url: Option<String>,
    #[serde(default)]
    start_url: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRecordings {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    /// Minutes.
    #[serde(default)]
    duration: i64,
    #[serde(default)]
    share_url: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    recording_files: Vec<ApiRecordingFile>,
}

#[derive(Debug, Deserialize)]
struct ApiRecordingFile {
    id: String,
    #[serde(default)]
    file_type: Option<String>,
    #[serde(default)]
    play_url: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    file_size: i64,
}

impl ApiRecordings {
    fn into_recordings(self, session: &Session) -> Vec<Recording> {
        let duration_secs = self.duration * 60;
        let ended_at = self
            .start_time
            .map(|start| start + Duration::seconds(duration_secs));
        let name = self
            .topic
            .clone()
            .or_else(|| session.title.clone());

        self.recording_files
            .into_iter()
            .filter_map(|file| {
                let format_type = match file.file_type.as_deref() {
                    Some("MP4") => "video",
                    Some("M4A") => "podcast",
                    _ => return None,
                };

                // share_url carries the passcode and works without a Zoom login.
                let url = self.share_url.clone().or_else(|| {
                    file.play_url.as_ref().map(|play_url| match &self.password {
                        Some(password) if !password.is_empty() => {
                            let separator = if play_url.contains('?') { '&' } else { '?' };
                            format!("{play_url}{separator}pwd={}", urlencoding::encode(password))
                        }
                        _ => play_url.clone(),
                    })
                });

                Some(Recording {
                    backend: ID.to_string(),
                    id: file.id.clone(),
                    name: name.clone(),
                    url,
                    started_at: self.start_time,
                    ended_at,
                    duration_secs,
                    state: RecordingState::from_provider(
                        file.status.as_deref().unwrap_or("completed"),
                    ),
                    image_previews: Vec::new(),
                    metadata: json!({
                        "file_type": file.file_type,
                        "format_type": format_type,
                        "download_url": file.download_url,
                        "share_url": self.share_url,
                        "file_size": file.file_size,
                    }),
                })
            })
            .collect()
    }
}

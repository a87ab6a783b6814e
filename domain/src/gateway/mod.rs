//! Provider adapters and the HTTP plumbing they share.

pub mod bbb;
pub mod jitsi;
pub mod opentalk;
pub mod zoom;

use log::*;
use meeting_auth::http::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};
use meeting_backend::Error as BackendError;
use reqwest::{Response, StatusCode};
use std::fmt::Debug;

/// Public download route of the hosting application, relative to its base URL.
pub(crate) const DOWNLOAD_PATH: &str = "/sessions/public/download";

/// Guest join route, followed by the session's public token.
pub(crate) const PUBLIC_JOIN_PATH: &str = "/sessions/public/join";

pub(crate) fn http_client(config: &HttpClientConfig) -> Result<AuthenticatedClient, BackendError> {
    Ok(AuthenticatedClientBuilder::new()
        .with_timeout(config.timeout)
        .with_max_retries(config.max_retries)
        .with_user_agent(config.user_agent.clone())
        .build()?)
}

/// Maps a transport failure (connect, timeout, exhausted retries).
pub(crate) fn network_error<E>(provider: &str, action: &str, e: E) -> BackendError
where
    E: Into<meeting_auth::Error> + Debug,
{
    warn!("{provider} {action} request failed: {:?}", e);
    BackendError::from(e.into())
}

pub(crate) fn decode_error(provider: &str, action: &str, e: impl Debug) -> BackendError {
    warn!("Failed to parse {provider} {action} response: {:?}", e);
    BackendError::Serialization(format!("Invalid {action} response from {provider}"))
}

/// Turns a non-success response into an adapter error.
pub(crate) async fn failure(provider: &str, action: &str, response: Response) -> BackendError {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    warn!("{provider} {action} returned {status}: {error_text}");

    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(format!("{provider} {action}: {status}")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BackendError::Authentication(format!("{provider} {action}: {status}"))
        }
        _ => BackendError::Provider(format!("{provider} {action} returned {status}")),
    }
}

pub(crate) fn download_url(base_url: &str, session_id: &impl std::fmt::Display, kind: &str) -> String {
    format!("{base_url}{DOWNLOAD_PATH}?id={session_id}&type={kind}")
}

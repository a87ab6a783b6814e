//! Client-credentials grant with a cached, self-expiring access token.

use reqwest::header::CONTENT_TYPE;
use secrecy::SecretString;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::token::{TokenResponse, Tokens};
use crate::api_key::BasicAuth;
use crate::error::{oauth_error, Error, OAuthErrorKind};
use crate::http::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};

/// Obtains access tokens by authenticating as the application itself.
///
/// The client id and secret go out as HTTP Basic credentials and the grant
/// parameters as a form body. Tokens are kept in memory only and are fetched again
/// once they come within five minutes of expiry or after [`invalidate`](Self::invalidate).
/// Concurrent callers that find the cache stale wait for a single fetch.
pub struct ClientCredentials {
    token_url: String,
    params: Vec<(String, String)>,
    http: AuthenticatedClient,
    cached: Mutex<Option<Tokens>>,
}

impl ClientCredentials {
    /// Create a token source using the standard `client_credentials` grant.
    ///
    /// # Arguments
    ///
    /// * `provider_id` - Provider the credentials belong to
    /// * `token_url` - Token endpoint
    /// * `client_id` - OAuth client id
    /// * `client_secret` - OAuth client secret
    /// * `http_config` - Timeout and retry discipline for token requests
    pub fn new(
        provider_id: &str,
        token_url: &str,
        client_id: &str,
        client_secret: SecretString,
        http_config: &HttpClientConfig,
    ) -> Result<Self, Error> {
        let http = AuthenticatedClientBuilder::new()
            .with_auth(Box::new(BasicAuth::new(provider_id, client_id, client_secret)))
            .with_timeout(http_config.timeout)
            .with_max_retries(http_config.max_retries)
            .build()?;

        Ok(Self {
            token_url: token_url.to_string(),
            params: vec![("grant_type".to_string(), "client_credentials".to_string())],
            http,
            cached: Mutex::new(None),
        })
    }

    /// Replace the grant type (e.g. a vendor-specific `account_credentials`).
    pub fn with_grant_type(mut self, grant_type: &str) -> Self {
        self.params.retain(|(key, _)| key != "grant_type");
        self.params
            .insert(0, ("grant_type".to_string(), grant_type.to_string()));
        self
    }

    /// Add a grant parameter sent with every token request.
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// A valid access token, fetched if the cached one is missing or stale.
    pub async fn access_token(&self) -> Result<SecretString, Error> {
        let mut cached = self.cached.lock().await;

        if let Some(tokens) = cached.as_ref() {
            if !tokens.is_expired() {
                return Ok(tokens.access_token.clone());
            }
            debug!("Cached access token is about to expire, fetching a new one");
        }

        let tokens = self.fetch().await?;
        let access_token = tokens.access_token.clone();
        *cached = Some(tokens);

        Ok(access_token)
    }

    /// Drop the cached token, e.g. after the provider rejected it.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> Result<Tokens, Error> {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();

        let response = self
            .http
            .post(&self.token_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!("Token request failed: {:?}", e);
                oauth_error(OAuthErrorKind::Network, &e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Token endpoint returned {}: {}", status, error_text);
            return Err(oauth_error(
                OAuthErrorKind::TokenExchangeFailed,
                &format!("Token endpoint returned {status}"),
            ));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            warn!("Malformed token response: {:?}", e);
            oauth_error(OAuthErrorKind::InvalidResponse, &e.to_string())
        })?;

        if token_response.access_token.is_empty() {
            return Err(oauth_error(
                OAuthErrorKind::InvalidResponse,
                "Token response carried an empty access token",
            ));
        }

        debug!("Obtained access token from {}", self.token_url);
        Ok(token_response.into())
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

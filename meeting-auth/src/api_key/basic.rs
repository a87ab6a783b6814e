//! HTTP Basic authentication.

use reqwest_middleware::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

use super::{AuthMethod, ProviderAuth};

/// `Authorization: Basic base64(username:password)`, as used by OAuth token endpoints
/// that take the client id and secret as credentials.
pub struct BasicAuth {
    provider_id: String,
    username: String,
    password: SecretString,
}

impl BasicAuth {
    pub fn new(provider_id: &str, username: &str, password: SecretString) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            username: username.to_string(),
            password,
        }
    }
}

impl ProviderAuth for BasicAuth {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn auth_method(&self) -> AuthMethod {
        AuthMethod::BasicAuth {
            username: self.username.clone(),
        }
    }

    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(self.password.expose_secret()))
    }
}

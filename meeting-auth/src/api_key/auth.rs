//! Static credential trait.

use reqwest_middleware::RequestBuilder;

/// Authentication method for HTTP requests.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthMethod {
    /// Standard Bearer token
    BearerToken,
    /// HTTP Basic authentication
    BasicAuth { username: String },
}

/// Trait for authenticating HTTP requests with a static credential.
pub trait ProviderAuth: Send + Sync {
    /// Identifier of the provider the credential belongs to.
    fn provider_id(&self) -> &str;

    /// Get the authentication method used by this provider.
    fn auth_method(&self) -> AuthMethod;

    /// Apply authentication to a request builder.
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder;
}

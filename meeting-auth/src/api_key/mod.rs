//! Static credentials for REST providers.
//!
//! Provides a trait and implementations for authenticating requests to services
//! that accept a long-lived credential (OpenTalk bearer tokens, Zoom basic auth).

mod auth;
mod basic;
mod bearer;

pub use auth::{AuthMethod, ProviderAuth};
pub use basic::BasicAuth;
pub use bearer::BearerTokenAuth;

//! OAuth 2.0 for server-to-server provider APIs.
//!
//! Only the client-credentials family of grants is needed: the application
//! authenticates as itself, so there is no user redirect, no PKCE and no refresh
//! token. Tokens are cached per client and re-acquired once they near expiry.

mod client_credentials;

pub mod token;

pub use client_credentials::ClientCredentials;

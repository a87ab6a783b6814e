//! # meeting-auth
//!
//! Authentication building blocks shared by the conferencing adapters:
//! - Static credentials for REST providers (bearer tokens, basic auth, custom headers)
//! - OAuth 2.0 client-credentials grant with a self-expiring token cache
//! - Shared-secret query checksums for providers that sign every call
//! - HTTP client building with timeout and retry middleware
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meeting_auth::{
//!     api_key::{BearerTokenAuth, ProviderAuth},
//!     oauth::ClientCredentials,
//!     http::AuthenticatedClientBuilder,
//! };
//! ```

pub mod api_key;
pub mod checksum;
pub mod error;
pub mod http;
pub mod oauth;

// Re-export commonly used types
pub use error::{Error, ErrorKind};

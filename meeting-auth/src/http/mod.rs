//! The HTTP client every adapter talks through: one timeout, one retry budget and
//! an optional credential stamped onto each request.

mod client;
mod retry;

pub use client::{AuthenticatedClient, AuthenticatedClientBuilder, HttpClientConfig};
pub use retry::BoundedBackoff;

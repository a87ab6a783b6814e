//! This module defines the claims used in JSON Web Tokens (JWTs) within the domain layer.
//!
//! Jitsi Meet deployments with token authentication (prosody `token` auth) accept an
//! HS256 token whose `aud`/`iss` carry the application id, whose `sub` is the Jitsi
//! domain and whose `room` names the conference. The `context` block is shown to
//! other participants.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JitsiClaims {
    pub(crate) aud: String,
    pub(crate) iss: String,
    pub(crate) sub: String,
    pub(crate) room: String,
    pub(crate) exp: i64,
    pub(crate) nbf: i64,
    pub(crate) context: JitsiContext,
    pub(crate) moderator: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JitsiContext {
    pub(crate) user: JitsiUser,
    pub(crate) features: JitsiFeatures,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JitsiUser {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) avatar: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JitsiFeatures {
    pub(crate) recording: bool,
    pub(crate) livestreaming: bool,
    pub(crate) transcription: bool,
}

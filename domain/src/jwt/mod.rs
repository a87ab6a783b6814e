//! This module provides functionality for handling JSON Web Tokens (JWTs) within the domain layer.
//!
//! The primary use case is signing room tokens for Jitsi Meet deployments that
//! require token authentication. The token binds one participant to one room for
//! a limited time.

use crate::error::Error;
use chrono::Utc;
use claims::{JitsiClaims, JitsiContext, JitsiFeatures, JitsiUser};
use jsonwebtoken::{encode, EncodingKey, Header};
use log::*;
use meeting_backend::Participant;
use secrecy::{ExposeSecret, SecretString};

pub(crate) mod claims;

/// Validity of a room token.
const JITSI_TOKEN_TTL_SECS: i64 = 86_400;

/// Tolerated clock skew between us and the Jitsi server.
const JITSI_TOKEN_LEEWAY_SECS: i64 = 60;

/// Everything that goes into a Jitsi room token.
pub struct JitsiTokenRequest<'a> {
    pub app_id: &'a str,
    pub secret: &'a SecretString,
    pub domain: &'a str,
    pub room: &'a str,
    pub participant: &'a Participant,
    pub is_moderator: bool,
    pub allow_recording: bool,
}

/// Signs an HS256 room token for one participant.
pub fn generate_jitsi_token(request: &JitsiTokenRequest) -> Result<String, Error> {
    let now = Utc::now().timestamp();
    let participant = request.participant;

    let claims = JitsiClaims {
        aud: request.app_id.to_string(),
        iss: request.app_id.to_string(),
        sub: request.domain.to_string(),
        room: request.room.to_string(),
        exp: now + JITSI_TOKEN_TTL_SECS,
        nbf: now - JITSI_TOKEN_LEEWAY_SECS,
        context: JitsiContext {
            user: JitsiUser {
                id: participant.id.map(|id| id.to_string()).unwrap_or_default(),
                name: participant.display_name.clone(),
                email: participant.email.clone().unwrap_or_default(),
                avatar: participant.avatar_url.clone().unwrap_or_default(),
            },
            features: JitsiFeatures {
                recording: request.allow_recording,
                livestreaming: false,
                transcription: false,
            },
        },
        moderator: request.is_moderator,
    };

    trace!(
        "Signing Jitsi token for room {} (moderator: {})",
        request.room,
        request.is_moderator
    );

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(request.secret.expose_secret().as_bytes()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::Id;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    #[test]
    fn test_jitsi_token_round_trips_with_the_shared_secret() {
        let secret = SecretString::from("jitsi-secret".to_string());
        let participant = Participant::user(Id::from_u128(42), "Ada Lovelace")
            .with_email("ada@example.com");

        let token = generate_jitsi_token(&JitsiTokenRequest {
            app_id: "video_sessions",
            secret: &secret,
            domain: "meet.example.com",
            room: "videosession_abc",
            participant: &participant,
            is_moderator: true,
            allow_recording: false,
        })
        .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["video_sessions"]);
        let decoded =
            decode::<JitsiClaims>(&token, &DecodingKey::from_secret(b"jitsi-secret"), &validation)
                .unwrap()
                .claims;

        assert_eq!(decoded.sub, "meet.example.com");
        assert_eq!(decoded.room, "videosession_abc");
        assert!(decoded.moderator);
        assert_eq!(decoded.context.user.email, "ada@example.com");
        assert_eq!(decoded.context.user.id, Id::from_u128(42).to_string());
        assert!(!decoded.context.features.recording);
        assert_eq!(decoded.exp - decoded.nbf, JITSI_TOKEN_TTL_SECS + JITSI_TOKEN_LEEWAY_SECS);
    }
}

//! Resolves the participant behind a chat connection from its session JWT.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tuber_chats::ParticipantId;
use tuber_config::AuthConfig;

use crate::error::{GatewayError, GatewayResult};

/// Claims the identity layer relies on. Issuance lives elsewhere.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Participant id (UUID)
    pub exp: usize,
    pub iss: String,
}

pub struct IdentityResolver {
    decoding_key: DecodingKey,
    validation: Validation,
    allow_anonymous: bool,
}

impl IdentityResolver {
    pub fn new(config: &AuthConfig, allow_anonymous: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            allow_anonymous,
        }
    }

    pub fn allows_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    /// Validate `token` and extract the participant id from its subject.
    pub fn verify(&self, token: &str) -> GatewayResult<ParticipantId> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| {
                GatewayError::AuthenticationFailed(format!("Token validation failed: {}", err))
            })?;

        token_data.claims.sub.parse().map_err(|_| {
            GatewayError::AuthenticationFailed("Token subject is not a participant id".to_string())
        })
    }

    /// Resolve the participant for a connection attempt.
    ///
    /// When anonymous access is allowed, a missing or invalid token yields
    /// [`ParticipantId::ANONYMOUS`] instead of an error.
    pub fn resolve(&self, token: Option<&str>) -> GatewayResult<ParticipantId> {
        let verified = match token {
            Some(token) => self.verify(token),
            None => Err(GatewayError::AuthenticationFailed(
                "Missing authentication token".to_string(),
            )),
        };

        match verified {
            Ok(participant) => Ok(participant),
            Err(error) if self.allow_anonymous => {
                debug!(%error, "identity unresolved, using anonymous participant");
                Ok(ParticipantId::ANONYMOUS)
            }
            Err(error) => Err(error),
        }
    }
}

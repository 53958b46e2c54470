//! JWT token creation.
//!
//! Production tokens come from the account subsystem; the encoder exists
//! for operator tooling and tests, and signs with the same shared secret.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use archlens_core::config::AuthConfig;
use archlens_core::error::{AppError, ErrorKind};
use archlens_core::types::UserId;

use super::claims::{Claims, Role};

/// Creates signed HS256 access tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder").finish_non_exhaustive()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// Issues a token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: UserId, role: Role, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        self.encode(&claims)
    }

    /// Signs arbitrary claims.
    pub fn encode(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|e| {
            AppError::with_source(ErrorKind::Internal, "Failed to sign access token", e)
        })
    }
}

//! WebSocket authentication: validates the JWT from the query parameter.

use std::sync::Arc;

use archlens_auth::jwt::{Claims, JwtDecoder};
use archlens_core::error::AppError;

/// Authenticates WebSocket connections using JWT tokens.
#[derive(Debug, Clone)]
pub struct WsAuthenticator {
    /// JWT decoder.
    decoder: Arc<JwtDecoder>,
}

impl WsAuthenticator {
    /// Creates a new WebSocket authenticator.
    pub fn new(decoder: Arc<JwtDecoder>) -> Self {
        Self { decoder }
    }

    /// Authenticates a connection before the upgrade.
    ///
    /// A missing or blank token is rejected like an invalid one.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Claims, AppError> {
        match token.map(str::trim) {
            Some(token) if !token.is_empty() => self.decoder.decode(token),
            _ => Err(AppError::authentication("Missing token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use archlens_auth::jwt::{JwtEncoder, Role};
    use archlens_core::config::AuthConfig;
    use archlens_core::error::ErrorKind;
    use archlens_core::types::UserId;

    use super::*;

    #[test]
    fn test_missing_and_blank_tokens_rejected() {
        let auth = WsAuthenticator::new(Arc::new(JwtDecoder::new(&AuthConfig::default())));
        for token in [None, Some(""), Some("   ")] {
            let err = auth.authenticate(token).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Authentication);
        }
    }

    #[test]
    fn test_valid_token_accepted() {
        let config = AuthConfig::default();
        let token = JwtEncoder::new(&config)
            .issue(UserId(20), Role::User, chrono::Duration::minutes(1))
            .unwrap();
        let auth = WsAuthenticator::new(Arc::new(JwtDecoder::new(&config)));
        assert_eq!(auth.authenticate(Some(&token)).unwrap().user_id(), UserId(20));
    }
}

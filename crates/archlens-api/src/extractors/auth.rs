//! `AdminUser` extractor: validates the bearer token and requires the admin
//! role.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use archlens_auth::jwt::Claims;
use archlens_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// Claims of an authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::authentication("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::authentication("Invalid Authorization header format"))?;

        let claims = state.jwt_decoder.decode(token)?;
        if !claims.is_admin() {
            tracing::warn!(user_id = %claims.user_id(), "Admin endpoint refused");
            return Err(AppError::authorization("Admin role required").into());
        }

        Ok(AdminUser(claims))
    }
}

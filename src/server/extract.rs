//! Request extractors for authenticated routes

use crate::error::ClaimsightError;
use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;

/// An authenticated caller, extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub is_admin: bool,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError(ClaimsightError::TokenInvalid(
                    "missing authorization header".to_string(),
                ))
            })?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| {
                ApiError(ClaimsightError::TokenInvalid(
                    "invalid authentication scheme".to_string(),
                ))
            })?;

        let claims = state.tokens.verify_token(token).map_err(ApiError)?;
        Ok(AuthUser {
            email: claims.sub,
            is_admin: claims.is_admin,
        })
    }
}

/// An authenticated caller that must hold the admin flag
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        // The token carries the admin flag from login; re-check the
        // store so revocation takes effect without waiting for expiry.
        if user.is_admin || state.users.is_admin(&user.email) {
            Ok(AdminUser(user))
        } else {
            Err(ApiError(ClaimsightError::AdminRequired))
        }
    }
}

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use super::jwt::{Credentials, JwtKeys};
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// Verified bearer token identity.
pub struct AuthUser(pub Credentials);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header.".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid auth scheme.".into()))?;

        let keys = JwtKeys::from_ref(state);
        Ok(AuthUser(keys.verify(token)?))
    }
}

/// Authenticated caller resolved to its stored user record.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(creds) = AuthUser::from_request_parts(parts, state).await?;
        let user = state.users.resolve(&creds).await?;
        Ok(CurrentUser(user))
    }
}

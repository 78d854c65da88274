use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

use super::{AuthError, AuthService};
use crate::db::models::{Account, AccountRole};
use crate::error::AppError;

fn bearer(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

/// Account behind a valid `Authorization: Bearer <access token>` header.
pub struct AuthenticatedAccount(pub Account);

impl<S> FromRequestParts<S> for AuthenticatedAccount
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);
        let account = auth.authenticate(bearer(parts)?).await?;
        Ok(AuthenticatedAccount(account))
    }
}

/// Authenticated account with the admin role.
pub struct AdminAccount(pub Account);

impl<S> FromRequestParts<S> for AdminAccount
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedAccount(account) = AuthenticatedAccount::from_request_parts(parts, state).await?;
        if account.role != AccountRole::Admin {
            return Err(AuthError::Forbidden.into());
        }
        Ok(AdminAccount(account))
    }
}

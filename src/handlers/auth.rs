//! Caller identity.
//!
//! Authentication happens upstream; the proxy forwards the verified user id in
//! the `x-user-id` header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::models::Seller;
use crate::services::account;
use crate::state::AppState;
use crate::utils::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

fn user_id(parts: &Parts) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::AuthError("Invalid user id".to_string()))
}

/// A signed-in caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id(parts)?
            .map(AuthUser)
            .ok_or_else(|| AppError::AuthError("Sign in to continue".to_string()))
    }
}

/// The caller if signed in; a malformed header still fails.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_id(parts)?))
    }
}

/// A signed-in caller with a seller account.
#[derive(Debug, Clone)]
pub struct SellerUser(pub Seller);

#[async_trait]
impl FromRequestParts<AppState> for SellerUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        account::require_seller(state.store.as_ref(), user_id)
            .await
            .map(SellerUser)
    }
}

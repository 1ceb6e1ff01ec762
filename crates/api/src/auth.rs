//! Caller identity supplied by the upstream auth layer.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::{AccessError, Caller};
use store::{Role, UserId};

use crate::error::ApiError;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extracts the authenticated [`Caller`] from request headers.
///
/// A missing or malformed header rejects the request as unauthenticated.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .ok_or(AccessError::Unauthenticated)
        };

        let user_id: UserId = header(USER_ID_HEADER)?
            .parse()
            .map_err(|_| AccessError::Unauthenticated)?;
        let role: Role = header(USER_ROLE_HEADER)?
            .parse()
            .map_err(|_| AccessError::Unauthenticated)?;

        Ok(Authenticated(Caller::new(user_id, role)))
    }
}

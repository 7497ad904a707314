use crate::error::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use types::ids::UserId;

/// Header carrying the caller's user id, set by the upstream auth proxy
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Caller identity extracted from [`USER_ID_HEADER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing user id header".into()))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid header string".into()))?;

        let id: i64 = raw
            .trim()
            .parse()
            .map_err(|_| AppError::Unauthorized(format!("User id must be an integer, got {raw:?}")))?;
        if id <= 0 {
            return Err(AppError::Unauthorized("User id must be positive".into()));
        }

        Ok(AuthenticatedUser {
            user_id: UserId::new(id),
        })
    }
}

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Owner identity, established by the external identity collaborator —
/// user authentication and session storage are out of scope for this
/// core — and forwarded to us as a header. Same forward-auth shape the
/// teacher's `forward_auth_middleware` expects a reverse proxy to
/// populate (`X-Auth-User`).
pub const IDENTITY_HEADER: &str = "x-auth-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner_id = parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        Ok(AuthenticatedUser(owner_id.to_string()))
    }
}

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::tokens::AccessClaims;
use crate::{db::models::Role, error::ApiError};

/// Identity of the caller, attached to the request by the auth layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
}

impl From<AccessClaims> for RequestContext {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            name: claims.name,
            email: claims.email,
        }
    }
}

impl RequestContext {
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }
}

/// Access token minted by a silent refresh during this request, so later
/// layers can authenticate without the cookie being sent again.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken(pub String);

/// Extracts the caller's [`RequestContext`], rejecting with 401 when the
/// request was not authenticated upstream.
#[derive(Debug, Clone)]
pub struct Authenticated(pub RequestContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(ApiError::unauthenticated)
    }
}

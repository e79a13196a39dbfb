use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use super::claims::{AccessClaims, Role};
use crate::error::AuthError;

/// Immutable identity established for one request by the authentication
/// gate. Lives in request extensions only; never shared across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn from_claims(claims: &AccessClaims) -> Option<Self> {
        Some(Self {
            id: claims.subject_id()?,
            email: claims.email.clone(),
            role: claims.user_role,
        })
    }
}

/// Extractor for handlers that require an authenticated caller. Rejects
/// with 401 when the gate attached no principal.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

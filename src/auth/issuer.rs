use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::claims::{AccessClaims, RefreshClaims, Role};
use super::codec::TokenCodec;
use super::validator::BEARER_PREFIX;
use crate::error::AuthResult;

/// Access tokens live 15 minutes from issuance.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Refresh tokens live 14 days, reset on every successful rotation.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 14 * 24 * 60 * 60;

/// Builds signed credentials from principal data.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Mint a `Bearer `-prefixed access token embedding subject, email and
    /// role. Callers strip the prefix before verification.
    pub fn issue_access(&self, user_id: i64, email: &str, role: Role) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            user_role: role,
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_SECS,
        };
        Ok(format!("{}{}", BEARER_PREFIX, self.codec.sign(&claims)?))
    }

    /// Mint a subject-free refresh token and return it with its expiry
    /// instant, which the caller persists alongside it.
    pub fn issue_refresh(&self) -> AuthResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(REFRESH_TOKEN_TTL_SECS);
        let claims = RefreshClaims {
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        Ok((self.codec.sign(&claims)?, expires_at))
    }
}

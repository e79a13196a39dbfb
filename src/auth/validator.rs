use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;

use super::claims::AccessClaims;
use super::codec::TokenCodec;
use crate::error::{AuthError, AuthResult};

/// Scheme prefix carried by access tokens on the wire.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Minimal payload shape shared by access and refresh tokens; used where
/// only signature/expiry matter.
#[derive(Debug, Deserialize)]
struct BareClaims {
    exp: i64,
}

/// Verifies presented credentials and extracts their claims. Performs no
/// store lookups; revocation is checked separately by the request gate.
#[derive(Clone)]
pub struct TokenValidator {
    codec: Arc<TokenCodec>,
}

impl TokenValidator {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Signature and expiry check only. Works for both token kinds.
    pub fn validate(&self, token: &str) -> AuthResult<()> {
        self.codec.decode::<BareClaims>(token).map(|_| ())
    }

    /// Verify and deserialize access-token claims. Malformed, unsupported,
    /// badly-signed and non-parseable inputs all fail as invalid; expiry
    /// fails as expired.
    pub fn extract_claims(&self, token: &str) -> AuthResult<AccessClaims> {
        self.codec.decode(token)
    }

    pub fn extract_subject_id(&self, token: &str) -> AuthResult<i64> {
        self.extract_claims(token)?
            .subject_id()
            .ok_or(AuthError::TokenInvalid)
    }

    /// Embedded expiry minus now. Negative when the token has already
    /// expired; callers treat any non-positive value as expired. The
    /// signature is still enforced.
    pub fn remaining_ttl(&self, token: &str) -> AuthResult<Duration> {
        let claims: BareClaims = self.codec.decode_expiry_tolerant(token)?;
        Ok(Duration::seconds(claims.exp - Utc::now().timestamp()))
    }

    /// Strip the `Bearer ` scheme from an Authorization header value.
    pub fn strip_bearer(header: &str) -> AuthResult<&str> {
        match header.strip_prefix(BEARER_PREFIX) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::TokenInvalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use crate::auth::issuer::TokenIssuer;

    fn setup() -> (TokenIssuer, TokenValidator) {
        let codec = Arc::new(TokenCodec::new(b"0123456789abcdef0123456789abcdef"));
        (TokenIssuer::new(codec.clone()), TokenValidator::new(codec))
    }

    #[test]
    fn strip_bearer_accepts_prefixed_and_rejects_bare() {
        assert_eq!(TokenValidator::strip_bearer("Bearer abc").unwrap(), "abc");
        assert!(TokenValidator::strip_bearer("abc").is_err());
        assert!(TokenValidator::strip_bearer("Bearer ").is_err());
        assert!(TokenValidator::strip_bearer("bearer abc").is_err());
    }

    #[test]
    fn subject_id_comes_back_out() {
        let (issuer, validator) = setup();
        let bearer = issuer.issue_access(9001, "x@y.z", Role::User).unwrap();
        let token = TokenValidator::strip_bearer(&bearer).unwrap();
        assert_eq!(validator.extract_subject_id(token).unwrap(), 9001);
    }

    #[test]
    fn remaining_ttl_is_positive_for_fresh_and_negative_for_expired() {
        let (issuer, validator) = setup();
        let bearer = issuer.issue_access(1, "a@b.c", Role::User).unwrap();
        let token = TokenValidator::strip_bearer(&bearer).unwrap();
        let ttl = validator.remaining_ttl(token).unwrap();
        assert!(ttl.num_seconds() > 0);

        let codec = Arc::new(TokenCodec::new(b"0123456789abcdef0123456789abcdef"));
        let now = Utc::now().timestamp();
        let expired = codec
            .sign(&AccessClaims {
                sub: "1".into(),
                email: "a@b.c".into(),
                user_role: Role::User,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        let ttl = validator.remaining_ttl(&expired).unwrap();
        assert!(ttl.num_seconds() <= 0);
    }
}

//! HMAC-SHA256 compact token encode/verify.
//!
//! Wraps `jsonwebtoken` with the two decode modes the rest of the crate
//! needs: strict (signature + expiry) and expiry-tolerant (signature only,
//! used to read the embedded expiry out of an already-expired token). The
//! key is built once from the process-wide secret and must never appear in
//! logs or error messages.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AuthError, AuthResult};

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    strict: Validation,
    expiry_tolerant: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut strict = Validation::new(Algorithm::HS256);
        strict.leeway = 0;
        let mut expiry_tolerant = Validation::new(Algorithm::HS256);
        expiry_tolerant.leeway = 0;
        expiry_tolerant.validate_exp = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            strict,
            expiry_tolerant,
        }
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {e}")))
    }

    /// Verify signature and expiry, then deserialize the payload.
    /// Expiry failures are reported distinctly from every other failure so
    /// callers can tell "reissue" apart from "tampered or malformed".
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> AuthResult<T> {
        jsonwebtoken::decode::<T>(token, &self.decoding, &self.strict)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })
    }

    /// Verify the signature but accept an expired `exp`. Structural and
    /// signature failures still fail as invalid.
    pub fn decode_expiry_tolerant<T: DeserializeOwned>(&self, token: &str) -> AuthResult<T> {
        jsonwebtoken::decode::<T>(token, &self.decoding, &self.expiry_tolerant)
            .map(|data| data.claims)
            .map_err(|_| AuthError::TokenInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{AccessClaims, Role};
    use chrono::Utc;

    fn codec(secret: &[u8]) -> TokenCodec {
        TokenCodec::new(secret)
    }

    fn claims_expiring_in(secs: i64) -> AccessClaims {
        let now = Utc::now().timestamp();
        AccessClaims {
            sub: "7".into(),
            email: "a@x.com".into(),
            user_role: Role::User,
            iat: now,
            exp: now + secs,
        }
    }

    #[test]
    fn sign_then_decode_round_trips() {
        let c = codec(b"0123456789abcdef0123456789abcdef");
        let token = c.sign(&claims_expiring_in(900)).unwrap();
        let back: AccessClaims = c.decode(&token).unwrap();
        assert_eq!(back.sub, "7");
        assert_eq!(back.email, "a@x.com");
        assert_eq!(back.user_role, Role::User);
    }

    #[test]
    fn wrong_key_fails_as_invalid() {
        let signer = codec(b"0123456789abcdef0123456789abcdef");
        let verifier = codec(b"fedcba9876543210fedcba9876543210");
        let token = signer.sign(&claims_expiring_in(900)).unwrap();
        let err = verifier.decode::<AccessClaims>(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[test]
    fn expired_is_distinct_from_malformed() {
        let c = codec(b"0123456789abcdef0123456789abcdef");
        let token = c.sign(&claims_expiring_in(-120)).unwrap();
        assert!(matches!(c.decode::<AccessClaims>(&token).unwrap_err(), AuthError::TokenExpired));
        assert!(matches!(
            c.decode::<AccessClaims>("not.a.token").unwrap_err(),
            AuthError::TokenInvalid
        ));
    }

    #[test]
    fn expiry_tolerant_decode_reads_expired_tokens() {
        let c = codec(b"0123456789abcdef0123456789abcdef");
        let token = c.sign(&claims_expiring_in(-120)).unwrap();
        let back: AccessClaims = c.decode_expiry_tolerant(&token).unwrap();
        assert!(back.exp < Utc::now().timestamp());
        // Signature is still enforced in the tolerant mode.
        let other = codec(b"fedcba9876543210fedcba9876543210");
        assert!(other.decode_expiry_tolerant::<AccessClaims>(&token).is_err());
    }
}

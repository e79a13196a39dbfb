//! Session lifecycle orchestration: signup, signin, signout, reissue and
//! administrative revocation. This is the only module that writes to the
//! refresh token and blacklist stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{password, Role, TokenIssuer, TokenValidator};
use crate::error::{AuthError, AuthResult};
use crate::store::{
    BlacklistEntry, BlacklistReason, RefreshTokenStore, TokenBlacklistStore, UserStore,
};

/// Access + refresh token pair returned by signup, signin and reissue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionService {
    users: Arc<dyn UserStore>,
    refresh: Arc<dyn RefreshTokenStore>,
    blacklist: Arc<dyn TokenBlacklistStore>,
    issuer: TokenIssuer,
    validator: TokenValidator,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh: Arc<dyn RefreshTokenStore>,
        blacklist: Arc<dyn TokenBlacklistStore>,
        issuer: TokenIssuer,
        validator: TokenValidator,
    ) -> Self {
        Self {
            users,
            refresh,
            blacklist,
            issuer,
            validator,
        }
    }

    /// Register a new account and issue its first token pair.
    pub async fn signup(&self, email: &str, password: &str, role: &str) -> AuthResult<TokenPair> {
        let role = Role::parse(role)
            .ok_or_else(|| AuthError::InvalidRequest(format!("unknown role: {role}")))?;
        if self.users.email_exists(email).await? {
            return Err(AuthError::DuplicateEmail);
        }
        let hash = password::hash_password(password)
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))?;
        let user = match self.users.create(email, &hash, role).await {
            Ok(user) => user,
            // Lost a race with a concurrent signup for the same email.
            Err(crate::store::StoreError::Conflict(_)) => return Err(AuthError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        };
        let pair = self.issue_pair(user.id, &user.email, user.role).await?;
        info!(user_id = user.id, "signup");
        Ok(pair)
    }

    /// Authenticate by email/password and rotate the refresh token.
    pub async fn signin(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !password::verify_password(&user.password_hash, password) {
            return Err(AuthError::BadCredentials);
        }
        let pair = self.issue_pair(user.id, &user.email, user.role).await?;
        info!(user_id = user.id, "signin");
        Ok(pair)
    }

    /// Invalidate the presented access token and drop the refresh token.
    /// The token's embedded subject must match `user_id`.
    pub async fn signout(&self, user_id: i64, bearer_header: &str) -> AuthResult<()> {
        let token = TokenValidator::strip_bearer(bearer_header)?;
        let claims = self.validator.extract_claims(token)?;
        let token_user_id = claims.subject_id().ok_or(AuthError::TokenInvalid)?;
        if token_user_id != user_id {
            return Err(AuthError::SubjectMismatch);
        }
        self.blacklist
            .add(BlacklistEntry {
                token: token.to_string(),
                expires_at: expiry_instant(claims.exp),
                user_id,
                reason: BlacklistReason::Logout,
            })
            .await?;
        self.refresh.delete(user_id).await?;
        info!(user_id, "signout");
        Ok(())
    }

    /// Exchange a refresh token for a brand-new pair. The presented token
    /// must be well-signed, unexpired, and byte-identical to the stored row
    /// for `user_id`; a superseded token always fails the exact-match check.
    /// On success the stored row is overwritten, so the presented token is
    /// spent. Ownership of `user_id` is asserted only by that match; the
    /// token itself names no subject.
    pub async fn reissue(&self, user_id: i64, presented: &str) -> AuthResult<TokenPair> {
        self.validator.validate(presented).map_err(|e| match e {
            AuthError::TokenExpired => AuthError::RefreshExpired,
            _ => AuthError::TokenInvalid,
        })?;

        let stored = self
            .refresh
            .get(user_id)
            .await?
            .ok_or(AuthError::RefreshMissing)?;
        if stored.token != presented {
            debug!(user_id, "refresh token mismatch; possible reuse of a superseded token");
            return Err(AuthError::RefreshMismatch);
        }
        // The row's own expiry governs even if the token's embedded expiry
        // has not passed (they can drift after clock adjustments).
        if stored.expires_at < Utc::now() {
            return Err(AuthError::RefreshExpired);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::RefreshMissing)?;
        let pair = self.issue_pair(user.id, &user.email, user.role).await?;
        info!(user_id, "reissue");
        Ok(pair)
    }

    /// Administrative blacklist insert for a suspected-compromised (or
    /// otherwise condemned) access token.
    pub async fn force_revoke(
        &self,
        bearer_or_raw: &str,
        user_id: i64,
        reason: BlacklistReason,
    ) -> AuthResult<()> {
        let token = TokenValidator::strip_bearer(bearer_or_raw).unwrap_or(bearer_or_raw);
        let claims = self.validator.extract_claims(token)?;
        self.blacklist
            .add(BlacklistEntry {
                token: token.to_string(),
                expires_at: expiry_instant(claims.exp),
                user_id,
                reason,
            })
            .await?;
        info!(user_id, reason = reason.as_str(), "token force-revoked");
        Ok(())
    }

    /// Password-change invalidation: drop the refresh token and condemn the
    /// access token the caller is currently holding.
    pub async fn invalidate_all_for_user(
        &self,
        user_id: i64,
        current_access_token: &str,
    ) -> AuthResult<()> {
        self.refresh.delete(user_id).await?;
        let token = TokenValidator::strip_bearer(current_access_token).unwrap_or(current_access_token);
        let claims = self.validator.extract_claims(token)?;
        self.blacklist
            .add(BlacklistEntry {
                token: token.to_string(),
                expires_at: expiry_instant(claims.exp),
                user_id,
                reason: BlacklistReason::PasswordChanged,
            })
            .await?;
        info!(user_id, "all tokens invalidated after password change");
        Ok(())
    }

    /// Issue a fresh pair and overwrite the user's refresh row in one
    /// conditional write (sliding expiration).
    async fn issue_pair(&self, user_id: i64, email: &str, role: Role) -> AuthResult<TokenPair> {
        let access_token = self.issuer.issue_access(user_id, email, role)?;
        let (refresh_token, expires_at) = self.issuer.issue_refresh()?;
        self.refresh.upsert(user_id, &refresh_token, expires_at).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

fn expiry_instant(exp_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(exp_secs, 0).unwrap_or_default()
}

//! Unified application error model and HTTP mapping.
//! Every failure the service can report to a caller is a variant here; the
//! HTTP boundary maps each to a status code and a stable machine-readable
//! code string. Nothing in this module is fatal to the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("no account for that email")]
    UserNotFound,
    #[error("wrong password")]
    BadCredentials,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("token subject does not match the requested user")]
    SubjectMismatch,
    #[error("access token has expired")]
    TokenExpired,
    #[error("invalid token")]
    TokenInvalid,
    #[error("token has already been invalidated")]
    TokenRevoked,
    #[error("no stored refresh token for that user")]
    RefreshMissing,
    #[error("refresh token does not match the stored one")]
    RefreshMismatch,
    #[error("refresh token has expired")]
    RefreshExpired,
    #[error("admin access required")]
    Forbidden,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Stable code string included in JSON error bodies. Clients key on
    /// these; in particular `access_expired` tells a client to reissue while
    /// `invalid_token` means the credential is unusable.
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::UserNotFound => "user_not_found",
            AuthError::BadCredentials => "bad_credentials",
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::Unauthenticated => "unauthorized",
            AuthError::SubjectMismatch => "subject_mismatch",
            AuthError::TokenExpired => "access_expired",
            AuthError::TokenInvalid => "invalid_token",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::RefreshMissing => "refresh_missing",
            AuthError::RefreshMismatch => "refresh_mismatch",
            AuthError::RefreshExpired => "refresh_expired",
            AuthError::Forbidden => "forbidden",
            AuthError::Store(_) => "store_unavailable",
            AuthError::Internal(_) => "internal",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail
            | AuthError::UserNotFound
            | AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::BadCredentials
            | AuthError::Unauthenticated
            | AuthError::SubjectMismatch
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::TokenRevoked
            | AuthError::RefreshMissing
            | AuthError::RefreshMismatch
            | AuthError::RefreshExpired => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Store(e) = &self {
            tracing::error!("store failure surfaced to caller: {e}");
        }
        let body = json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.to_string(),
        });
        (self.http_status(), Json(body)).into_response()
    }
}

//! Narrow persistence interfaces for the token lifecycle.
//!
//! Three traits cover exactly what the session service and request gate
//! need: the one-row-per-user refresh token table, the append-only token
//! blacklist, and the user account lookup. One durable backing exists
//! (SQLite) plus an in-memory fake for tests and for running without a
//! configured database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Why a token was blacklisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlacklistReason {
    #[serde(rename = "LOGOUT")]
    Logout,
    #[serde(rename = "COMPROMISED")]
    Compromised,
    #[serde(rename = "PASSWORD_CHANGED")]
    PasswordChanged,
    #[serde(rename = "DUPLICATE_LOGIN")]
    DuplicateLogin,
}

impl BlacklistReason {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOGOUT" => Some(Self::Logout),
            "COMPROMISED" => Some(Self::Compromised),
            "PASSWORD_CHANGED" => Some(Self::PasswordChanged),
            "DUPLICATE_LOGIN" => Some(Self::DuplicateLogin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "LOGOUT",
            Self::Compromised => "COMPROMISED",
            Self::PasswordChanged => "PASSWORD_CHANGED",
            Self::DuplicateLogin => "DUPLICATE_LOGIN",
        }
    }
}

/// The single live refresh token for one user. `user_id` is the primary
/// key, which is what enforces "at most one per user" structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// One blacklisted access token. `expires_at` is copied from the token's
/// own expiry so the row can be purged once it stops mattering. Rows are
/// never updated, only inserted and eventually purged.
#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: i64,
    pub reason: BlacklistReason,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn get(&self, user_id: i64) -> StoreResult<Option<RefreshRecord>>;

    /// Overwrite (or create) the user's row in a single atomic write. When
    /// two rotations race for the same user the last writer wins and the
    /// loser's token is silently superseded; that is the accepted policy,
    /// not a detected conflict.
    async fn upsert(&self, user_id: i64, token: &str, expires_at: DateTime<Utc>) -> StoreResult<()>;

    async fn delete(&self, user_id: i64) -> StoreResult<()>;

    /// Delete every row whose expiry is strictly before `now`, atomically.
    /// Returns the number of rows removed.
    async fn purge_expired_before(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait TokenBlacklistStore: Send + Sync {
    /// Exact-string membership test, evaluated on every authenticated
    /// request; must be a keyed lookup.
    async fn exists(&self, token: &str) -> StoreResult<bool>;

    async fn add(&self, entry: BlacklistEntry) -> StoreResult<()>;

    async fn purge_expired_before(&self, threshold: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, email: &str, password_hash: &str, role: Role) -> StoreResult<UserRecord>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>>;
    async fn email_exists(&self, email: &str) -> StoreResult<bool>;
}

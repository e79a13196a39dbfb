//! SQLite-backed store implementation.
//!
//! One pool, three tables, schema created at connect time. Timestamps are
//! stored as unix milliseconds. Lookups on `refresh_tokens.user_id` and
//! `token_blacklist.token` ride the primary keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::{
    BlacklistEntry, RefreshRecord, RefreshTokenStore, StoreError, StoreResult,
    TokenBlacklistStore, UserRecord, UserStore,
};
use crate::auth::Role;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .map_err(map_sqlx_err)?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> StoreResult<()> {
        let queries = [
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS refresh_tokens (
                user_id INTEGER PRIMARY KEY,
                token TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS token_blacklist (
                token TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                reason TEXT NOT NULL
            );"#,
        ];
        for q in queries {
            sqlx::query(q).execute(&self.pool).await.map_err(map_sqlx_err)?;
        }
        Ok(())
    }
}

fn map_sqlx_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Unavailable(e.to_string()),
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn role_from_db(s: &str) -> StoreResult<Role> {
    Role::parse(s).ok_or_else(|| StoreError::Unavailable(format!("unknown role in users table: {s}")))
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<UserRecord> {
    Ok(UserRecord {
        id: row.try_get("id").map_err(map_sqlx_err)?,
        email: row.try_get("email").map_err(map_sqlx_err)?,
        password_hash: row.try_get("password_hash").map_err(map_sqlx_err)?,
        role: role_from_db(&row.try_get::<String, _>("role").map_err(map_sqlx_err)?)?,
    })
}

#[async_trait]
impl RefreshTokenStore for SqliteStore {
    async fn get(&self, user_id: i64) -> StoreResult<Option<RefreshRecord>> {
        let row = sqlx::query("SELECT user_id, token, expires_at FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row.map(|row| {
            Ok(RefreshRecord {
                user_id: row.try_get("user_id").map_err(map_sqlx_err)?,
                token: row.try_get("token").map_err(map_sqlx_err)?,
                expires_at: millis_to_datetime(row.try_get("expires_at").map_err(map_sqlx_err)?),
            })
        })
        .transpose()
    }

    async fn upsert(&self, user_id: i64, token: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        // Single conditional write keyed on the primary key; concurrent
        // rotations for one user resolve as last-writer-wins.
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET token = excluded.token, expires_at = excluded.expires_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn purge_expired_before(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenBlacklistStore for SqliteStore {
    async fn exists(&self, token: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 AS present FROM token_blacklist WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(row.is_some())
    }

    async fn add(&self, entry: BlacklistEntry) -> StoreResult<()> {
        // Re-blacklisting the same token is a no-op, not an error.
        sqlx::query(
            "INSERT OR IGNORE INTO token_blacklist (token, expires_at, user_id, reason) VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.token)
        .bind(entry.expires_at.timestamp_millis())
        .bind(entry.user_id)
        .bind(entry.reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn purge_expired_before(&self, threshold: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < ?")
            .bind(threshold.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create(&self, email: &str, password_hash: &str, role: Role) -> StoreResult<UserRecord> {
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(UserRecord {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
        })
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, password_hash, role FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, password_hash, role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 AS present FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BlacklistReason;

    #[test]
    fn reason_and_role_db_round_trip() {
        for reason in [
            BlacklistReason::Logout,
            BlacklistReason::Compromised,
            BlacklistReason::PasswordChanged,
            BlacklistReason::DuplicateLogin,
        ] {
            assert_eq!(BlacklistReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(BlacklistReason::parse("OTHER"), None);
        assert_eq!(role_from_db("ADMIN").unwrap(), Role::Admin);
        assert!(role_from_db("root").is_err());
    }
}

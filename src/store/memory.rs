//! In-memory store implementation.
//!
//! Backs the store traits entirely with `HashMap`s guarded by
//! `tokio::sync::RwLock`. Used for tests and as the fallback when no
//! database URL is configured. Not durable: all state is lost on restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    BlacklistEntry, RefreshRecord, RefreshTokenStore, StoreResult, TokenBlacklistStore,
    UserRecord, UserStore,
};
use crate::auth::Role;
use crate::store::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<i64, UserRecord>>,
    refresh: RwLock<HashMap<i64, RefreshRecord>>,
    blacklist: RwLock<HashMap<String, BlacklistEntry>>,
    next_user_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_user_id: AtomicI64::new(1),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn get(&self, user_id: i64) -> StoreResult<Option<RefreshRecord>> {
        Ok(self.refresh.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, user_id: i64, token: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        // One insert under the write lock; last writer wins on races.
        self.refresh.write().await.insert(
            user_id,
            RefreshRecord {
                user_id,
                token: token.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, user_id: i64) -> StoreResult<()> {
        self.refresh.write().await.remove(&user_id);
        Ok(())
    }

    async fn purge_expired_before(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut map = self.refresh.write().await;
        let before = map.len();
        map.retain(|_, rec| rec.expires_at >= now);
        Ok((before - map.len()) as u64)
    }
}

#[async_trait]
impl TokenBlacklistStore for MemoryStore {
    async fn exists(&self, token: &str) -> StoreResult<bool> {
        Ok(self.blacklist.read().await.contains_key(token))
    }

    async fn add(&self, entry: BlacklistEntry) -> StoreResult<()> {
        self.blacklist.write().await.insert(entry.token.clone(), entry);
        Ok(())
    }

    async fn purge_expired_before(&self, threshold: DateTime<Utc>) -> StoreResult<u64> {
        let mut map = self.blacklist.write().await;
        let before = map.len();
        map.retain(|_, entry| entry.expires_at >= threshold);
        Ok((before - map.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, email: &str, password_hash: &str, role: Role) -> StoreResult<UserRecord> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(format!("email already registered: {email}")));
        }
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let record = UserRecord {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
        };
        users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.users.read().await.values().any(|u| u.email == email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn upsert_keeps_one_row_per_user() {
        let store = MemoryStore::new();
        let exp = Utc::now() + Duration::days(14);
        store.upsert(1, "first", exp).await.unwrap();
        store.upsert(1, "second", exp).await.unwrap();
        let rec = RefreshTokenStore::get(&store, 1).await.unwrap().unwrap();
        assert_eq!(rec.token, "second");
        assert_eq!(store.refresh.read().await.len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_strictly_before_only() {
        let store = MemoryStore::new();
        let cutoff = Utc::now();
        store.upsert(1, "old", cutoff - Duration::seconds(1)).await.unwrap();
        store.upsert(2, "boundary", cutoff).await.unwrap();
        store.upsert(3, "fresh", cutoff + Duration::days(1)).await.unwrap();
        let removed = RefreshTokenStore::purge_expired_before(&store, cutoff).await.unwrap();
        assert_eq!(removed, 1);
        assert!(RefreshTokenStore::get(&store, 1).await.unwrap().is_none());
        // Expiry exactly at the threshold stays.
        assert!(RefreshTokenStore::get(&store, 2).await.unwrap().is_some());
        assert!(RefreshTokenStore::get(&store, 3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.create("a@x.com", "phc", Role::User).await.unwrap();
        let err = store.create("a@x.com", "phc2", Role::User).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}

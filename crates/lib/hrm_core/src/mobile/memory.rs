//! In-memory implementation of the mobile auth stores.
//!
//! Used by tests and local runs without PostgreSQL. Challenge CAS relies on
//! the DashMap shard write lock; refresh tokens sit behind a single mutex so
//! rotations and user-wide revocations are serialized.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::MobileAuthError;
use super::device::DeviceHeaders;
use super::store::{ChallengeStore, DeviceStore, RefreshTokenStore, UserDirectory};
use crate::models::mobile::{ChallengeRecord, DeviceRecord, MobileUserAccount, RefreshTokenRecord};
use crate::uuid::uuidv7;

#[derive(Default)]
pub struct MemoryMobileStore {
    users: DashMap<String, MobileUserAccount>,
    /// Keyed by `(user_id, device_id)`.
    devices: DashMap<(String, String), DeviceRecord>,
    /// Keyed by nonce.
    challenges: DashMap<String, ChallengeRecord>,
    refresh_tokens: Mutex<HashMap<Uuid, RefreshTokenRecord>>,
}

impl MemoryMobileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user account.
    pub fn insert_user(&self, account: MobileUserAccount) {
        self.users.insert(account.id.clone(), account);
    }
}

/// Revoke every unrevoked token matching `filter`, returning how many.
fn revoke_where(
    tokens: &mut HashMap<Uuid, RefreshTokenRecord>,
    now: DateTime<Utc>,
    filter: impl Fn(&RefreshTokenRecord) -> bool,
) -> u64 {
    let mut revoked = 0;
    for record in tokens.values_mut() {
        if record.revoked_at.is_none() && filter(record) {
            record.revoked_at = Some(now);
            revoked += 1;
        }
    }
    revoked
}

#[async_trait]
impl DeviceStore for MemoryMobileStore {
    async fn find_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<DeviceRecord>, MobileAuthError> {
        Ok(self
            .devices
            .get(&(user_id.to_string(), device_id.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_device(
        &self,
        user_id: &str,
        device: &DeviceHeaders,
    ) -> Result<DeviceRecord, MobileAuthError> {
        let now = Utc::now();
        let key = (user_id.to_string(), device.device_id.clone());
        let record = match self.devices.entry(key) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.platform = device.platform.clone().or(record.platform.take());
                record.name = device.name.clone().or(record.name.take());
                record.app_version = device.app_version.clone().or(record.app_version.take());
                record.user_agent = device.user_agent.clone().or(record.user_agent.take());
                record.last_seen_at = now;
                record.clone()
            }
            Entry::Vacant(vacant) => vacant
                .insert(DeviceRecord {
                    id: uuidv7(),
                    user_id: user_id.to_string(),
                    device_id: device.device_id.clone(),
                    platform: device.platform.clone(),
                    name: device.name.clone(),
                    app_version: device.app_version.clone(),
                    user_agent: device.user_agent.clone(),
                    created_at: now,
                    last_seen_at: now,
                })
                .clone(),
        };
        Ok(record)
    }
}

#[async_trait]
impl ChallengeStore for MemoryMobileStore {
    async fn insert_challenge(&self, challenge: &ChallengeRecord) -> Result<(), MobileAuthError> {
        match self.challenges.entry(challenge.nonce.clone()) {
            Entry::Occupied(_) => Err(MobileAuthError::Internal("duplicate challenge nonce".into())),
            Entry::Vacant(vacant) => {
                vacant.insert(challenge.clone());
                Ok(())
            }
        }
    }

    async fn find_challenge(&self, nonce: &str) -> Result<Option<ChallengeRecord>, MobileAuthError> {
        Ok(self
            .challenges
            .get(nonce)
            .map(|entry| entry.value().clone()))
    }

    async fn mark_challenge_used(
        &self,
        nonce: &str,
        used_at: DateTime<Utc>,
    ) -> Result<bool, MobileAuthError> {
        let Some(mut challenge) = self.challenges.get_mut(nonce) else {
            return Ok(false);
        };
        if challenge.used_at.is_some() || challenge.expires_at <= used_at {
            return Ok(false);
        }
        challenge.used_at = Some(used_at);
        Ok(true)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryMobileStore {
    async fn insert_refresh_token(
        &self,
        record: &RefreshTokenRecord,
    ) -> Result<(), MobileAuthError> {
        let mut tokens = self.refresh_tokens.lock().await;
        if tokens.values().any(|t| t.token_hash == record.token_hash) {
            return Err(MobileAuthError::Internal("duplicate refresh token hash".into()));
        }
        tokens.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, MobileAuthError> {
        let tokens = self.refresh_tokens.lock().await;
        Ok(tokens.values().find(|t| t.token_hash == token_hash).cloned())
    }

    async fn rotate_refresh_token(
        &self,
        current_id: Uuid,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, MobileAuthError> {
        let mut tokens = self.refresh_tokens.lock().await;
        let Some(current) = tokens.get_mut(&current_id) else {
            return Ok(false);
        };
        if current.revoked_at.is_some() {
            return Ok(false);
        }
        current.revoked_at = Some(replacement.created_at);
        current.replaced_by = Some(replacement.id);
        tokens.insert(replacement.id, replacement.clone());
        Ok(true)
    }

    async fn revoke_refresh_token(&self, token_id: Uuid) -> Result<bool, MobileAuthError> {
        let mut tokens = self.refresh_tokens.lock().await;
        Ok(revoke_where(&mut tokens, Utc::now(), |t| t.id == token_id) > 0)
    }

    async fn revoke_refresh_family(
        &self,
        user_id: &str,
        family_id: Uuid,
    ) -> Result<u64, MobileAuthError> {
        let mut tokens = self.refresh_tokens.lock().await;
        Ok(revoke_where(&mut tokens, Utc::now(), |t| {
            t.user_id == user_id && t.family_id == family_id
        }))
    }

    async fn revoke_device_refresh_tokens(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<u64, MobileAuthError> {
        let mut tokens = self.refresh_tokens.lock().await;
        Ok(revoke_where(&mut tokens, Utc::now(), |t| {
            t.user_id == user_id && t.device_id == device_id
        }))
    }

    async fn revoke_all_refresh_tokens(&self, user_id: &str) -> Result<u64, MobileAuthError> {
        let mut tokens = self.refresh_tokens.lock().await;
        Ok(revoke_where(&mut tokens, Utc::now(), |t| t.user_id == user_id))
    }
}

#[async_trait]
impl UserDirectory for MemoryMobileStore {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MobileUserAccount>, MobileAuthError> {
        let email = email.trim();
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().email.eq_ignore_ascii_case(email))
            .map(|entry| entry.value().clone()))
    }

    async fn find_user_by_id(
        &self,
        user_id: &str,
    ) -> Result<Option<MobileUserAccount>, MobileAuthError> {
        Ok(self.users.get(user_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(nonce: &str, expires_in: i64) -> ChallengeRecord {
        let now = Utc::now();
        ChallengeRecord {
            id: uuidv7(),
            nonce: nonce.to_string(),
            user_id: "u1".into(),
            device_id: Uuid::new_v4(),
            expires_at: now + chrono::Duration::seconds(expires_in),
            used_at: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_nonce_is_rejected() {
        let store = MemoryMobileStore::new();
        store.insert_challenge(&challenge("n1", 60)).await.unwrap();
        assert!(store.insert_challenge(&challenge("n1", 60)).await.is_err());
    }

    #[tokio::test]
    async fn mark_used_is_conditional() {
        let store = MemoryMobileStore::new();
        store.insert_challenge(&challenge("live", 60)).await.unwrap();
        store.insert_challenge(&challenge("dead", -1)).await.unwrap();

        let now = Utc::now();
        assert!(store.mark_challenge_used("live", now).await.unwrap());
        assert!(!store.mark_challenge_used("live", now).await.unwrap());
        assert!(!store.mark_challenge_used("dead", now).await.unwrap());
        assert!(!store.mark_challenge_used("missing", now).await.unwrap());

        let stored = store.find_challenge("live").await.unwrap().unwrap();
        assert_eq!(stored.used_at, Some(now));
    }

    #[tokio::test]
    async fn upsert_keeps_metadata_not_resent() {
        let store = MemoryMobileStore::new();
        let mut device = DeviceHeaders {
            device_id: "device-0001".into(),
            platform: Some("ios".into()),
            name: Some("iPhone".into()),
            app_version: Some("1.0.0".into()),
            user_agent: None,
        };
        let first = store.upsert_device("u1", &device).await.unwrap();

        device.name = None;
        device.app_version = Some("1.1.0".into());
        let second = store.upsert_device("u1", &device).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.name.as_deref(), Some("iPhone"));
        assert_eq!(second.app_version.as_deref(), Some("1.1.0"));
        assert!(second.last_seen_at >= first.last_seen_at);
    }

    #[tokio::test]
    async fn finds_users_case_insensitively() {
        let store = MemoryMobileStore::new();
        store.insert_user(MobileUserAccount {
            id: "u1".into(),
            email: "Ana@Example.com".into(),
            tenant_id: None,
            role: "EMPLOYEE".into(),
            employee_id: None,
            password_hash: None,
        });
        assert!(store.find_user_by_email("ana@example.com").await.unwrap().is_some());
        assert!(store.find_user_by_id("u1").await.unwrap().is_some());
        assert!(store.find_user_by_id("u2").await.unwrap().is_none());
    }
}

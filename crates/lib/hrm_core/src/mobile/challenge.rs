//! Single-use, time-boxed challenge nonces bound to a user and device.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::MobileAuthError;
use super::config::DEFAULT_CHALLENGE_TTL;
use super::store::ChallengeStore;
use crate::models::mobile::ChallengeRecord;
use crate::uuid::uuidv7;

/// Random bytes per nonce (encoded to 43 base64url characters).
pub const NONCE_BYTES: usize = 32;

/// Nonce handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedChallenge {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a URL-safe random nonce.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues and consumes challenges.
#[derive(Clone)]
pub struct ChallengeService {
    store: Arc<dyn ChallengeStore>,
    ttl: chrono::Duration,
}

impl ChallengeService {
    pub fn new(store: Arc<dyn ChallengeStore>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| {
            chrono::Duration::seconds(DEFAULT_CHALLENGE_TTL.as_secs() as i64)
        });
        Self { store, ttl }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Issue a nonce for `(user_id, device_record_id)` expiring after the TTL.
    pub async fn create_challenge(
        &self,
        user_id: &str,
        device_record_id: Uuid,
    ) -> Result<IssuedChallenge, MobileAuthError> {
        self.create_challenge_at(user_id, device_record_id, Utc::now())
            .await
    }

    pub(crate) async fn create_challenge_at(
        &self,
        user_id: &str,
        device_record_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, MobileAuthError> {
        let record = ChallengeRecord {
            id: uuidv7(),
            nonce: generate_nonce(),
            user_id: user_id.to_string(),
            device_id: device_record_id,
            expires_at: now + self.ttl,
            used_at: None,
            created_at: now,
        };
        self.store.insert_challenge(&record).await?;
        debug!(user_id, device = %device_record_id, expires_at = %record.expires_at, "challenge issued");

        Ok(IssuedChallenge {
            nonce: record.nonce,
            expires_at: record.expires_at,
        })
    }

    /// Consume a nonce. `false` covers every rejection (unknown, wrong user
    /// or device, already used, expired) without saying which.
    pub async fn consume_challenge(
        &self,
        nonce: &str,
        user_id: &str,
        device_record_id: Uuid,
    ) -> Result<bool, MobileAuthError> {
        self.consume_challenge_at(nonce, user_id, device_record_id, Utc::now())
            .await
    }

    pub(crate) async fn consume_challenge_at(
        &self,
        nonce: &str,
        user_id: &str,
        device_record_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, MobileAuthError> {
        let Some(challenge) = self.store.find_challenge(nonce).await? else {
            return Ok(false);
        };

        if challenge.user_id != user_id
            || challenge.device_id != device_record_id
            || challenge.used_at.is_some()
            || challenge.expires_at <= now
        {
            return Ok(false);
        }

        let consumed = self.store.mark_challenge_used(nonce, now).await?;
        if consumed {
            debug!(user_id, "challenge consumed");
        }
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;
    use crate::mobile::memory::MemoryMobileStore;

    fn service() -> ChallengeService {
        ChallengeService::new(Arc::new(MemoryMobileStore::new()), DEFAULT_CHALLENGE_TTL)
    }

    #[test]
    fn nonce_is_url_safe_and_long_enough() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 43);
        assert!(
            nonce
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(nonce, generate_nonce());
    }

    #[tokio::test]
    async fn expiry_is_creation_plus_ttl() {
        let service = ChallengeService::new(
            Arc::new(MemoryMobileStore::new()),
            Duration::from_secs(30),
        );
        let now = Utc::now();
        let issued = service
            .create_challenge_at("u1", Uuid::new_v4(), now)
            .await
            .unwrap();
        assert_eq!(issued.expires_at, now + chrono::Duration::seconds(30));
    }

    #[tokio::test]
    async fn consumes_exactly_once() {
        let service = service();
        let device = Uuid::new_v4();
        let issued = service.create_challenge("u1", device).await.unwrap();

        assert!(service.consume_challenge(&issued.nonce, "u1", device).await.unwrap());
        assert!(!service.consume_challenge(&issued.nonce, "u1", device).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_wrong_user_device_or_unknown_nonce() {
        let service = service();
        let device = Uuid::new_v4();
        let issued = service.create_challenge("u1", device).await.unwrap();

        assert!(!service.consume_challenge("unknown", "u1", device).await.unwrap());
        assert!(!service.consume_challenge(&issued.nonce, "u2", device).await.unwrap());
        assert!(
            !service
                .consume_challenge(&issued.nonce, "u1", Uuid::new_v4())
                .await
                .unwrap()
        );
        // Failed attempts do not burn the nonce.
        assert!(service.consume_challenge(&issued.nonce, "u1", device).await.unwrap());
    }

    #[tokio::test]
    async fn expired_challenge_is_never_consumable() {
        let service = service();
        let device = Uuid::new_v4();
        let created = Utc::now();
        let issued = service
            .create_challenge_at("u1", device, created)
            .await
            .unwrap();

        // At the expiry instant the challenge is already dead.
        assert!(
            !service
                .consume_challenge_at(&issued.nonce, "u1", device, issued.expires_at)
                .await
                .unwrap()
        );
        assert!(
            !service
                .consume_challenge_at(
                    &issued.nonce,
                    "u1",
                    device,
                    issued.expires_at + chrono::Duration::seconds(5)
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn short_ttl_expires_in_real_time() {
        let service = ChallengeService::new(
            Arc::new(MemoryMobileStore::new()),
            Duration::from_millis(50),
        );
        let device = Uuid::new_v4();
        let issued = service.create_challenge("u1", device).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!service.consume_challenge(&issued.nonce, "u1", device).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_yield_a_single_winner() {
        const ATTEMPTS: usize = 32;

        let service = service();
        let device = Uuid::new_v4();
        let issued = service.create_challenge("u1", device).await.unwrap();

        let handles = (0..ATTEMPTS).map(|_| {
            let service = service.clone();
            let nonce = issued.nonce.clone();
            tokio::spawn(async move { service.consume_challenge(&nonce, "u1", device).await })
        });
        let results: Vec<bool> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(results.iter().filter(|won| **won).count(), 1);
        assert_eq!(results.iter().filter(|won| !**won).count(), ATTEMPTS - 1);
    }
}

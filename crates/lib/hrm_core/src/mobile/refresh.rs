//! Opaque refresh tokens: issuance, rotation-on-use and revocation.
//!
//! Only a SHA-256 hash of each token is stored. Every use rotates the token;
//! presenting a token that was already rotated away revokes its whole family,
//! since the legitimate client can no longer hold it.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::MobileAuthError;
use super::store::RefreshTokenStore;
use crate::models::mobile::RefreshTokenRecord;
use crate::uuid::uuidv7;

/// Random bytes per refresh token.
const REFRESH_TOKEN_BYTES: usize = 32;

/// Upper bound on a configured lifetime (10 years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// A freshly minted refresh token. `token` is never stored.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful rotation.
#[derive(Debug, Clone)]
pub struct RotatedRefreshToken {
    pub user_id: String,
    pub device_id: String,
    pub refresh: IssuedRefreshToken,
}

/// Generate a cryptographically random refresh token (base64url, no padding).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash a refresh token for storage.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct RefreshTokenManager {
    store: Arc<dyn RefreshTokenStore>,
    ttl: chrono::Duration,
}

impl RefreshTokenManager {
    pub fn new(store: Arc<dyn RefreshTokenStore>, ttl_secs: u64) -> Self {
        let ttl = chrono::Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        Self { store, ttl }
    }

    /// Lifetime of newly issued tokens, in whole seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a token starting a new rotation family.
    pub async fn issue(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<IssuedRefreshToken, MobileAuthError> {
        let (issued, record) = self.mint(user_id, device_id, uuidv7(), Utc::now());
        self.store.insert_refresh_token(&record).await?;
        debug!(user_id, family = %record.family_id, "refresh token issued");
        Ok(issued)
    }

    /// Exchange `token` for a replacement bound to the same user and device.
    ///
    /// Fails with [`MobileAuthError::RefreshRejected`] when the token is
    /// unknown, expired, revoked, presented from another device, or lost a
    /// concurrent rotation.
    pub async fn rotate(
        &self,
        token: &str,
        device_id: &str,
    ) -> Result<RotatedRefreshToken, MobileAuthError> {
        let now = Utc::now();
        let Some(current) = self
            .store
            .find_refresh_token(&hash_refresh_token(token))
            .await?
        else {
            debug!("unknown refresh token");
            return Err(MobileAuthError::RefreshRejected);
        };

        if current.revoked_at.is_some() {
            if current.replaced_by.is_some() {
                let revoked = self
                    .store
                    .revoke_refresh_family(&current.user_id, current.family_id)
                    .await?;
                warn!(
                    user_id = %current.user_id,
                    family = %current.family_id,
                    revoked,
                    "rotated refresh token reused, family revoked"
                );
            }
            return Err(MobileAuthError::RefreshRejected);
        }
        if current.expires_at <= now {
            debug!(user_id = %current.user_id, "expired refresh token");
            return Err(MobileAuthError::RefreshRejected);
        }
        if current.device_id != device_id {
            warn!(user_id = %current.user_id, "refresh token presented from another device");
            return Err(MobileAuthError::RefreshRejected);
        }

        let (issued, replacement) =
            self.mint(&current.user_id, &current.device_id, current.family_id, now);
        if !self
            .store
            .rotate_refresh_token(current.id, &replacement)
            .await?
        {
            debug!(user_id = %current.user_id, "refresh token rotated concurrently");
            return Err(MobileAuthError::RefreshRejected);
        }

        Ok(RotatedRefreshToken {
            user_id: current.user_id,
            device_id: current.device_id,
            refresh: issued,
        })
    }

    /// Revoke the presented token. Unknown or already revoked tokens are a no-op.
    pub async fn revoke(&self, token: &str) -> Result<bool, MobileAuthError> {
        match self
            .store
            .find_refresh_token(&hash_refresh_token(token))
            .await?
        {
            Some(record) => self.store.revoke_refresh_token(record.id).await,
            None => Ok(false),
        }
    }

    /// Revoke every token the user holds on one device.
    pub async fn revoke_for_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<u64, MobileAuthError> {
        let revoked = self
            .store
            .revoke_device_refresh_tokens(user_id, device_id)
            .await?;
        info!(user_id, revoked, "refresh tokens revoked for device");
        Ok(revoked)
    }

    /// Log out everywhere: revoke every token the user holds.
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, MobileAuthError> {
        let revoked = self.store.revoke_all_refresh_tokens(user_id).await?;
        info!(user_id, revoked, "all refresh tokens revoked");
        Ok(revoked)
    }

    fn mint(
        &self,
        user_id: &str,
        device_id: &str,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> (IssuedRefreshToken, RefreshTokenRecord) {
        let token = generate_refresh_token();
        let record = RefreshTokenRecord {
            id: uuidv7(),
            token_hash: hash_refresh_token(&token),
            family_id,
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
            revoked_at: None,
            replaced_by: None,
        };
        let issued = IssuedRefreshToken {
            token,
            expires_at: record.expires_at,
        };
        (issued, record)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use futures::future::join_all;

    use super::*;
    use crate::mobile::config::DEFAULT_REFRESH_TOKEN_TTL_SECS;
    use crate::mobile::memory::MemoryMobileStore;

    pub(crate) const DEVICE: &str = "device-0001";

    fn manager() -> RefreshTokenManager {
        RefreshTokenManager::new(
            Arc::new(MemoryMobileStore::new()),
            DEFAULT_REFRESH_TOKEN_TTL_SECS,
        )
    }

    #[test]
    fn token_is_url_safe() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn hash_is_deterministic_hex() {
        let hash = hash_refresh_token("some-refresh-token");
        assert_eq!(hash, hash_refresh_token("some-refresh-token"));
        assert_ne!(hash, hash_refresh_token("other-refresh-token"));
        assert_eq!(hash.len(), 64);
    }

    #[tokio::test]
    async fn rotation_replaces_the_token() {
        let manager = manager();
        let issued = manager.issue("u1", DEVICE).await.unwrap();

        let rotated = manager.rotate(&issued.token, DEVICE).await.unwrap();
        assert_eq!(rotated.user_id, "u1");
        assert_eq!(rotated.device_id, DEVICE);
        assert_ne!(rotated.refresh.token, issued.token);

        let again = manager.rotate(&rotated.refresh.token, DEVICE).await.unwrap();
        assert_eq!(again.user_id, "u1");
    }

    #[tokio::test]
    async fn reuse_of_rotated_token_revokes_the_family() {
        let manager = manager();
        let issued = manager.issue("u1", DEVICE).await.unwrap();
        let rotated = manager.rotate(&issued.token, DEVICE).await.unwrap();

        assert!(matches!(
            manager.rotate(&issued.token, DEVICE).await,
            Err(MobileAuthError::RefreshRejected)
        ));
        // The descendant handed out before the reuse is now dead too.
        assert!(matches!(
            manager.rotate(&rotated.refresh.token, DEVICE).await,
            Err(MobileAuthError::RefreshRejected)
        ));
    }

    #[tokio::test]
    async fn reuse_does_not_touch_other_families() {
        let manager = manager();
        let phone = manager.issue("u1", DEVICE).await.unwrap();
        let tablet = manager.issue("u1", "device-0002").await.unwrap();

        manager.rotate(&phone.token, DEVICE).await.unwrap();
        assert!(manager.rotate(&phone.token, DEVICE).await.is_err());

        assert!(manager.rotate(&tablet.token, "device-0002").await.is_ok());
    }

    #[tokio::test]
    async fn rejects_unknown_expired_and_foreign_device() {
        let store = Arc::new(MemoryMobileStore::new());
        let manager = RefreshTokenManager::new(store.clone(), DEFAULT_REFRESH_TOKEN_TTL_SECS);
        assert!(manager.rotate("nope", DEVICE).await.is_err());

        let issued = manager.issue("u1", DEVICE).await.unwrap();
        assert!(matches!(
            manager.rotate(&issued.token, "device-9999").await,
            Err(MobileAuthError::RefreshRejected)
        ));
        // A wrong-device attempt does not consume the token.
        assert!(manager.rotate(&issued.token, DEVICE).await.is_ok());

        let expired_manager = RefreshTokenManager::new(store, 0);
        let expired = expired_manager.issue("u1", DEVICE).await.unwrap();
        assert!(matches!(
            expired_manager.rotate(&expired.token, DEVICE).await,
            Err(MobileAuthError::RefreshRejected)
        ));
    }

    #[tokio::test]
    async fn revoke_single_token() {
        let manager = manager();
        let issued = manager.issue("u1", DEVICE).await.unwrap();
        assert!(manager.revoke(&issued.token).await.unwrap());
        assert!(!manager.revoke(&issued.token).await.unwrap());
        assert!(!manager.revoke("unknown").await.unwrap());
        assert!(manager.rotate(&issued.token, DEVICE).await.is_err());
    }

    #[tokio::test]
    async fn revoke_for_device_leaves_other_devices() {
        let manager = manager();
        let a1 = manager.issue("u1", DEVICE).await.unwrap();
        let a2 = manager.issue("u1", DEVICE).await.unwrap();
        let b = manager.issue("u1", "device-0002").await.unwrap();

        assert_eq!(manager.revoke_for_device("u1", DEVICE).await.unwrap(), 2);
        assert!(manager.rotate(&a1.token, DEVICE).await.is_err());
        assert!(manager.rotate(&a2.token, DEVICE).await.is_err());
        assert!(manager.rotate(&b.token, "device-0002").await.is_ok());
    }

    #[tokio::test]
    async fn revoke_all_counts_and_invalidates_every_token() {
        let manager = manager();
        let tokens = vec![
            manager.issue("u1", DEVICE).await.unwrap(),
            manager.issue("u1", "device-0002").await.unwrap(),
            manager.issue("u1", "device-0003").await.unwrap(),
        ];
        let other = manager.issue("u2", DEVICE).await.unwrap();

        assert_eq!(manager.revoke_all_for_user("u1").await.unwrap(), 3);
        for (issued, device) in tokens.iter().zip([DEVICE, "device-0002", "device-0003"]) {
            assert!(matches!(
                manager.rotate(&issued.token, device).await,
                Err(MobileAuthError::RefreshRejected)
            ));
        }
        assert_eq!(manager.revoke_all_for_user("u1").await.unwrap(), 0);
        assert!(manager.rotate(&other.token, DEVICE).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_all_counts_rotated_replacements_once() {
        let manager = manager();
        let issued = manager.issue("u1", DEVICE).await.unwrap();
        let rotated = manager.rotate(&issued.token, DEVICE).await.unwrap();

        // Only the live replacement is counted; the rotated original is already revoked.
        assert_eq!(manager.revoke_all_for_user("u1").await.unwrap(), 1);
        assert!(manager.rotate(&rotated.refresh.token, DEVICE).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rotation_has_one_winner() {
        let manager = manager();
        let issued = manager.issue("u1", DEVICE).await.unwrap();

        let handles = (0..16).map(|_| {
            let manager = manager.clone();
            let token = issued.token.clone();
            tokio::spawn(async move { manager.rotate(&token, DEVICE).await })
        });
        let winners = join_all(handles)
            .await
            .into_iter()
            .filter(|joined| matches!(joined, Ok(Ok(_))))
            .count();
        assert_eq!(winners, 1);
    }

    /// Replays a rotated token while the legitimate holder rotates its
    /// successor. Whichever side wins, no descendant stays usable.
    pub(crate) async fn assert_reuse_race_leaves_no_live_token(
        manager: RefreshTokenManager,
        user_id: &str,
    ) {
        let first = manager.issue(user_id, DEVICE).await.unwrap();
        let current = manager.rotate(&first.token, DEVICE).await.unwrap();

        let legit = {
            let manager = manager.clone();
            let token = current.refresh.token.clone();
            tokio::spawn(async move { manager.rotate(&token, DEVICE).await })
        };
        let replay = {
            let manager = manager.clone();
            let token = first.token.clone();
            tokio::spawn(async move { manager.rotate(&token, DEVICE).await })
        };

        assert!(replay.await.unwrap().is_err());
        if let Ok(next) = legit.await.unwrap() {
            assert!(matches!(
                manager.rotate(&next.refresh.token, DEVICE).await,
                Err(MobileAuthError::RefreshRejected)
            ));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reuse_racing_a_rotation_leaves_no_live_token() {
        for _ in 0..25 {
            assert_reuse_race_leaves_no_live_token(manager(), "u1").await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn nothing_survives_a_concurrent_revoke_all() {
        let manager = manager();
        let seeds: Vec<_> = join_all((0..8).map(|i| {
            let manager = manager.clone();
            async move { manager.issue("u1", &format!("device-{i:04}")).await.unwrap() }
        }))
        .await;

        let rotations = seeds.iter().enumerate().map(|(i, issued)| {
            let manager = manager.clone();
            let token = issued.token.clone();
            tokio::spawn(async move { manager.rotate(&token, &format!("device-{i:04}")).await })
        });
        let revoke = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.revoke_all_for_user("u1").await })
        };

        let rotated: Vec<_> = join_all(rotations)
            .await
            .into_iter()
            .filter_map(|joined| joined.ok().and_then(Result::ok))
            .collect();
        revoke.await.unwrap().unwrap();

        // Any replacement minted before the revoke was swept by it; any
        // rotation after it found its token already revoked.
        for replacement in rotated {
            assert!(
                manager
                    .rotate(&replacement.refresh.token, &replacement.device_id)
                    .await
                    .is_err()
            );
        }
    }
}

//! Persistence traits for mobile authentication.
//!
//! Implemented by [`PgMobileStore`](super::queries::PgMobileStore) and
//! [`MemoryMobileStore`](super::memory::MemoryMobileStore). The conditional
//! updates are part of the trait contract: callers rely on them for
//! single-use and rotation guarantees and never emulate them with a
//! read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::MobileAuthError;
use super::device::DeviceHeaders;
use crate::models::mobile::{ChallengeRecord, DeviceRecord, MobileUserAccount, RefreshTokenRecord};

/// Registered client installations.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<DeviceRecord>, MobileAuthError>;

    /// Insert the `(user_id, device_id)` pair or refresh its metadata and
    /// `last_seen_at`. The record id is stable across calls.
    async fn upsert_device(
        &self,
        user_id: &str,
        device: &DeviceHeaders,
    ) -> Result<DeviceRecord, MobileAuthError>;
}

/// Challenge nonces.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Persist a new challenge. Nonces are unique.
    async fn insert_challenge(&self, challenge: &ChallengeRecord) -> Result<(), MobileAuthError>;

    async fn find_challenge(&self, nonce: &str) -> Result<Option<ChallengeRecord>, MobileAuthError>;

    /// Set `used_at` only if it is still unset and the challenge has not
    /// expired at `used_at`. Returns whether this call won.
    async fn mark_challenge_used(
        &self,
        nonce: &str,
        used_at: DateTime<Utc>,
    ) -> Result<bool, MobileAuthError>;
}

/// Refresh token records.
///
/// Inserts, rotations and user-wide revocations for the same user are
/// serialized so a revoke-all cannot miss a token minted concurrently.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord)
    -> Result<(), MobileAuthError>;

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, MobileAuthError>;

    /// Revoke `current_id` (only if not yet revoked), link it to the
    /// replacement and insert the replacement, atomically. Returns `false`
    /// without inserting anything when the current token was already revoked.
    async fn rotate_refresh_token(
        &self,
        current_id: Uuid,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, MobileAuthError>;

    /// Revoke one token. Returns `false` if it was already revoked or unknown.
    async fn revoke_refresh_token(&self, token_id: Uuid) -> Result<bool, MobileAuthError>;

    /// Revoke every unrevoked token of the user in a rotation family,
    /// serialized with the user's rotations.
    async fn revoke_refresh_family(
        &self,
        user_id: &str,
        family_id: Uuid,
    ) -> Result<u64, MobileAuthError>;

    /// Revoke every unrevoked token of a user on one device.
    async fn revoke_device_refresh_tokens(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<u64, MobileAuthError>;

    /// Revoke every unrevoked token of a user.
    async fn revoke_all_refresh_tokens(&self, user_id: &str) -> Result<u64, MobileAuthError>;
}

/// Read access to user accounts owned by the wider HR application.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MobileUserAccount>, MobileAuthError>;

    async fn find_user_by_id(
        &self,
        user_id: &str,
    ) -> Result<Option<MobileUserAccount>, MobileAuthError>;
}

//! Mobile session flows: login, refresh, logout and challenges.

use std::sync::Arc;

use tracing::{info, warn};

use super::MobileAuthError;
use super::challenge::{ChallengeService, IssuedChallenge};
use super::config::MobileAuthConfig;
use super::device::{DeviceBinding, DeviceHeaders};
use super::gate::{DeviceBoundSession, MobileAuthGate};
use super::jwt::AccessTokenCodec;
use super::password::verify_password;
use super::refresh::{IssuedRefreshToken, RefreshTokenManager};
use super::store::{ChallengeStore, DeviceStore, RefreshTokenStore, UserDirectory};
use crate::models::mobile::{MobileUserAccount, TokenSubject};

/// The storage collaborators of [`MobileAuthService`].
#[derive(Clone)]
pub struct MobileStores {
    pub devices: Arc<dyn DeviceStore>,
    pub challenges: Arc<dyn ChallengeStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl MobileStores {
    /// Use one backend for every store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: DeviceStore + ChallengeStore + RefreshTokenStore + UserDirectory + 'static,
    {
        Self {
            devices: store.clone(),
            challenges: store.clone(),
            refresh_tokens: store.clone(),
            users: store,
        }
    }
}

/// Tokens handed to a client after login or refresh.
#[derive(Debug, Clone)]
pub struct MobileTokens {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub refresh: IssuedRefreshToken,
    pub subject: TokenSubject,
}

#[derive(Clone)]
pub struct MobileAuthService {
    codec: Arc<AccessTokenCodec>,
    gate: MobileAuthGate,
    devices: DeviceBinding,
    challenges: ChallengeService,
    refresh_tokens: RefreshTokenManager,
    users: Arc<dyn UserDirectory>,
}

impl MobileAuthService {
    /// Wire the components. Fails when the signing secret is missing.
    pub fn new(config: MobileAuthConfig, stores: MobileStores) -> Result<Self, MobileAuthError> {
        let codec = Arc::new(AccessTokenCodec::from_config(&config)?);
        Ok(Self {
            gate: MobileAuthGate::new(codec.clone()),
            devices: DeviceBinding::new(stores.devices),
            challenges: ChallengeService::new(stores.challenges, config.challenge_ttl),
            refresh_tokens: RefreshTokenManager::new(
                stores.refresh_tokens,
                config.refresh_token_ttl_secs,
            ),
            users: stores.users,
            codec,
        })
    }

    pub fn gate(&self) -> &MobileAuthGate {
        &self.gate
    }

    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    /// Authenticate with email and password from a declared device.
    ///
    /// Unknown users, accounts without a password and wrong passwords all
    /// fail with the same [`MobileAuthError::InvalidCredentials`].
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: &DeviceHeaders,
    ) -> Result<MobileTokens, MobileAuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(MobileAuthError::Validation(
                "email and password are required".into(),
            ));
        }

        let Some(user) = self.users.find_user_by_email(email).await? else {
            info!("mobile login for unknown email");
            return Err(MobileAuthError::InvalidCredentials);
        };
        let verified = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(password, hash));
        if !verified {
            info!(user_id = %user.id, "mobile login with wrong credentials");
            return Err(MobileAuthError::InvalidCredentials);
        }

        let record = self.devices.register_device(&user.id, device).await?;
        let refresh = self.refresh_tokens.issue(&user.id, &device.device_id).await?;
        let tokens = self.access_tokens(&user, &device.device_id, refresh)?;
        info!(user_id = %user.id, device = %record.id, "mobile login");
        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token and a rotated refresh
    /// token, from the device it was issued to.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        device: &DeviceHeaders,
    ) -> Result<MobileTokens, MobileAuthError> {
        let rotated = self
            .refresh_tokens
            .rotate(refresh_token, &device.device_id)
            .await?;

        let Some(user) = self.users.find_user_by_id(&rotated.user_id).await? else {
            warn!(user_id = %rotated.user_id, "refresh for a user that no longer exists");
            self.refresh_tokens
                .revoke_all_for_user(&rotated.user_id)
                .await?;
            return Err(MobileAuthError::RefreshRejected);
        };
        if let Err(e) = self
            .devices
            .resolve_device(&user.id, &device.device_id)
            .await
        {
            // The presented token is already spent; do not leave its
            // replacement alive without a holder.
            self.refresh_tokens.revoke(&rotated.refresh.token).await?;
            return Err(e);
        }

        self.access_tokens(&user, &device.device_id, rotated.refresh)
    }

    /// Revoke the presented refresh token. Unknown tokens are ignored.
    pub async fn logout(&self, refresh_token: &str) -> Result<bool, MobileAuthError> {
        self.refresh_tokens.revoke(refresh_token).await
    }

    /// Revoke every refresh token of the session's user on its device.
    pub async fn logout_device(&self, session: &DeviceBoundSession) -> Result<u64, MobileAuthError> {
        self.refresh_tokens
            .revoke_for_device(&session.claims.user_id, &session.device.device_id)
            .await
    }

    /// Revoke every refresh token of the user on every device.
    pub async fn logout_all(&self, user_id: &str) -> Result<u64, MobileAuthError> {
        self.refresh_tokens.revoke_all_for_user(user_id).await
    }

    /// Issue a challenge for the session's registered device.
    pub async fn create_challenge(
        &self,
        session: &DeviceBoundSession,
    ) -> Result<IssuedChallenge, MobileAuthError> {
        let record = self
            .devices
            .resolve_device(&session.claims.user_id, &session.device.device_id)
            .await?;
        self.challenges
            .create_challenge(&session.claims.user_id, record.id)
            .await
    }

    /// Consume a challenge issued to the session's device.
    ///
    /// An unregistered device is reported as a plain `false` like every other
    /// rejection.
    pub async fn verify_challenge(
        &self,
        session: &DeviceBoundSession,
        nonce: &str,
    ) -> Result<bool, MobileAuthError> {
        let record = match self
            .devices
            .resolve_device(&session.claims.user_id, &session.device.device_id)
            .await
        {
            Ok(record) => record,
            Err(MobileAuthError::DeviceNotRegistered) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.challenges
            .consume_challenge(nonce, &session.claims.user_id, record.id)
            .await
    }

    fn access_tokens(
        &self,
        user: &MobileUserAccount,
        device_id: &str,
        refresh: IssuedRefreshToken,
    ) -> Result<MobileTokens, MobileAuthError> {
        let subject = user.token_subject(device_id);
        let access_token = self.codec.issue_access_token(&subject)?;
        Ok(MobileTokens {
            access_token,
            expires_in: self.codec.default_ttl_secs(),
            refresh,
            subject,
        })
    }
}

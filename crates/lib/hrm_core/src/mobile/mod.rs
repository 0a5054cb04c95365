//! Mobile device-bound authentication.
//!
//! Access token codec, device binding, single-use challenges, refresh token
//! rotation and the request guards composed from them. Storage sits behind the
//! traits in [`store`] so the same logic runs on PostgreSQL and in memory.

pub mod challenge;
pub mod config;
pub mod device;
pub mod gate;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod refresh;
pub mod service;
pub mod store;

use thiserror::Error;

pub use challenge::{ChallengeService, IssuedChallenge};
pub use config::MobileAuthConfig;
pub use device::{DeviceBinding, DeviceHeaders, extract_device_headers};
pub use gate::{DeviceBoundSession, EmployeeSession, MobileAuthGate};
pub use jwt::AccessTokenCodec;
pub use memory::MemoryMobileStore;
pub use queries::PgMobileStore;
pub use refresh::{IssuedRefreshToken, RefreshTokenManager, RotatedRefreshToken};
pub use service::{MobileAuthService, MobileStores, MobileTokens};

/// Mobile authentication errors.
#[derive(Debug, Error)]
pub enum MobileAuthError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing device: {0}")]
    MissingDevice(String),

    #[error("Device does not match the token's bound device")]
    DeviceMismatch,

    #[error("Device is not registered for this user")]
    DeviceNotRegistered,

    #[error("Employee context required")]
    EmployeeContextRequired,

    #[error("Refresh token rejected")]
    RefreshRejected,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

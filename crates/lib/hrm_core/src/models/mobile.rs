//! Mobile authentication domain models.
//!
//! These are internal domain models, distinct from the API response bodies
//! in `hrm_api::models` (which carry their own camelCase renames).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity fields signed into a mobile access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSubject {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub role: String,
    pub employee_id: Option<String>,
    /// Client device identifier the token is bound to.
    pub device_id: Option<String>,
}

/// JWT claims embedded in mobile access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    pub user_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub role: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp, rounded up to the second).
    pub exp: i64,
    /// Expiry in unix milliseconds; authoritative when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_ms: Option<i64>,
}

impl AccessTokenClaims {
    /// The identity portion of the claims, without timestamps.
    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            user_id: self.user_id.clone(),
            tenant_id: self.tenant_id.clone(),
            role: self.role.clone(),
            employee_id: self.employee_id.clone(),
            device_id: self.device_id.clone(),
        }
    }
}

/// A registered client installation, keyed by `(user_id, device_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub user_id: String,
    pub device_id: String,
    pub platform: Option<String>,
    pub name: Option<String>,
    pub app_version: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Single-use proof-of-possession nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRecord {
    pub id: Uuid,
    pub nonce: String,
    pub user_id: String,
    /// Internal id of the owning [`DeviceRecord`].
    pub device_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Refresh token record stored in the database. Only the hash is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token_hash: String,
    /// Shared by every token descended from one login through rotation.
    pub family_id: Uuid,
    pub user_id: String,
    /// Client device identifier the token was issued to.
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Set when the token was consumed by rotation.
    pub replaced_by: Option<Uuid>,
}

/// User account as seen by the mobile login flow.
#[derive(Debug, Clone)]
pub struct MobileUserAccount {
    pub id: String,
    pub email: String,
    pub tenant_id: Option<String>,
    pub role: String,
    pub employee_id: Option<String>,
    pub password_hash: Option<String>,
}

impl MobileUserAccount {
    /// Token subject for this account bound to `device_id`.
    pub fn token_subject(&self, device_id: &str) -> TokenSubject {
        TokenSubject {
            user_id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            role: self.role.clone(),
            employee_id: self.employee_id.clone(),
            device_id: Some(device_id.to_string()),
        }
    }
}

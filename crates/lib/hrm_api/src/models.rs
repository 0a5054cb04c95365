//! Request and response bodies (camelCase JSON).

use chrono::{DateTime, Utc};
use hrm_core::mobile::DeviceHeaders;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Access token payload. The refresh token only travels in the cookie.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub refresh_expires_at: DateTime<Utc>,
    pub user: MobileUserInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileUserInfo {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub role: String,
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyChallengeRequest {
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyChallengeResponse {
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

/// Current session as seen by the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: MobileUserInfo,
    pub device_id: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Employee profile context for the calling device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: MobileUserInfo,
    pub employee_id: String,
    pub device: DeviceHeaders,
}

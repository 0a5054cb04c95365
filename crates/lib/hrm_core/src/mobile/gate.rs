//! Request guards for mobile endpoints.
//!
//! Each guard builds on the previous one: bearer verification, then the
//! declared device, then the employee context.

use std::sync::Arc;

use http::HeaderMap;
use http::header::AUTHORIZATION;

use super::MobileAuthError;
use super::device::{DeviceHeaders, ensure_device_matches, extract_device_headers};
use super::jwt::AccessTokenCodec;
use crate::models::mobile::AccessTokenClaims;

/// Verified claims plus the device the request declared.
#[derive(Debug, Clone)]
pub struct DeviceBoundSession {
    pub claims: AccessTokenClaims,
    pub device: DeviceHeaders,
}

/// A device-bound session that also carries an employee id.
#[derive(Debug, Clone)]
pub struct EmployeeSession {
    pub claims: AccessTokenClaims,
    pub device: DeviceHeaders,
    pub employee_id: String,
}

/// Extract the bearer token from `Authorization`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, MobileAuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MobileAuthError::Unauthorized("Missing authorization header".into()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| MobileAuthError::Unauthorized("Invalid authorization scheme".into()))
}

#[derive(Clone)]
pub struct MobileAuthGate {
    codec: Arc<AccessTokenCodec>,
}

impl MobileAuthGate {
    pub fn new(codec: Arc<AccessTokenCodec>) -> Self {
        Self { codec }
    }

    /// A valid bearer access token.
    pub fn require_mobile_auth(
        &self,
        headers: &HeaderMap,
    ) -> Result<AccessTokenClaims, MobileAuthError> {
        self.codec.verify_access_token(bearer_token(headers)?)
    }

    /// A valid token whose bound device is the one declared by `x-device-id`.
    pub fn require_mobile_auth_with_device(
        &self,
        headers: &HeaderMap,
    ) -> Result<DeviceBoundSession, MobileAuthError> {
        let claims = self.require_mobile_auth(headers)?;
        let device = extract_device_headers(headers)?;
        ensure_device_matches(&claims, &device)?;
        Ok(DeviceBoundSession { claims, device })
    }

    /// A device-bound token carrying an `employeeId`.
    pub fn require_mobile_employee_auth_with_device(
        &self,
        headers: &HeaderMap,
    ) -> Result<EmployeeSession, MobileAuthError> {
        let DeviceBoundSession { claims, device } = self.require_mobile_auth_with_device(headers)?;
        let employee_id = claims
            .employee_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(MobileAuthError::EmployeeContextRequired)?;
        Ok(EmployeeSession {
            claims,
            device,
            employee_id,
        })
    }
}

//! Device headers and the device registry binding.

use std::sync::Arc;

use http::HeaderMap;
use http::header::USER_AGENT;
use serde::Serialize;
use tracing::debug;

use super::MobileAuthError;
use super::store::DeviceStore;
use crate::models::mobile::{AccessTokenClaims, DeviceRecord};

pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const DEVICE_PLATFORM_HEADER: &str = "x-device-platform";
pub const DEVICE_NAME_HEADER: &str = "x-device-name";
pub const APP_VERSION_HEADER: &str = "x-app-version";

/// Inclusive bounds on the `x-device-id` length, in characters.
pub const DEVICE_ID_MIN_LEN: usize = 8;
pub const DEVICE_ID_MAX_LEN: usize = 200;

/// Optional metadata headers are clipped to this many characters.
const METADATA_MAX_LEN: usize = 200;

/// Device context declared by a mobile request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHeaders {
    pub device_id: String,
    pub platform: Option<String>,
    pub name: Option<String>,
    pub app_version: Option<String>,
    pub user_agent: Option<String>,
}

/// Read the device headers, requiring a well-formed `x-device-id`.
pub fn extract_device_headers(headers: &HeaderMap) -> Result<DeviceHeaders, MobileAuthError> {
    let device_id = headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .ok_or_else(|| MobileAuthError::MissingDevice("x-device-id header is required".into()))?;

    let len = device_id.chars().count();
    if !(DEVICE_ID_MIN_LEN..=DEVICE_ID_MAX_LEN).contains(&len) {
        return Err(MobileAuthError::MissingDevice(format!(
            "x-device-id must be {DEVICE_ID_MIN_LEN}-{DEVICE_ID_MAX_LEN} characters"
        )));
    }

    Ok(DeviceHeaders {
        device_id: device_id.to_string(),
        platform: optional_header(headers, DEVICE_PLATFORM_HEADER),
        name: optional_header(headers, DEVICE_NAME_HEADER),
        app_version: optional_header(headers, APP_VERSION_HEADER),
        user_agent: optional_header(headers, USER_AGENT.as_str()),
    })
}

fn optional_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(METADATA_MAX_LEN).collect())
}

/// Reject a request whose declared device differs from the token's bound device.
///
/// A token that carries no device binding never matches.
pub fn ensure_device_matches(
    claims: &AccessTokenClaims,
    device: &DeviceHeaders,
) -> Result<(), MobileAuthError> {
    match claims.device_id.as_deref() {
        Some(bound) if bound == device.device_id => Ok(()),
        _ => {
            debug!(user_id = %claims.user_id, "device mismatch");
            Err(MobileAuthError::DeviceMismatch)
        }
    }
}

/// Looks up and registers device records.
#[derive(Clone)]
pub struct DeviceBinding {
    store: Arc<dyn DeviceStore>,
}

impl DeviceBinding {
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self { store }
    }

    /// The registered record for `(user_id, device_id)`.
    pub async fn resolve_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<DeviceRecord, MobileAuthError> {
        self.store
            .find_device(user_id, device_id)
            .await?
            .ok_or(MobileAuthError::DeviceNotRegistered)
    }

    /// Register the device on first sight, otherwise refresh its metadata.
    pub async fn register_device(
        &self,
        user_id: &str,
        device: &DeviceHeaders,
    ) -> Result<DeviceRecord, MobileAuthError> {
        self.store.upsert_device(user_id, device).await
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;
    use crate::mobile::memory::MemoryMobileStore;

    fn headers_with_device(device_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_str(device_id).unwrap());
        headers
    }

    fn claims_bound_to(device_id: Option<&str>) -> AccessTokenClaims {
        AccessTokenClaims {
            user_id: "u1".into(),
            tenant_id: None,
            role: "EMPLOYEE".into(),
            employee_id: None,
            device_id: device_id.map(str::to_string),
            iat: 0,
            exp: 0,
            exp_ms: None,
        }
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(matches!(
            extract_device_headers(&HeaderMap::new()),
            Err(MobileAuthError::MissingDevice(_))
        ));
    }

    #[test]
    fn length_bounds_are_inclusive() {
        for len in [DEVICE_ID_MIN_LEN, DEVICE_ID_MAX_LEN] {
            let id = "d".repeat(len);
            let device = extract_device_headers(&headers_with_device(&id)).unwrap();
            assert_eq!(device.device_id, id);
        }
        for len in [0, 1, DEVICE_ID_MIN_LEN - 1, DEVICE_ID_MAX_LEN + 1, 1000] {
            let id = "d".repeat(len);
            assert!(
                matches!(
                    extract_device_headers(&headers_with_device(&id)),
                    Err(MobileAuthError::MissingDevice(_))
                ),
                "length {len} accepted"
            );
        }
    }

    #[test]
    fn reads_optional_metadata() {
        let mut headers = headers_with_device("device-0001");
        headers.insert(DEVICE_PLATFORM_HEADER, HeaderValue::from_static("android"));
        headers.insert(DEVICE_NAME_HEADER, HeaderValue::from_static("  Pixel 8 "));
        headers.insert(APP_VERSION_HEADER, HeaderValue::from_static(""));
        headers.insert(USER_AGENT, HeaderValue::from_static("hrm-mobile/2.1"));

        let device = extract_device_headers(&headers).unwrap();
        assert_eq!(device.platform.as_deref(), Some("android"));
        assert_eq!(device.name.as_deref(), Some("Pixel 8"));
        assert_eq!(device.app_version, None);
        assert_eq!(device.user_agent.as_deref(), Some("hrm-mobile/2.1"));
    }

    #[test]
    fn device_match_requires_bound_device() {
        let device = extract_device_headers(&headers_with_device("device-aaaa")).unwrap();
        assert!(ensure_device_matches(&claims_bound_to(Some("device-aaaa")), &device).is_ok());
        assert!(matches!(
            ensure_device_matches(&claims_bound_to(Some("device-bbbb")), &device),
            Err(MobileAuthError::DeviceMismatch)
        ));
        assert!(matches!(
            ensure_device_matches(&claims_bound_to(None), &device),
            Err(MobileAuthError::DeviceMismatch)
        ));
    }

    #[tokio::test]
    async fn register_then_resolve() {
        let binding = DeviceBinding::new(Arc::new(MemoryMobileStore::new()));
        let device = extract_device_headers(&headers_with_device("device-0001")).unwrap();

        assert!(matches!(
            binding.resolve_device("u1", "device-0001").await,
            Err(MobileAuthError::DeviceNotRegistered)
        ));

        let first = binding.register_device("u1", &device).await.unwrap();
        let again = binding.register_device("u1", &device).await.unwrap();
        assert_eq!(first.id, again.id);

        let resolved = binding.resolve_device("u1", "device-0001").await.unwrap();
        assert_eq!(resolved.id, first.id);

        // Same device id under another user is a different registration.
        assert!(binding.resolve_device("u2", "device-0001").await.is_err());
    }
}

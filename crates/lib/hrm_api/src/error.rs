//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hrm_core::mobile::MobileAuthError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Missing device: {0}")]
    MissingDevice(String),

    #[error("Device mismatch")]
    DeviceMismatch,

    #[error("Device not registered")]
    DeviceNotRegistered,

    #[error("Employee context required")]
    EmployeeContextRequired,

    #[error("Refresh rejected")]
    RefreshRejected,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Challenge rejected")]
    ChallengeRejected,

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::MissingDevice(m) => (StatusCode::BAD_REQUEST, "missing_device", m.as_str()),
            AppError::DeviceMismatch => (
                StatusCode::UNAUTHORIZED,
                "device_mismatch",
                "Token is not bound to this device",
            ),
            AppError::DeviceNotRegistered => (
                StatusCode::UNAUTHORIZED,
                "device_not_registered",
                "Device is not registered",
            ),
            AppError::EmployeeContextRequired => (
                StatusCode::BAD_REQUEST,
                "employee_context_required",
                "Employee context required",
            ),
            AppError::RefreshRejected => (
                StatusCode::UNAUTHORIZED,
                "refresh_rejected",
                "Refresh token is invalid or expired",
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid credentials",
            ),
            AppError::ChallengeRejected => (
                StatusCode::UNAUTHORIZED,
                "challenge_rejected",
                "Challenge rejected",
            ),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<MobileAuthError> for AppError {
    fn from(e: MobileAuthError) -> Self {
        match e {
            MobileAuthError::Unauthorized(msg) => AppError::Unauthorized(msg),
            // Verification detail stays in the logs.
            MobileAuthError::InvalidToken(_) => {
                AppError::Unauthorized("Invalid or expired token".into())
            }
            MobileAuthError::MissingDevice(msg) => AppError::MissingDevice(msg),
            MobileAuthError::DeviceMismatch => AppError::DeviceMismatch,
            MobileAuthError::DeviceNotRegistered => AppError::DeviceNotRegistered,
            MobileAuthError::EmployeeContextRequired => AppError::EmployeeContextRequired,
            MobileAuthError::RefreshRejected => AppError::RefreshRejected,
            MobileAuthError::InvalidCredentials => AppError::InvalidCredentials,
            MobileAuthError::Validation(msg) => AppError::Validation(msg),
            MobileAuthError::Configuration(msg) | MobileAuthError::Internal(msg) => {
                AppError::Internal(msg)
            }
            MobileAuthError::DbError(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (MobileAuthError::InvalidToken("bad sig".into()), StatusCode::UNAUTHORIZED),
            (MobileAuthError::MissingDevice("x".into()), StatusCode::BAD_REQUEST),
            (MobileAuthError::DeviceMismatch, StatusCode::UNAUTHORIZED),
            (MobileAuthError::EmployeeContextRequired, StatusCode::BAD_REQUEST),
            (MobileAuthError::RefreshRejected, StatusCode::UNAUTHORIZED),
            (MobileAuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (MobileAuthError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}

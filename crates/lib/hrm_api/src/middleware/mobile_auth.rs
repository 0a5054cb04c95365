//! Mobile auth guards as axum middleware.
//!
//! Each route group sits behind exactly one guard. A guard failure becomes the
//! response unchanged; on success the verified context is put into request
//! extensions for the handler.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hrm_core::models::mobile::AccessTokenClaims;

use crate::AppState;
use crate::error::AppError;

/// Verified access token claims in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedMobileUser(pub AccessTokenClaims);

/// Requires a valid bearer access token.
pub async fn require_mobile_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = state.mobile.gate().require_mobile_auth(request.headers())?;
    request
        .extensions_mut()
        .insert(AuthenticatedMobileUser(claims));
    Ok(next.run(request).await)
}

/// Requires a valid token bound to the device declared in `x-device-id`.
pub async fn require_mobile_auth_with_device(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = state
        .mobile
        .gate()
        .require_mobile_auth_with_device(request.headers())?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Requires a device-bound token carrying an employee id.
pub async fn require_mobile_employee_auth_with_device(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = state
        .mobile
        .gate()
        .require_mobile_employee_auth_with_device(request.headers())?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

//! Session introspection handlers.

use axum::Json;
use hrm_core::mobile::EmployeeSession;
use hrm_core::models::mobile::AccessTokenClaims;

use crate::error::AppResult;
use crate::middleware::mobile_auth::AuthenticatedMobileUser;
use crate::models::{MeResponse, MobileUserInfo, SessionResponse};

fn user_info(claims: &AccessTokenClaims) -> MobileUserInfo {
    MobileUserInfo {
        user_id: claims.user_id.clone(),
        tenant_id: claims.tenant_id.clone(),
        role: claims.role.clone(),
        employee_id: claims.employee_id.clone(),
    }
}

/// `GET /api/mobile/session`: claims of the presented access token.
pub async fn session_handler(
    axum::Extension(user): axum::Extension<AuthenticatedMobileUser>,
) -> AppResult<Json<SessionResponse>> {
    let claims = user.0;
    Ok(Json(SessionResponse {
        user: user_info(&claims),
        device_id: claims.device_id,
        issued_at: claims.iat,
        expires_at: claims.exp,
    }))
}

/// `GET /api/mobile/me`: employee context for the calling device.
pub async fn me_handler(
    axum::Extension(session): axum::Extension<EmployeeSession>,
) -> AppResult<Json<MeResponse>> {
    Ok(Json(MeResponse {
        user: user_info(&session.claims),
        employee_id: session.employee_id,
        device: session.device,
    }))
}

//! Mobile authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use hrm_core::mobile::{DeviceBoundSession, MobileTokens, extract_device_headers};
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    ChallengeResponse, LoginRequest, LogoutAllResponse, LogoutResponse, MobileUserInfo,
    TokenResponse, VerifyChallengeRequest, VerifyChallengeResponse,
};
use crate::services::cookies::{REFRESH_COOKIE, clear_refresh_cookie, refresh_cookie};

fn token_response(tokens: MobileTokens) -> TokenResponse {
    TokenResponse {
        access_token: tokens.access_token,
        token_type: "Bearer",
        expires_in: tokens.expires_in,
        refresh_expires_at: tokens.refresh.expires_at,
        user: MobileUserInfo {
            user_id: tokens.subject.user_id,
            tenant_id: tokens.subject.tenant_id,
            role: tokens.subject.role,
            employee_id: tokens.subject.employee_id,
        },
    }
}

fn with_refresh_cookie(
    state: &AppState,
    jar: CookieJar,
    tokens: MobileTokens,
) -> (CookieJar, Json<TokenResponse>) {
    let secure = state.config.mobile.secure_cookies;
    let jar = jar.add(refresh_cookie(
        &tokens.refresh.token,
        tokens.refresh.expires_at,
        secure,
    ));
    (jar, Json(token_response(tokens)))
}

/// `POST /api/mobile/auth/login`: email + password from a declared device.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let device = extract_device_headers(&headers)?;
    let tokens = state
        .mobile
        .login(&body.email, &body.password, &device)
        .await?;
    Ok(with_refresh_cookie(&state, jar, tokens))
}

/// `POST /api/mobile/auth/refresh`: rotate the cookie's refresh token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let device = extract_device_headers(&headers)?;
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::RefreshRejected)?;

    let tokens = state.mobile.refresh(&token, &device).await?;
    Ok(with_refresh_cookie(&state, jar, tokens))
}

/// `POST /api/mobile/auth/logout`: revoke the cookie's refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutResponse>)> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        state.mobile.logout(cookie.value()).await?;
    }
    let jar = jar.add(clear_refresh_cookie(state.config.mobile.secure_cookies));
    Ok((jar, Json(LogoutResponse { success: true })))
}

/// `POST /api/mobile/auth/logout-device`: revoke this device's refresh tokens.
pub async fn logout_device_handler(
    State(state): State<AppState>,
    axum::Extension(session): axum::Extension<DeviceBoundSession>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutAllResponse>)> {
    let revoked = state.mobile.logout_device(&session).await?;
    let jar = jar.add(clear_refresh_cookie(state.config.mobile.secure_cookies));
    Ok((jar, Json(LogoutAllResponse { revoked })))
}

/// `POST /api/mobile/auth/logout-all`: revoke every refresh token of the user.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    axum::Extension(session): axum::Extension<DeviceBoundSession>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutAllResponse>)> {
    let revoked = state.mobile.logout_all(&session.claims.user_id).await?;
    info!(user_id = %session.claims.user_id, revoked, "mobile logout everywhere");
    let jar = jar.add(clear_refresh_cookie(state.config.mobile.secure_cookies));
    Ok((jar, Json(LogoutAllResponse { revoked })))
}

/// `POST /api/mobile/auth/challenge`: issue a nonce for this device.
pub async fn create_challenge_handler(
    State(state): State<AppState>,
    axum::Extension(session): axum::Extension<DeviceBoundSession>,
) -> AppResult<Json<ChallengeResponse>> {
    let issued = state.mobile.create_challenge(&session).await?;
    Ok(Json(ChallengeResponse {
        nonce: issued.nonce,
        expires_at: issued.expires_at,
    }))
}

/// `POST /api/mobile/auth/challenge/verify`: consume a nonce.
///
/// Every rejection reads the same to the client.
pub async fn verify_challenge_handler(
    State(state): State<AppState>,
    axum::Extension(session): axum::Extension<DeviceBoundSession>,
    Json(body): Json<VerifyChallengeRequest>,
) -> AppResult<Json<VerifyChallengeResponse>> {
    if !state
        .mobile
        .verify_challenge(&session, &body.nonce)
        .await?
    {
        return Err(AppError::ChallengeRejected);
    }
    Ok(Json(VerifyChallengeResponse { verified: true }))
}

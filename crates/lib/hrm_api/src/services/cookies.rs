//! Refresh token cookie.
//!
//! The refresh token never appears in a JSON body. It lives in an httpOnly,
//! SameSite=Strict cookie scoped to the mobile auth routes.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use time::Duration;

use crate::routes::MOBILE_AUTH_PREFIX;

/// Cookie name for the mobile refresh token.
pub const REFRESH_COOKIE: &str = "hrm_mobile_refresh";

/// Build the refresh cookie, expiring together with the token.
pub fn refresh_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    Cookie::build((REFRESH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(MOBILE_AUTH_PREFIX.to_string())
        .max_age(Duration::seconds(max_age))
        .build()
}

/// Build an expired refresh cookie to clear it on the client.
pub fn clear_refresh_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE.to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(MOBILE_AUTH_PREFIX.to_string())
        .max_age(Duration::ZERO)
        .build()
}

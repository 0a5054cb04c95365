//! Mobile authentication configuration.
//!
//! Built once at startup and shared read-only. Nothing in the mobile module
//! reads the environment after construction.

use std::fmt;
use std::time::Duration;

use tracing::warn;

use super::MobileAuthError;

/// Access token lifetime: 8 hours.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 8 * 60 * 60;

/// Refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Challenge nonce lifetime: 2 minutes.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(120);

/// Configuration for mobile authentication.
#[derive(Clone)]
pub struct MobileAuthConfig {
    /// HS256 signing secret for access tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl_secs: u64,
    /// Challenge nonce lifetime.
    pub challenge_ttl: Duration,
    /// Mark the refresh cookie `Secure`.
    pub secure_cookies: bool,
}

impl MobileAuthConfig {
    /// Config with the given secret and default lifetimes.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
            secure_cookies: false,
        }
    }

    /// Reads configuration from the process environment.
    ///
    /// | Variable                            | Default                  |
    /// |-------------------------------------|--------------------------|
    /// | `MOBILE_JWT_SECRET` / `JWT_SECRET`  | required                 |
    /// | `MOBILE_ACCESS_TOKEN_TTL_SECONDS`   | `28800`                  |
    /// | `MOBILE_REFRESH_TOKEN_TTL_SECONDS`  | `2592000`                |
    /// | `MOBILE_CHALLENGE_TTL_SECONDS`      | `120`                    |
    /// | `APP_ENV`                           | secure cookies when `production` |
    pub fn from_env() -> Result<Self, MobileAuthError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, MobileAuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = ["MOBILE_JWT_SECRET", "JWT_SECRET"]
            .iter()
            .filter_map(|key| lookup(key))
            .find(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                MobileAuthError::Configuration(
                    "MOBILE_JWT_SECRET (or JWT_SECRET) must be set".into(),
                )
            })?;

        Ok(Self {
            jwt_secret,
            access_token_ttl_secs: parse_secs(
                "MOBILE_ACCESS_TOKEN_TTL_SECONDS",
                lookup("MOBILE_ACCESS_TOKEN_TTL_SECONDS"),
                DEFAULT_ACCESS_TOKEN_TTL_SECS,
            ),
            refresh_token_ttl_secs: parse_secs(
                "MOBILE_REFRESH_TOKEN_TTL_SECONDS",
                lookup("MOBILE_REFRESH_TOKEN_TTL_SECONDS"),
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            ),
            challenge_ttl: resolve_challenge_ttl(
                lookup("MOBILE_CHALLENGE_TTL_SECONDS").as_deref(),
            ),
            secure_cookies: lookup("APP_ENV")
                .is_some_and(|env| env.eq_ignore_ascii_case("production")),
        })
    }
}

impl fmt::Debug for MobileAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MobileAuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("challenge_ttl", &self.challenge_ttl)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

/// Parse the challenge TTL in (possibly fractional) seconds.
///
/// Anything that is not a positive finite number falls back to
/// [`DEFAULT_CHALLENGE_TTL`].
pub fn resolve_challenge_ttl(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_CHALLENGE_TTL;
    };
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => {
            Duration::try_from_secs_f64(secs).unwrap_or(DEFAULT_CHALLENGE_TTL)
        }
        _ => {
            warn!(value = raw, "invalid challenge TTL, using default");
            DEFAULT_CHALLENGE_TTL
        }
    }
}

fn parse_secs(key: &str, raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => {
            warn!(key, value = %raw, "invalid lifetime, using default");
            default
        }
    }
}

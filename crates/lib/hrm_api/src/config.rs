//! API server configuration.

use hrm_core::mobile::{MobileAuthConfig, MobileAuthError};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3100";
const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/hrm";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Mobile authentication settings.
    pub mobile: MobileAuthConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable       | Default                          |
    /// |----------------|----------------------------------|
    /// | `BIND_ADDR`    | `127.0.0.1:3100`                 |
    /// | `DATABASE_URL` | `postgres://localhost:5432/hrm`  |
    ///
    /// Mobile settings come from [`MobileAuthConfig::from_env`]; a missing
    /// signing secret is an error.
    pub fn from_env() -> Result<Self, MobileAuthError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, MobileAuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            pg_connection_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            mobile: MobileAuthConfig::from_vars(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ApiConfig::from_vars(lookup(&[("MOBILE_JWT_SECRET", "s")])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.pg_connection_url, DEFAULT_DATABASE_URL);
        assert!(!config.mobile.secure_cookies);
    }

    #[test]
    fn reads_server_and_mobile_settings() {
        let config = ApiConfig::from_vars(lookup(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://db:5432/hrm_prod"),
            ("MOBILE_JWT_SECRET", "s"),
            ("APP_ENV", "production"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.pg_connection_url, "postgres://db:5432/hrm_prod");
        assert!(config.mobile.secure_cookies);
    }

    #[test]
    fn missing_secret_fails() {
        assert!(matches!(
            ApiConfig::from_vars(lookup(&[("BIND_ADDR", "0.0.0.0:8080")])),
            Err(MobileAuthError::Configuration(_))
        ));
    }
}

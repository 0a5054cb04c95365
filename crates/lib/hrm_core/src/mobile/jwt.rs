//! Mobile access token issuance and verification (HS256).

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::MobileAuthError;
use super::config::{DEFAULT_ACCESS_TOKEN_TTL_SECS, MobileAuthConfig};
use crate::models::mobile::{AccessTokenClaims, TokenSubject};

/// The only algorithm accepted on verification.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Signs and verifies mobile access tokens with a process-wide secret.
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    default_ttl_secs: u64,
}

impl AccessTokenCodec {
    /// Build a codec from a signing secret.
    ///
    /// An absent secret is a deployment error, so this fails here rather than
    /// on the first request.
    pub fn new(secret: &str) -> Result<Self, MobileAuthError> {
        if secret.trim().is_empty() {
            return Err(MobileAuthError::Configuration(
                "access token signing secret is not set".into(),
            ));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
        })
    }

    pub fn from_config(config: &MobileAuthConfig) -> Result<Self, MobileAuthError> {
        Ok(Self::new(&config.jwt_secret)?.with_default_ttl(config.access_token_ttl_secs))
    }

    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    /// Lifetime applied by [`issue_access_token`](Self::issue_access_token).
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Sign an access token with the default lifetime.
    pub fn issue_access_token(&self, subject: &TokenSubject) -> Result<String, MobileAuthError> {
        self.issue_access_token_with_ttl(subject, self.default_ttl_secs)
    }

    /// Sign an access token valid for `ttl_secs` from now.
    pub fn issue_access_token_with_ttl(
        &self,
        subject: &TokenSubject,
        ttl_secs: u64,
    ) -> Result<String, MobileAuthError> {
        if subject.user_id.trim().is_empty() || subject.role.trim().is_empty() {
            return Err(MobileAuthError::Validation(
                "access token requires a user id and a role".into(),
            ));
        }
        let ttl = i64::try_from(ttl_secs)
            .map_err(|_| MobileAuthError::Validation("access token TTL out of range".into()))?;

        let now_ms = Utc::now().timestamp_millis();
        let exp_ms = now_ms.saturating_add(ttl.saturating_mul(1000));
        let claims = AccessTokenClaims {
            user_id: subject.user_id.clone(),
            tenant_id: subject.tenant_id.clone(),
            role: subject.role.clone(),
            employee_id: subject.employee_id.clone(),
            device_id: subject.device_id.clone(),
            iat: now_ms.div_euclid(1000),
            // Rounded up so the registered `exp` never cuts the window short.
            exp: exp_ms.div_euclid(1000) + i64::from(exp_ms.rem_euclid(1000) > 0),
            exp_ms: Some(exp_ms),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| MobileAuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature, algorithm and expiry, returning the claims.
    ///
    /// A token is expired from the millisecond its `expMs` is reached, or from
    /// the second its `exp` is reached when it carries no `expMs`. Claims with a
    /// missing, non-string or empty `userId` / `role` are rejected even when
    /// the signature is valid.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, MobileAuthError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;

        let claims = decode::<AccessTokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => MobileAuthError::InvalidToken("token expired".into()),
                _ => MobileAuthError::InvalidToken(e.to_string()),
            })?;

        let expires_at_ms = claims
            .exp_ms
            .map_or(claims.exp.saturating_mul(1000), |ms| {
                ms.min(claims.exp.saturating_mul(1000))
            });
        if expires_at_ms <= Utc::now().timestamp_millis() {
            return Err(MobileAuthError::InvalidToken("token expired".into()));
        }
        if claims.user_id.trim().is_empty() || claims.role.trim().is_empty() {
            return Err(MobileAuthError::InvalidToken("missing required claims".into()));
        }
        Ok(claims)
    }
}

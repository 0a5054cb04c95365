//! Mobile auth database queries (PostgreSQL).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::MobileAuthError;
use super::device::DeviceHeaders;
use super::store::{ChallengeStore, DeviceStore, RefreshTokenStore, UserDirectory};
use crate::models::mobile::{ChallengeRecord, DeviceRecord, MobileUserAccount, RefreshTokenRecord};
use crate::uuid::uuidv7;

type DeviceRow = (
    Uuid,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type ChallengeRow = (
    Uuid,
    String,
    String,
    Uuid,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

type RefreshTokenRow = (
    Uuid,
    String,
    Uuid,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<Uuid>,
);

type UserRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
);

const DEVICE_COLUMNS: &str = "id, user_id::text, device_id, platform, name, app_version, \
     user_agent, created_at, last_seen_at";

const REFRESH_TOKEN_COLUMNS: &str = "id, token_hash, family_id, user_id::text, device_id, \
     created_at, expires_at, revoked_at, replaced_by";

const USER_SELECT: &str = "SELECT u.id::text, u.email, u.tenant_id::text, u.role, e.id::text, \
     u.password_hash \
     FROM users u \
     LEFT JOIN employees e ON e.user_id = u.id";

fn device_from_row(row: DeviceRow) -> DeviceRecord {
    let (id, user_id, device_id, platform, name, app_version, user_agent, created_at, last_seen_at) =
        row;
    DeviceRecord {
        id,
        user_id,
        device_id,
        platform,
        name,
        app_version,
        user_agent,
        created_at,
        last_seen_at,
    }
}

fn challenge_from_row(row: ChallengeRow) -> ChallengeRecord {
    let (id, nonce, user_id, device_id, expires_at, used_at, created_at) = row;
    ChallengeRecord {
        id,
        nonce,
        user_id,
        device_id,
        expires_at,
        used_at,
        created_at,
    }
}

fn refresh_token_from_row(row: RefreshTokenRow) -> RefreshTokenRecord {
    let (
        id,
        token_hash,
        family_id,
        user_id,
        device_id,
        created_at,
        expires_at,
        revoked_at,
        replaced_by,
    ) = row;
    RefreshTokenRecord {
        id,
        token_hash,
        family_id,
        user_id,
        device_id,
        created_at,
        expires_at,
        revoked_at,
        replaced_by,
    }
}

fn user_from_row(row: UserRow) -> MobileUserAccount {
    let (id, email, tenant_id, role, employee_id, password_hash) = row;
    MobileUserAccount {
        id,
        email,
        tenant_id,
        role,
        employee_id,
        password_hash,
    }
}

/// Serialize refresh token writes for one user until the transaction ends.
async fn lock_user_tokens(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
) -> Result<(), MobileAuthError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// PostgreSQL-backed mobile auth store.
#[derive(Clone)]
pub struct PgMobileStore {
    pool: PgPool,
}

impl PgMobileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceStore for PgMobileStore {
    async fn find_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<DeviceRecord>, MobileAuthError> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM mobile_devices \
             WHERE user_id = $1::uuid AND device_id = $2"
        ))
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(device_from_row))
    }

    async fn upsert_device(
        &self,
        user_id: &str,
        device: &DeviceHeaders,
    ) -> Result<DeviceRecord, MobileAuthError> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            "INSERT INTO mobile_devices \
               (id, user_id, device_id, platform, name, app_version, user_agent) \
             VALUES ($1, $2::uuid, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, device_id) DO UPDATE SET \
               platform = COALESCE(EXCLUDED.platform, mobile_devices.platform), \
               name = COALESCE(EXCLUDED.name, mobile_devices.name), \
               app_version = COALESCE(EXCLUDED.app_version, mobile_devices.app_version), \
               user_agent = COALESCE(EXCLUDED.user_agent, mobile_devices.user_agent), \
               last_seen_at = now() \
             RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(user_id)
        .bind(&device.device_id)
        .bind(&device.platform)
        .bind(&device.name)
        .bind(&device.app_version)
        .bind(&device.user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(device_from_row(row))
    }
}

#[async_trait]
impl ChallengeStore for PgMobileStore {
    async fn insert_challenge(&self, challenge: &ChallengeRecord) -> Result<(), MobileAuthError> {
        sqlx::query(
            "INSERT INTO mobile_challenges (id, nonce, user_id, device_id, expires_at, created_at) \
             VALUES ($1, $2, $3::uuid, $4, $5, $6)",
        )
        .bind(challenge.id)
        .bind(&challenge.nonce)
        .bind(&challenge.user_id)
        .bind(challenge.device_id)
        .bind(challenge.expires_at)
        .bind(challenge.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_challenge(&self, nonce: &str) -> Result<Option<ChallengeRecord>, MobileAuthError> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            "SELECT id, nonce, user_id::text, device_id, expires_at, used_at, created_at \
             FROM mobile_challenges WHERE nonce = $1",
        )
        .bind(nonce)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(challenge_from_row))
    }

    async fn mark_challenge_used(
        &self,
        nonce: &str,
        used_at: DateTime<Utc>,
    ) -> Result<bool, MobileAuthError> {
        let result = sqlx::query(
            "UPDATE mobile_challenges SET used_at = $2 \
             WHERE nonce = $1 AND used_at IS NULL AND expires_at > $2",
        )
        .bind(nonce)
        .bind(used_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl RefreshTokenStore for PgMobileStore {
    async fn insert_refresh_token(
        &self,
        record: &RefreshTokenRecord,
    ) -> Result<(), MobileAuthError> {
        let mut tx = self.pool.begin().await?;
        lock_user_tokens(&mut tx, &record.user_id).await?;
        insert_refresh_token_row(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, MobileAuthError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(&format!(
            "SELECT {REFRESH_TOKEN_COLUMNS} FROM mobile_refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(refresh_token_from_row))
    }

    async fn rotate_refresh_token(
        &self,
        current_id: Uuid,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, MobileAuthError> {
        let mut tx = self.pool.begin().await?;
        lock_user_tokens(&mut tx, &replacement.user_id).await?;

        let revoked = sqlx::query(
            "UPDATE mobile_refresh_tokens SET revoked_at = $2, replaced_by = $3 \
             WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(current_id)
        .bind(replacement.created_at)
        .bind(replacement.id)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_refresh_token_row(&mut tx, replacement).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_refresh_token(&self, token_id: Uuid) -> Result<bool, MobileAuthError> {
        let result = sqlx::query(
            "UPDATE mobile_refresh_tokens SET revoked_at = now() \
             WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_refresh_family(
        &self,
        user_id: &str,
        family_id: Uuid,
    ) -> Result<u64, MobileAuthError> {
        // Under the lock the UPDATE snapshot includes any replacement a
        // concurrent rotation just committed.
        let mut tx = self.pool.begin().await?;
        lock_user_tokens(&mut tx, user_id).await?;
        let result = sqlx::query(
            "UPDATE mobile_refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1::uuid AND family_id = $2 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(family_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn revoke_device_refresh_tokens(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<u64, MobileAuthError> {
        let mut tx = self.pool.begin().await?;
        lock_user_tokens(&mut tx, user_id).await?;
        let result = sqlx::query(
            "UPDATE mobile_refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1::uuid AND device_id = $2 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(device_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_refresh_tokens(&self, user_id: &str) -> Result<u64, MobileAuthError> {
        let mut tx = self.pool.begin().await?;
        lock_user_tokens(&mut tx, user_id).await?;
        let result = sqlx::query(
            "UPDATE mobile_refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1::uuid AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

async fn insert_refresh_token_row(
    tx: &mut Transaction<'_, Postgres>,
    record: &RefreshTokenRecord,
) -> Result<(), MobileAuthError> {
    sqlx::query(
        "INSERT INTO mobile_refresh_tokens \
           (id, token_hash, family_id, user_id, device_id, created_at, expires_at) \
         VALUES ($1, $2, $3, $4::uuid, $5, $6, $7)",
    )
    .bind(record.id)
    .bind(&record.token_hash)
    .bind(record.family_id)
    .bind(&record.user_id)
    .bind(&record.device_id)
    .bind(record.created_at)
    .bind(record.expires_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl UserDirectory for PgMobileStore {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<MobileUserAccount>, MobileAuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{USER_SELECT} WHERE lower(u.email) = lower($1)"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_user_by_id(
        &self,
        user_id: &str,
    ) -> Result<Option<MobileUserAccount>, MobileAuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.id = $1::uuid"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(user_from_row))
    }
}

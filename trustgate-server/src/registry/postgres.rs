//! PostgreSQL device registry backend
//!
//! Persistent storage for trusted-device records. Every statement filters by
//! `(owner_id, owner_type)` in addition to the record id, so ownership is
//! enforced in the same conditional update that performs the mutation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trustgate_core::{DeviceEnrollment, OwnerType, TrustedDevice};
use uuid::Uuid;

use super::{RegistryStats, StorageError};

const DEVICE_COLUMNS: &str = "id, owner_id, owner_type, device_fingerprint, device_name, \
     device_info, is_shared_device, expires_at, last_used, revoked, revoked_at, created_at";

/// PostgreSQL-backed device registry
pub struct PostgresDeviceStore {
    pool: PgPool,
}

impl PostgresDeviceStore {
    /// Create a new PostgreSQL device registry
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Check database connection health
    pub async fn check_health(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    pub async fn register(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        enrollment: &DeviceEnrollment,
    ) -> Result<TrustedDevice, StorageError> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            INSERT INTO trusted_devices
                (id, owner_id, owner_type, device_fingerprint, device_name,
                 device_info, is_shared_device, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW() + make_interval(days => $7::int))
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(owner_type.as_str())
        .bind(enrollment.fingerprint())
        .bind(enrollment.name())
        .bind(enrollment.info())
        .bind(enrollment.trust_duration_days() as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.into_device()
    }

    pub async fn find_active(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        fingerprint: &str,
    ) -> Result<Option<TrustedDevice>, StorageError> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            SELECT {DEVICE_COLUMNS}
            FROM trusted_devices
            WHERE owner_id = $1 AND owner_type = $2 AND device_fingerprint = $3
              AND revoked = FALSE AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(owner_id)
        .bind(owner_type.as_str())
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(DeviceRow::into_device).transpose()
    }

    pub async fn touch_last_used(&self, device_id: Uuid) -> Result<(), StorageError> {
        sqlx::query("UPDATE trusted_devices SET last_used = NOW() WHERE id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        include_revoked: bool,
    ) -> Result<Vec<TrustedDevice>, StorageError> {
        let rows = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            SELECT {DEVICE_COLUMNS}
            FROM trusted_devices
            WHERE owner_id = $1 AND owner_type = $2 AND ($3 OR revoked = FALSE)
            ORDER BY created_at DESC
            "#
        ))
        .bind(owner_id)
        .bind(owner_type.as_str())
        .bind(include_revoked)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.into_iter().map(DeviceRow::into_device).collect()
    }

    pub async fn revoke(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE trusted_devices
            SET revoked = TRUE, revoked_at = NOW()
            WHERE id = $1 AND owner_id = $2 AND owner_type = $3 AND revoked = FALSE
            "#,
        )
        .bind(device_id)
        .bind(owner_id)
        .bind(owner_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_all(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE trusted_devices
            SET revoked = TRUE, revoked_at = NOW()
            WHERE owner_id = $1 AND owner_type = $2 AND revoked = FALSE
            "#,
        )
        .bind(owner_id)
        .bind(owner_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    pub async fn extend(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
        additional_days: i64,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        // Extension is relative to the stored expiry, not to NOW().
        sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE trusted_devices
            SET expires_at = expires_at + make_interval(days => $4::int)
            WHERE id = $1 AND owner_id = $2 AND owner_type = $3 AND revoked = FALSE
            RETURNING expires_at
            "#,
        )
        .bind(device_id)
        .bind(owner_id)
        .bind(owner_type.as_str())
        .bind(additional_days as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))
    }

    pub async fn rename(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
        new_name: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE trusted_devices
            SET device_name = $4
            WHERE id = $1 AND owner_id = $2 AND owner_type = $3
            "#,
        )
        .bind(device_id)
        .bind(owner_id)
        .bind(owner_type.as_str())
        .bind(new_name)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(&self) -> Result<RegistryStats, StorageError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE NOT revoked AND expires_at > NOW()) AS active,
                COUNT(*) FILTER (WHERE revoked) AS revoked,
                COUNT(*) FILTER (WHERE NOT revoked AND expires_at <= NOW()) AS expired,
                COUNT(*) FILTER (WHERE is_shared_device) AS shared_flagged
            FROM trusted_devices
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(RegistryStats {
            total: row.total as u64,
            active: row.active as u64,
            revoked: row.revoked as u64,
            expired: row.expired as u64,
            shared_flagged: row.shared_flagged as u64,
            persistent: true,
        })
    }
}

/// Database row for trusted devices
#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: Uuid,
    owner_id: String,
    owner_type: String,
    device_fingerprint: String,
    device_name: String,
    device_info: String,
    is_shared_device: bool,
    expires_at: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DeviceRow {
    fn into_device(self) -> Result<TrustedDevice, StorageError> {
        // An unknown owner_type is a data corruption signal, not a fallback
        // case: defaulting to either namespace would cross tenants.
        let owner_type: OwnerType = self
            .owner_type
            .parse()
            .map_err(|e| StorageError::Query(format!("corrupt owner_type column: {e}")))?;

        Ok(TrustedDevice {
            id: self.id,
            owner_id: self.owner_id,
            owner_type,
            device_fingerprint: self.device_fingerprint,
            device_name: self.device_name,
            device_info: self.device_info,
            is_shared_device: self.is_shared_device,
            expires_at: self.expires_at,
            last_used: self.last_used,
            revoked: self.revoked,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total: i64,
    active: i64,
    revoked: i64,
    expired: i64,
    shared_flagged: i64,
}

impl std::fmt::Debug for PostgresDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDeviceStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}

//! Device registry module
//!
//! Durable storage and retrieval of trusted-device records, always scoped by
//! `(owner_id, owner_type)` so one principal can never read or mutate
//! another's trust state.
//!
//! Two backends:
//! - **PostgreSQL** (production): persistent, single conditional statements
//!   keyed by id + owner, so concurrent mutations resolve on the storage
//!   layer's row-level atomicity.
//! - **In-memory** (development/tests): `DashMap`-backed, selected when
//!   `DATABASE_URL` is not set. Records are lost on restart.

mod memory;
mod postgres;

pub use memory::MemoryDeviceStore;
pub use postgres::PostgresDeviceStore;

use chrono::{DateTime, Utc};
use trustgate_core::{DeviceEnrollment, OwnerType, TrustedDevice};
use uuid::Uuid;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("database migration error: {0}")]
    Migration(String),

    #[error("query error: {0}")]
    Query(String),
}

/// Registry backend selection
enum RegistryBackend {
    /// PostgreSQL storage (production)
    Postgres(PostgresDeviceStore),
    /// In-memory storage (development fallback)
    Memory(MemoryDeviceStore),
}

/// The device registry over either backend.
pub struct DeviceStore {
    backend: RegistryBackend,
}

impl DeviceStore {
    /// Create a registry with a PostgreSQL backend and run migrations
    pub async fn with_postgres(database_url: &str) -> Result<Self, StorageError> {
        let store = PostgresDeviceStore::new(database_url).await?;
        store.migrate().await?;

        Ok(Self {
            backend: RegistryBackend::Postgres(store),
        })
    }

    /// Create a registry with an in-memory backend (development only)
    pub fn in_memory() -> Self {
        tracing::warn!("Using in-memory device registry - trust records will be lost on restart!");
        Self {
            backend: RegistryBackend::Memory(MemoryDeviceStore::new()),
        }
    }

    /// Create a registry from configuration
    ///
    /// Uses PostgreSQL when a database URL is provided, otherwise falls back
    /// to in-memory storage.
    pub async fn from_config(database_url: Option<&str>) -> Result<Self, StorageError> {
        match database_url {
            Some(url) if !url.is_empty() => {
                tracing::info!("Using PostgreSQL device registry");
                Self::with_postgres(url).await
            }
            _ => {
                tracing::warn!("DATABASE_URL not set, using in-memory device registry");
                Ok(Self::in_memory())
            }
        }
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, RegistryBackend::Postgres(_))
    }

    /// Check storage health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => pg.check_health().await,
            RegistryBackend::Memory(_) => Ok(()),
        }
    }

    /// Register a new trusted device for an owner.
    ///
    /// The enrollment has already rejected shared devices and invalid input;
    /// the registry computes the absolute expiry at write time.
    pub async fn register(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        enrollment: &DeviceEnrollment,
    ) -> Result<TrustedDevice, StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => pg.register(owner_id, owner_type, enrollment).await,
            RegistryBackend::Memory(mem) => Ok(mem.register(owner_id, owner_type, enrollment)),
        }
    }

    /// Find the newest active (non-revoked, non-expired) record for a
    /// fingerprint. Shared-flagged records are returned, not filtered: the
    /// risk evaluator must see them to defend against migration edge cases.
    pub async fn find_active(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        fingerprint: &str,
    ) -> Result<Option<TrustedDevice>, StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => pg.find_active(owner_id, owner_type, fingerprint).await,
            RegistryBackend::Memory(mem) => Ok(mem.find_active(owner_id, owner_type, fingerprint)),
        }
    }

    /// Refresh a record's last-used timestamp after a successful trust check
    pub async fn touch_last_used(&self, device_id: Uuid) -> Result<(), StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => pg.touch_last_used(device_id).await,
            RegistryBackend::Memory(mem) => {
                mem.touch_last_used(device_id);
                Ok(())
            }
        }
    }

    /// List an owner's devices, newest first
    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        include_revoked: bool,
    ) -> Result<Vec<TrustedDevice>, StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => {
                pg.list_for_owner(owner_id, owner_type, include_revoked).await
            }
            RegistryBackend::Memory(mem) => {
                Ok(mem.list_for_owner(owner_id, owner_type, include_revoked))
            }
        }
    }

    /// Soft-revoke an owned, not-yet-revoked record. Returns false when no
    /// such record exists (unknown, unowned, and already-revoked ids are
    /// indistinguishable to the caller).
    pub async fn revoke(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
    ) -> Result<bool, StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => pg.revoke(device_id, owner_id, owner_type).await,
            RegistryBackend::Memory(mem) => Ok(mem.revoke(device_id, owner_id, owner_type)),
        }
    }

    /// Revoke every active record for an owner; returns the count affected
    pub async fn revoke_all(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
    ) -> Result<u64, StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => pg.revoke_all(owner_id, owner_type).await,
            RegistryBackend::Memory(mem) => Ok(mem.revoke_all(owner_id, owner_type)),
        }
    }

    /// Extend an owned, non-revoked record by `additional_days` relative to
    /// its current expiry (not to now). Returns the new expiry, or none when
    /// no matching record exists.
    pub async fn extend(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
        additional_days: i64,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => {
                pg.extend(device_id, owner_id, owner_type, additional_days).await
            }
            RegistryBackend::Memory(mem) => {
                Ok(mem.extend(device_id, owner_id, owner_type, additional_days))
            }
        }
    }

    /// Rename an owned record
    pub async fn rename(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
        new_name: &str,
    ) -> Result<bool, StorageError> {
        match &self.backend {
            RegistryBackend::Postgres(pg) => {
                pg.rename(device_id, owner_id, owner_type, new_name).await
            }
            RegistryBackend::Memory(mem) => {
                Ok(mem.rename(device_id, owner_id, owner_type, new_name))
            }
        }
    }

    /// Get registry aggregate counts
    pub async fn stats(&self) -> Result<RegistryStats, StorageError> {
        let mut stats = match &self.backend {
            RegistryBackend::Postgres(pg) => pg.stats().await?,
            RegistryBackend::Memory(mem) => mem.stats(),
        };
        stats.persistent = self.is_persistent();
        Ok(stats)
    }
}

/// Registry statistics for monitoring and the admin endpoint
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub total: u64,
    /// Non-revoked records that have not yet expired
    pub active: u64,
    pub revoked: u64,
    /// Non-revoked records past their expiry
    pub expired: u64,
    /// Records carrying the shared-device flag (migration edge cases)
    pub shared_flagged: u64,
    pub persistent: bool,
}

impl std::fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            RegistryBackend::Postgres(_) => "PostgreSQL",
            RegistryBackend::Memory(_) => "Memory",
        };
        f.debug_struct("DeviceStore").field("backend", &backend).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_registry() {
        let store = DeviceStore::in_memory();
        assert!(!store.is_persistent());
        assert!(store.check_health().await.is_ok());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 0);
        assert!(!stats.persistent);
    }
}

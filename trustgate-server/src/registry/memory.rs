//! In-memory device registry backend
//!
//! Development and test fallback when `DATABASE_URL` is not set. Semantics
//! mirror the PostgreSQL backend exactly: soft revocation, owner scoping on
//! every operation, newest-active-record-wins lookup.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use trustgate_core::{DeviceEnrollment, OwnerType, TrustedDevice};
use uuid::Uuid;

use super::RegistryStats;

/// DashMap-backed device registry
#[derive(Default)]
pub struct MemoryDeviceStore {
    devices: DashMap<Uuid, TrustedDevice>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        enrollment: &DeviceEnrollment,
    ) -> TrustedDevice {
        let now = Utc::now();
        let device = TrustedDevice {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            owner_type,
            device_fingerprint: enrollment.fingerprint().to_string(),
            device_name: enrollment.name().to_string(),
            device_info: enrollment.info().to_string(),
            // The enrollment boundary already rejected shared devices.
            is_shared_device: false,
            expires_at: enrollment.expires_at(now),
            last_used: None,
            revoked: false,
            revoked_at: None,
            created_at: now,
        };
        self.devices.insert(device.id, device.clone());
        device
    }

    pub fn find_active(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        fingerprint: &str,
    ) -> Option<TrustedDevice> {
        let now = Utc::now();
        self.devices
            .iter()
            .filter(|entry| {
                let d = entry.value();
                d.owner_id == owner_id
                    && d.owner_type == owner_type
                    && d.device_fingerprint == fingerprint
                    && d.is_active(now)
            })
            .map(|entry| entry.value().clone())
            .max_by_key(|d| d.created_at)
    }

    pub fn touch_last_used(&self, device_id: Uuid) {
        if let Some(mut entry) = self.devices.get_mut(&device_id) {
            entry.last_used = Some(Utc::now());
        }
    }

    pub fn list_for_owner(
        &self,
        owner_id: &str,
        owner_type: OwnerType,
        include_revoked: bool,
    ) -> Vec<TrustedDevice> {
        let mut devices: Vec<TrustedDevice> = self
            .devices
            .iter()
            .filter(|entry| {
                let d = entry.value();
                d.owner_id == owner_id
                    && d.owner_type == owner_type
                    && (include_revoked || !d.revoked)
            })
            .map(|entry| entry.value().clone())
            .collect();
        devices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        devices
    }

    pub fn revoke(&self, device_id: Uuid, owner_id: &str, owner_type: OwnerType) -> bool {
        match self.devices.get_mut(&device_id) {
            Some(mut entry)
                if entry.owner_id == owner_id
                    && entry.owner_type == owner_type
                    && !entry.revoked =>
            {
                entry.revoked = true;
                entry.revoked_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    pub fn revoke_all(&self, owner_id: &str, owner_type: OwnerType) -> u64 {
        let now = Utc::now();
        let mut count = 0u64;
        for mut entry in self.devices.iter_mut() {
            if entry.owner_id == owner_id && entry.owner_type == owner_type && !entry.revoked {
                entry.revoked = true;
                entry.revoked_at = Some(now);
                count += 1;
            }
        }
        count
    }

    pub fn extend(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
        additional_days: i64,
    ) -> Option<DateTime<Utc>> {
        match self.devices.get_mut(&device_id) {
            Some(mut entry)
                if entry.owner_id == owner_id
                    && entry.owner_type == owner_type
                    && !entry.revoked =>
            {
                entry.expires_at = entry.expires_at + Duration::days(additional_days);
                Some(entry.expires_at)
            }
            _ => None,
        }
    }

    pub fn rename(
        &self,
        device_id: Uuid,
        owner_id: &str,
        owner_type: OwnerType,
        new_name: &str,
    ) -> bool {
        match self.devices.get_mut(&device_id) {
            Some(mut entry) if entry.owner_id == owner_id && entry.owner_type == owner_type => {
                entry.device_name = new_name.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let now = Utc::now();
        let mut stats = RegistryStats::default();
        for entry in self.devices.iter() {
            let d = entry.value();
            stats.total += 1;
            if d.revoked {
                stats.revoked += 1;
            } else if d.expires_at > now {
                stats.active += 1;
            } else {
                stats.expired += 1;
            }
            if d.is_shared_device {
                stats.shared_flagged += 1;
            }
        }
        stats
    }
}

impl std::fmt::Debug for MemoryDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDeviceStore")
            .field("devices", &self.devices.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment(fingerprint: &str, days: i64) -> DeviceEnrollment {
        DeviceEnrollment::new(
            fingerprint,
            "Office laptop",
            "Firefox 128 on Windows 11",
            false,
            Some(days),
        )
        .unwrap()
    }

    #[test]
    fn test_register_then_find_active() {
        let store = MemoryDeviceStore::new();
        let registered = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));

        let found = store
            .find_active("u1", OwnerType::Client, "fp-123")
            .expect("device should be trusted right after registration");
        assert_eq!(found.id, registered.id);

        // Expiry is ~30 days out from registration.
        let window = found.expires_at - found.created_at;
        assert_eq!(window.num_days(), 30);
    }

    #[test]
    fn test_find_active_is_owner_scoped() {
        let store = MemoryDeviceStore::new();
        store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));

        assert!(store.find_active("u2", OwnerType::Client, "fp-123").is_none());
        // Same id string under the other principal namespace does not match.
        assert!(store.find_active("u1", OwnerType::Employee, "fp-123").is_none());
    }

    #[test]
    fn test_expired_record_is_not_returned() {
        let store = MemoryDeviceStore::new();
        let device = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));

        // Simulate the 31-day clock advance by aging the stored record.
        store.devices.get_mut(&device.id).unwrap().expires_at =
            Utc::now() - Duration::seconds(1);

        assert!(store.find_active("u1", OwnerType::Client, "fp-123").is_none());
    }

    #[test]
    fn test_newest_active_record_governs() {
        let store = MemoryDeviceStore::new();
        let first = store.register("u1", OwnerType::Client, &enrollment("fp-123", 10));
        // Backdate the first record so ordering is unambiguous.
        store.devices.get_mut(&first.id).unwrap().created_at =
            Utc::now() - Duration::minutes(5);
        let second = store.register("u1", OwnerType::Client, &enrollment("fp-123", 60));

        let found = store.find_active("u1", OwnerType::Client, "fp-123").unwrap();
        assert_eq!(found.id, second.id);
    }

    #[test]
    fn test_revoke_excludes_from_lookup_but_retains_record() {
        let store = MemoryDeviceStore::new();
        let device = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));

        assert!(store.revoke(device.id, "u1", OwnerType::Client));
        assert!(store.find_active("u1", OwnerType::Client, "fp-123").is_none());

        // Retained for audit: listed when revoked records are included.
        let all = store.list_for_owner("u1", OwnerType::Client, true);
        assert_eq!(all.len(), 1);
        assert!(all[0].revoked);
        assert!(all[0].revoked_at.is_some());

        // Second revoke is a no-op.
        assert!(!store.revoke(device.id, "u1", OwnerType::Client));
    }

    #[test]
    fn test_revoke_requires_ownership() {
        let store = MemoryDeviceStore::new();
        let device = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));

        assert!(!store.revoke(device.id, "u2", OwnerType::Client));
        assert!(!store.revoke(device.id, "u1", OwnerType::Employee));
        // Unchanged: still trusted.
        assert!(store.find_active("u1", OwnerType::Client, "fp-123").is_some());
    }

    #[test]
    fn test_revoke_all_counts_active_records() {
        let store = MemoryDeviceStore::new();
        store.register("u1", OwnerType::Client, &enrollment("fp-1", 30));
        store.register("u1", OwnerType::Client, &enrollment("fp-2", 30));
        store.register("u1", OwnerType::Client, &enrollment("fp-3", 30));
        store.register("u2", OwnerType::Client, &enrollment("fp-4", 30));

        assert_eq!(store.revoke_all("u1", OwnerType::Client), 3);
        assert!(store.find_active("u1", OwnerType::Client, "fp-1").is_none());
        assert!(store.find_active("u1", OwnerType::Client, "fp-2").is_none());
        assert!(store.find_active("u1", OwnerType::Client, "fp-3").is_none());
        // Other owners untouched.
        assert!(store.find_active("u2", OwnerType::Client, "fp-4").is_some());
        // Nothing left to revoke.
        assert_eq!(store.revoke_all("u1", OwnerType::Client), 0);
    }

    #[test]
    fn test_extend_adds_to_current_expiry_not_now() {
        let store = MemoryDeviceStore::new();
        let device = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));
        let prior_expiry = device.expires_at;

        let new_expiry = store
            .extend(device.id, "u1", OwnerType::Client, 15)
            .expect("owned record should extend");
        assert_eq!(new_expiry, prior_expiry + Duration::days(15));

        // Reading back gives the same value.
        let found = store.find_active("u1", OwnerType::Client, "fp-123").unwrap();
        assert_eq!(found.expires_at, new_expiry);
    }

    #[test]
    fn test_extend_requires_ownership_and_non_revoked() {
        let store = MemoryDeviceStore::new();
        let device = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));

        assert!(store.extend(device.id, "u2", OwnerType::Client, 15).is_none());
        assert!(store.extend(Uuid::new_v4(), "u1", OwnerType::Client, 15).is_none());

        store.revoke(device.id, "u1", OwnerType::Client);
        assert!(store.extend(device.id, "u1", OwnerType::Client, 15).is_none());
    }

    #[test]
    fn test_rename_is_owner_scoped() {
        let store = MemoryDeviceStore::new();
        let device = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));

        assert!(store.rename(device.id, "u1", OwnerType::Client, "Front desk"));
        let found = store.find_active("u1", OwnerType::Client, "fp-123").unwrap();
        assert_eq!(found.device_name, "Front desk");

        assert!(!store.rename(device.id, "u2", OwnerType::Client, "Hijacked"));
    }

    #[test]
    fn test_touch_last_used() {
        let store = MemoryDeviceStore::new();
        let device = store.register("u1", OwnerType::Client, &enrollment("fp-123", 30));
        assert!(device.last_used.is_none());

        store.touch_last_used(device.id);
        let found = store.find_active("u1", OwnerType::Client, "fp-123").unwrap();
        assert!(found.last_used.is_some());
    }

    #[test]
    fn test_stats_buckets() {
        let store = MemoryDeviceStore::new();
        store.register("u1", OwnerType::Client, &enrollment("fp-1", 30));
        let expired = store.register("u1", OwnerType::Client, &enrollment("fp-2", 30));
        let revoked = store.register("u1", OwnerType::Employee, &enrollment("fp-3", 30));

        store.devices.get_mut(&expired.id).unwrap().expires_at =
            Utc::now() - Duration::seconds(1);
        store.revoke(revoked.id, "u1", OwnerType::Employee);

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.revoked, 1);
        assert_eq!(stats.shared_flagged, 0);
    }
}

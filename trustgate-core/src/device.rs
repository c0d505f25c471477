//! Trusted-device domain model.
//!
//! A trusted device is a browser/device combination for which a principal has
//! completed full authentication and elected to skip step-up MFA for a bounded
//! window. Records are soft-revoked and retained for audit; the newest active
//! record for a fingerprint governs trust.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TrustError};

/// Trust window applied when the caller does not specify one.
pub const DEFAULT_TRUST_DAYS: i64 = 30;

/// Upper bound on a single trust grant or extension.
pub const MAX_TRUST_DAYS: i64 = 365;

/// Principal namespace a device belongs to.
///
/// Employees and clients are disjoint namespaces: a device record registered
/// under one never matches lookups under the other, even for the same
/// principal id string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Employee,
    Client,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Employee => "employee",
            OwnerType::Client => "client",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "employee" => Ok(OwnerType::Employee),
            "client" => Ok(OwnerType::Client),
            other => Err(TrustError::InvalidOwnerType(other.to_string())),
        }
    }
}

/// A trust record for one (owner, fingerprint) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedDevice {
    pub id: Uuid,
    pub owner_id: String,
    pub owner_type: OwnerType,
    /// Opaque client-generated identifier for a browser/device combination.
    pub device_fingerprint: String,
    pub device_name: String,
    /// Free-form descriptive payload (browser, OS, ...), stored verbatim.
    pub device_info: String,
    /// Shared devices never satisfy a trust check, even when a record exists.
    pub is_shared_device: bool,
    pub expires_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TrustedDevice {
    /// Whether this record currently grants trust: not revoked and not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Validated registration input for a new trust record.
///
/// Construction is the registration boundary: shared devices, empty fields,
/// and out-of-range durations are rejected here so no storage backend can
/// persist an invalid record.
#[derive(Debug, Clone)]
pub struct DeviceEnrollment {
    fingerprint: String,
    name: String,
    info: String,
    trust_duration_days: i64,
}

impl DeviceEnrollment {
    pub fn new(
        fingerprint: impl Into<String>,
        name: impl Into<String>,
        info: impl Into<String>,
        is_shared_device: bool,
        trust_duration_days: Option<i64>,
    ) -> Result<Self> {
        if is_shared_device {
            return Err(TrustError::SharedDeviceRejected);
        }

        let fingerprint = non_empty(fingerprint.into(), "device_fingerprint")?;
        let name = non_empty(name.into(), "device_name")?;
        let info = non_empty(info.into(), "device_info")?;

        let days = trust_duration_days.unwrap_or(DEFAULT_TRUST_DAYS);
        if !(1..=MAX_TRUST_DAYS).contains(&days) {
            return Err(TrustError::InvalidTrustDuration(days));
        }

        Ok(Self {
            fingerprint,
            name,
            info,
            trust_duration_days: days,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn trust_duration_days(&self) -> i64 {
        self.trust_duration_days
    }

    /// Absolute expiry for a registration performed at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.trust_duration_days)
    }
}

fn non_empty(value: String, field: &'static str) -> Result<String> {
    if value.trim().is_empty() {
        Err(TrustError::MissingField(field))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(revoked: bool, expires_at: DateTime<Utc>) -> TrustedDevice {
        TrustedDevice {
            id: Uuid::new_v4(),
            owner_id: "u1".to_string(),
            owner_type: OwnerType::Client,
            device_fingerprint: "fp-123".to_string(),
            device_name: "Office laptop".to_string(),
            device_info: "Firefox 128 on Windows 11".to_string(),
            is_shared_device: false,
            expires_at,
            last_used: None,
            revoked,
            revoked_at: revoked.then(Utc::now),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_type_roundtrip() {
        for ty in [OwnerType::Employee, OwnerType::Client] {
            assert_eq!(ty.as_str().parse::<OwnerType>().unwrap(), ty);
        }
        assert!(matches!(
            "vendor".parse::<OwnerType>(),
            Err(TrustError::InvalidOwnerType(_))
        ));
    }

    #[test]
    fn test_owner_type_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&OwnerType::Employee).unwrap(),
            "\"employee\""
        );
        let ty: OwnerType = serde_json::from_str("\"client\"").unwrap();
        assert_eq!(ty, OwnerType::Client);
    }

    #[test]
    fn test_is_active() {
        let now = Utc::now();
        assert!(device(false, now + Duration::days(1)).is_active(now));
        assert!(!device(false, now - Duration::seconds(1)).is_active(now));
        assert!(!device(true, now + Duration::days(1)).is_active(now));
    }

    #[test]
    fn test_enrollment_rejects_shared_device() {
        let err = DeviceEnrollment::new("fp-1", "Kiosk", "Chrome on ChromeOS", true, None)
            .unwrap_err();
        assert_eq!(err, TrustError::SharedDeviceRejected);
    }

    #[test]
    fn test_enrollment_rejects_empty_fields() {
        assert_eq!(
            DeviceEnrollment::new("", "Laptop", "info", false, None).unwrap_err(),
            TrustError::MissingField("device_fingerprint")
        );
        assert_eq!(
            DeviceEnrollment::new("fp-1", "  ", "info", false, None).unwrap_err(),
            TrustError::MissingField("device_name")
        );
        assert_eq!(
            DeviceEnrollment::new("fp-1", "Laptop", "", false, None).unwrap_err(),
            TrustError::MissingField("device_info")
        );
    }

    #[test]
    fn test_enrollment_duration_bounds() {
        for days in [0, -5, MAX_TRUST_DAYS + 1] {
            let err = DeviceEnrollment::new("fp-1", "Laptop", "info", false, Some(days))
                .unwrap_err();
            assert_eq!(err, TrustError::InvalidTrustDuration(days));
        }
        let enrollment = DeviceEnrollment::new("fp-1", "Laptop", "info", false, None).unwrap();
        assert_eq!(enrollment.trust_duration_days(), DEFAULT_TRUST_DAYS);
    }

    #[test]
    fn test_enrollment_expiry_is_relative_to_registration_time() {
        let enrollment =
            DeviceEnrollment::new("fp-1", "Laptop", "info", false, Some(30)).unwrap();
        let now = Utc::now();
        assert_eq!(enrollment.expires_at(now), now + Duration::days(30));
    }
}

//! Request validation module
//!
//! Transport-level bounds on client-supplied strings. Domain rules (shared
//! devices, trust-duration range) live in `trustgate_core::DeviceEnrollment`;
//! these checks only keep oversized payloads out of the registry.

use trustgate_core::MAX_TRUST_DAYS;

use crate::error::ApiError;

/// Maximum accepted fingerprint length in bytes
pub const MAX_FINGERPRINT_LEN: usize = 512;

/// Maximum accepted device name length in bytes
pub const MAX_NAME_LEN: usize = 128;

/// Maximum accepted device info length in bytes
pub const MAX_INFO_LEN: usize = 2048;

/// Validates registration field lengths
pub fn validate_device_fields(
    fingerprint: &str,
    name: &str,
    info: &str,
) -> Result<(), ApiError> {
    validate_len("device_fingerprint", fingerprint, MAX_FINGERPRINT_LEN)?;
    validate_len("device_name", name, MAX_NAME_LEN)?;
    validate_len("device_info", info, MAX_INFO_LEN)?;
    Ok(())
}

/// Validates a device name on its own (rename path)
pub fn validate_device_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("device_name must not be empty"));
    }
    validate_len("device_name", name, MAX_NAME_LEN)
}

/// Validates an extension length in days
pub fn validate_additional_days(days: i64) -> Result<(), ApiError> {
    if !(1..=MAX_TRUST_DAYS).contains(&days) {
        return Err(ApiError::bad_request(format!(
            "additional_days must be between 1 and {}, got {}",
            MAX_TRUST_DAYS, days
        )));
    }
    Ok(())
}

fn validate_len(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.len() > max {
        Err(ApiError::bad_request(format!(
            "{} exceeds maximum length of {} bytes",
            field, max
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_device_fields_ok() {
        assert!(validate_device_fields("fp-123", "Office laptop", "Firefox on Windows").is_ok());
    }

    #[test]
    fn test_validate_device_fields_too_long() {
        let long_fp = "f".repeat(MAX_FINGERPRINT_LEN + 1);
        assert!(validate_device_fields(&long_fp, "name", "info").is_err());

        let long_name = "n".repeat(MAX_NAME_LEN + 1);
        assert!(validate_device_fields("fp", &long_name, "info").is_err());

        let long_info = "i".repeat(MAX_INFO_LEN + 1);
        assert!(validate_device_fields("fp", "name", &long_info).is_err());
    }

    #[test]
    fn test_validate_device_name() {
        assert!(validate_device_name("Front desk").is_ok());
        assert!(validate_device_name("   ").is_err());
        assert!(validate_device_name(&"n".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_additional_days() {
        assert!(validate_additional_days(1).is_ok());
        assert!(validate_additional_days(MAX_TRUST_DAYS).is_ok());
        assert!(validate_additional_days(0).is_err());
        assert!(validate_additional_days(-3).is_err());
        assert!(validate_additional_days(MAX_TRUST_DAYS + 1).is_err());
    }
}

//! Common validation utilities.

use validator::ValidationError;

/// Maximum accepted accuracy radius in meters. IP geolocation can be off by
/// tens of kilometers, so the bound is generous.
const MAX_ACCURACY_METERS: f64 = 100_000.0;

lazy_static::lazy_static! {
    /// Serial numbers as reported by device firmware or machine ids.
    pub static ref SERIAL_NUMBER_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]{0,63}$").unwrap();
}

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that accuracy is non-negative and plausible.
pub fn validate_accuracy(accuracy: f64) -> Result<(), ValidationError> {
    if (0.0..=MAX_ACCURACY_METERS).contains(&accuracy) {
        Ok(())
    } else {
        let mut err = ValidationError::new("accuracy_range");
        err.message = Some("Accuracy must be between 0 and 100000 meters".into());
        Err(err)
    }
}

/// Validates that battery level is within valid range (0 to 100).
pub fn validate_battery_level(level: i32) -> Result<(), ValidationError> {
    if (0..=100).contains(&level) {
        Ok(())
    } else {
        let mut err = ValidationError::new("battery_range");
        err.message = Some("Battery level must be between 0 and 100".into());
        Err(err)
    }
}

/// Validates a device serial number.
pub fn validate_serial_number(serial: &str) -> Result<(), ValidationError> {
    if SERIAL_NUMBER_REGEX.is_match(serial) {
        Ok(())
    } else {
        let mut err = ValidationError::new("serial_number_format");
        err.message = Some(
            "Serial number must be 1-64 characters of letters, digits, '.', '_' or '-'".into(),
        );
        Err(err)
    }
}

/// Validates a coordinate pair. NaN and infinities fail the range checks.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ValidationError> {
    validate_latitude(lat)?;
    validate_longitude(lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{faker::lorem::en::Word, Fake};

    // Latitude tests
    #[test]
    fn test_validate_latitude() {
        assert!(validate_latitude(0.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(90.1).is_err());
        assert!(validate_latitude(-90.1).is_err());
    }

    #[test]
    fn test_validate_latitude_nan() {
        assert!(validate_latitude(f64::NAN).is_err());
        assert!(validate_latitude(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_latitude_error_message() {
        let err = validate_latitude(100.0).unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Latitude must be between -90 and 90"
        );
    }

    // Longitude tests
    #[test]
    fn test_validate_longitude() {
        assert!(validate_longitude(0.0).is_ok());
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-180.0).is_ok());
        assert!(validate_longitude(180.1).is_err());
        assert!(validate_longitude(-180.1).is_err());
    }

    #[test]
    fn test_validate_longitude_error_message() {
        let err = validate_longitude(200.0).unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Longitude must be between -180 and 180"
        );
    }

    // Accuracy tests
    #[test]
    fn test_validate_accuracy() {
        assert!(validate_accuracy(0.0).is_ok());
        assert!(validate_accuracy(100.0).is_ok());
        assert!(validate_accuracy(5000.0).is_ok());
        assert!(validate_accuracy(-1.0).is_err());
        assert!(validate_accuracy(100_000.1).is_err());
        assert!(validate_accuracy(f64::NAN).is_err());
    }

    // Battery level tests
    #[test]
    fn test_validate_battery_level() {
        assert!(validate_battery_level(0).is_ok());
        assert!(validate_battery_level(100).is_ok());
        assert!(validate_battery_level(50).is_ok());
        assert!(validate_battery_level(-1).is_err());
        assert!(validate_battery_level(101).is_err());
    }

    #[test]
    fn test_validate_battery_level_error_message() {
        let err = validate_battery_level(150).unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Battery level must be between 0 and 100"
        );
    }

    // Serial number tests
    #[test]
    fn test_validate_serial_number() {
        assert!(validate_serial_number("C02XK1ZJJGH5").is_ok());
        assert!(validate_serial_number("PF-2A3B.45_x").is_ok());
        assert!(validate_serial_number("").is_err());
        assert!(validate_serial_number("-leading-dash").is_err());
        assert!(validate_serial_number("has space").is_err());
        assert!(validate_serial_number(&"A".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_serial_number_generated_words() {
        for _ in 0..20 {
            let word: String = Word().fake();
            let serial = format!("SN{}", word.to_uppercase());
            assert!(validate_serial_number(&serial).is_ok(), "{}", serial);
        }
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(51.5, -0.12).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
    }
}

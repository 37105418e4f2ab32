//! Persistence errors and their mapping onto domain errors.

use domain::DomainError;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value does not decode into its domain type.
    #[error("corrupt column {column}: {reason}")]
    Corrupt { column: &'static str, reason: String },
}

impl From<PersistenceError> for DomainError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                DomainError::Conflict(match db.constraint() {
                    Some("devices_serial_number_key") => "serial number already registered".to_string(),
                    Some(constraint) => format!("duplicate value violates {}", constraint),
                    None => db.message().to_string(),
                })
            }
            PersistenceError::Database(sqlx::Error::PoolTimedOut) => {
                DomainError::Timeout("database pool exhausted".to_string())
            }
            other => {
                tracing::error!(error = %other, "Storage failure");
                DomainError::Storage(other.to_string())
            }
        }
    }
}

/// Parses a TEXT column holding an enum value.
pub(crate) fn parse_column<T>(column: &'static str, value: &str) -> Result<T, PersistenceError>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|reason| PersistenceError::Corrupt { column, reason })
}

/// Decodes a JSONB column into a typed value.
pub(crate) fn decode_json<T>(column: &'static str, value: serde_json::Value) -> Result<T, PersistenceError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(value).map_err(|e| PersistenceError::Corrupt {
        column,
        reason: e.to_string(),
    })
}

pub(crate) fn encode_json<T: serde::Serialize>(
    column: &'static str,
    value: &T,
) -> Result<serde_json::Value, PersistenceError> {
    serde_json::to_value(value).map_err(|e| PersistenceError::Corrupt {
        column,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{CommandType, Severity};

    #[test]
    fn test_parse_column() {
        let parsed: CommandType = parse_column("command_type", "wipe").unwrap();
        assert_eq!(parsed, CommandType::Wipe);

        let err = parse_column::<Severity>("severity", "apocalyptic").unwrap_err();
        assert!(err.to_string().contains("severity"));
    }

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        let err: DomainError = PersistenceError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, DomainError::Timeout(_)));
    }

    #[test]
    fn test_corrupt_row_maps_to_storage() {
        let err: DomainError = PersistenceError::Corrupt {
            column: "status",
            reason: "bad".into(),
        }
        .into();
        assert!(matches!(err, DomainError::Storage(_)));
    }
}

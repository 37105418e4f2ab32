//! HTTP route handlers.

pub mod agent;
pub mod alerts;
pub mod audit_logs;
pub mod commands;
pub mod devices;
pub mod geofences;
pub mod health;
pub mod policy;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Parses an optional JSON body; an empty body yields `T::default()`.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::command::EnqueueCommandRequest;

    #[test]
    fn test_optional_json_empty_body() {
        let req: EnqueueCommandRequest = optional_json(&Bytes::new()).unwrap();
        assert!(req.payload.is_none());
        let req: EnqueueCommandRequest = optional_json(&Bytes::from_static(b"  \n")).unwrap();
        assert!(req.payload.is_none());
    }

    #[test]
    fn test_optional_json_parses_and_rejects() {
        let req: EnqueueCommandRequest =
            optional_json(&Bytes::from_static(br#"{"payload":{"text":"hi"}}"#)).unwrap();
        assert_eq!(req.payload.unwrap()["text"], "hi");

        let err = optional_json::<EnqueueCommandRequest>(&Bytes::from_static(b"{oops")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}

//! Generation error types

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single generation call; never retried
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Decode, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP response, taking the message from the
    /// backend's `detail` payload when there is one.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = detail_message(body)
            .unwrap_or_else(|| format!("generation backend returned HTTP {}", status.as_u16()));
        let kind = match status.as_u16() {
            503 => GenerationErrorKind::Unavailable,
            400..=499 => GenerationErrorKind::InvalidRequest,
            500..=599 => GenerationErrorKind::Backend,
            _ => GenerationErrorKind::Unknown,
        };
        Self::new(kind, message)
    }
}

/// Error classification, for logs and the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Connection failed or the body could not be read
    Network,
    /// Backend is up but has no model loaded (503)
    Unavailable,
    /// Other server-side failure (5xx)
    Backend,
    /// Request rejected (4xx)
    InvalidRequest,
    /// Success status with a body we could not parse
    Decode,
    Unknown,
}

fn detail_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    match payload.get("detail")? {
        Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string_becomes_message() {
        let err = GenerationError::from_status(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"detail":"Model not loaded"}"#,
        );
        assert_eq!(err.kind, GenerationErrorKind::Unavailable);
        assert_eq!(err.to_string(), "Model not loaded");
    }

    #[test]
    fn test_structured_detail_is_json_encoded() {
        let err = GenerationError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":[{"loc":["body","num_tokens"],"msg":"bad"}]}"#,
        );
        assert_eq!(err.kind, GenerationErrorKind::InvalidRequest);
        assert!(err.message.contains("num_tokens"));
    }

    #[test]
    fn test_unparseable_body_falls_back_to_generic_message() {
        let err = GenerationError::from_status(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.kind, GenerationErrorKind::Backend);
        assert_eq!(err.message, "generation backend returned HTTP 502");
    }
}

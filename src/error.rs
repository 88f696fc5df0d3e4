//! Error types for ticktick-mcp
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while talking to TickTick or the local cache
#[derive(Debug, Error)]
pub enum TickTickError {
    /// Missing, expired or rejected credentials (HTTP 401)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Credentials are valid but lack permission (HTTP 403)
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Resource not found (HTTP 404 or local lookup miss)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected as invalid (HTTP 400 or bad local input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Too many requests (HTTP 429)
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Remote server failure (HTTP 5xx)
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Any other non-success HTTP status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Operation only available through the session-authenticated v2 API
    #[error("{0} requires v2 API authentication (use ticktick_login)")]
    V2Required(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV import/export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TickTickError {
    /// Map a non-success HTTP status and body to the matching error.
    pub fn from_status(status: u16, body: &str, endpoint: &str) -> Self {
        let message = format!("{} at {}", extract_message(body), endpoint);
        match status {
            400 => Self::Validation(message),
            401 => Self::Authentication(message),
            403 => Self::Authorization(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited { retry_after_secs: 0 },
            s if s >= 500 => Self::Server { status: s, message },
            s => Self::Api { status: s, message },
        }
    }

    /// Whether the request that produced this error may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_)
        )
    }

    /// Short machine-readable code used in JSON tool output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_error",
            Self::Authorization(_) => "authorization_error",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::Server { .. } => "server_error",
            Self::Api { .. } => "api_error",
            Self::Network(_) => "network_error",
            Self::Configuration(_) => "configuration_error",
            Self::Cache(_) => "cache_error",
            Self::V2Required(_) => "v2_required",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Csv(_) => "csv_error",
        }
    }
}

impl From<reqwest::Error> for TickTickError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Pull a human-readable message out of an error body.
fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["errorMessage", "error", "message"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Result type alias for ticktick-mcp operations
pub type Result<T> = std::result::Result<T, TickTickError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = TickTickError::NotFound("task abc".to_string());
        assert_eq!(err.to_string(), "Not found: task abc");
    }

    #[test]
    fn test_v2_required_error() {
        let err = TickTickError::V2Required("Habits".to_string());
        assert_eq!(
            err.to_string(),
            "Habits requires v2 API authentication (use ticktick_login)"
        );
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            TickTickError::from_status(400, "", "/task"),
            TickTickError::Validation(_)
        ));
        assert!(matches!(
            TickTickError::from_status(401, "", "/task"),
            TickTickError::Authentication(_)
        ));
        assert!(matches!(
            TickTickError::from_status(403, "", "/task"),
            TickTickError::Authorization(_)
        ));
        assert!(matches!(
            TickTickError::from_status(404, "", "/task"),
            TickTickError::NotFound(_)
        ));
        assert!(matches!(
            TickTickError::from_status(429, "", "/task"),
            TickTickError::RateLimited { .. }
        ));
        assert!(matches!(
            TickTickError::from_status(503, "", "/task"),
            TickTickError::Server { status: 503, .. }
        ));
        assert!(matches!(
            TickTickError::from_status(409, "", "/task"),
            TickTickError::Api { status: 409, .. }
        ));
    }

    #[test]
    fn test_from_status_extracts_json_message() {
        let err = TickTickError::from_status(
            400,
            r#"{"errorCode":"x","errorMessage":"title required"}"#,
            "/task",
        );
        assert_eq!(err.to_string(), "Validation error: title required at /task");
    }

    #[test]
    fn test_from_status_plain_body() {
        let err = TickTickError::from_status(404, "  nope  ", "/project/1");
        assert_eq!(err.to_string(), "Not found: nope at /project/1");
    }

    #[test]
    fn test_is_retryable() {
        assert!(TickTickError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(TickTickError::Network("reset".to_string()).is_retryable());
        assert!(
            TickTickError::Server {
                status: 502,
                message: "bad gateway".to_string()
            }
            .is_retryable()
        );
        assert!(!TickTickError::NotFound("x".to_string()).is_retryable());
        assert!(!TickTickError::Authentication("x".to_string()).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TickTickError = io_err.into();
        assert!(matches!(err, TickTickError::Io(_)));
        assert!(err.to_string().contains("file not found"));
        assert_eq!(err.code(), "io_error");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: TickTickError = json_err.into();
        assert!(matches!(err, TickTickError::Json(_)));
    }
}

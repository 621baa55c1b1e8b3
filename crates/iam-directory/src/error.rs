//! Error types for directory operations
//!
//! The directory raises on failure. Analysis code decides per operation
//! whether a failure is reported softly or propagated.

use thiserror::Error;

/// Directory error types.
///
/// The first four variants mirror how the IAM API reports failures
/// (404, 403, 409, anything else). The last two cover transport and decoding.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The resource does not exist
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource kind (e.g. "group")
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The caller may not perform the operation
    #[error("Permission denied for {operation} on {resource}")]
    PermissionDenied {
        /// Resource kind
        resource: &'static str,
        /// Operation attempted (e.g. "list")
        operation: String,
    },

    /// The resource already exists or a version did not match
    #[error("Conflict: {resource} already exists or version mismatch")]
    Conflict {
        /// Resource kind
        resource: &'static str,
    },

    /// Any other API failure
    #[error("Failed to {operation} {resource}: {message}")]
    Generic {
        /// Resource kind
        resource: &'static str,
        /// Operation attempted
        operation: String,
        /// Error detail
        message: String,
        /// HTTP status, when the API answered
        status: Option<u16>,
    },

    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a body that could not be decoded
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    /// Map an unsuccessful HTTP status to an error.
    pub fn from_status(
        status: u16,
        resource: &'static str,
        operation: impl Into<String>,
        id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        match status {
            404 => DirectoryError::NotFound {
                resource,
                id: id.into(),
            },
            403 => DirectoryError::PermissionDenied {
                resource,
                operation: operation.into(),
            },
            409 => DirectoryError::Conflict { resource },
            _ => DirectoryError::Generic {
                resource,
                operation: operation.into(),
                message: body.into(),
                status: Some(status),
            },
        }
    }

    /// HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DirectoryError::NotFound { .. } => Some(404),
            DirectoryError::PermissionDenied { .. } => Some(403),
            DirectoryError::Conflict { .. } => Some(409),
            DirectoryError::Generic { status, .. } => *status,
            DirectoryError::Request(e) => e.status().map(|s| s.as_u16()),
            DirectoryError::InvalidResponse(_) => None,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound { .. })
    }

    /// Check if the request may succeed when retried.
    ///
    /// Rate limiting and gateway/server errors are transient, as are
    /// timeouts and connection failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::Generic {
                status: Some(status),
                ..
            } => matches!(status, 429 | 500 | 502 | 503 | 504),
            DirectoryError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        let err = DirectoryError::from_status(404, "group", "get", "g-1", "");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "group not found: g-1");

        let err = DirectoryError::from_status(403, "policy", "list", "", "");
        assert!(matches!(err, DirectoryError::PermissionDenied { .. }));
        assert_eq!(err.status_code(), Some(403));

        let err = DirectoryError::from_status(409, "binding", "create", "", "");
        assert!(matches!(err, DirectoryError::Conflict { .. }));

        let err = DirectoryError::from_status(500, "user", "list", "", "boom");
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "Failed to list user: boom");
    }

    #[test]
    fn test_retryable() {
        assert!(DirectoryError::from_status(429, "group", "list", "", "").is_retryable());
        assert!(DirectoryError::from_status(503, "group", "list", "", "").is_retryable());
        assert!(!DirectoryError::from_status(400, "group", "list", "", "").is_retryable());
        assert!(!DirectoryError::from_status(404, "group", "get", "x", "").is_retryable());
        assert!(!DirectoryError::InvalidResponse("bad".into()).is_retryable());
    }
}

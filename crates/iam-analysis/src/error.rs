//! Error types for analysis operations.

use thiserror::Error;

use iam_directory::DirectoryError;

/// Analysis error types.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A directory call failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The requested RACI template does not exist
    #[error("Unknown template: {name} (available: {})", available.join(", "))]
    UnknownTemplate {
        /// Requested template name
        name: String,
        /// Names of the built-in templates
        available: Vec<String>,
    },
}

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

impl AnalysisError {
    /// HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AnalysisError::Directory(e) => e.status_code(),
            AnalysisError::UnknownTemplate { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_template_message() {
        let err = AnalysisError::UnknownTemplate {
            name: "custom".to_string(),
            available: vec!["basic".to_string(), "enterprise".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown template: custom (available: basic, enterprise)"
        );
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_directory_error_passthrough() {
        let err: AnalysisError =
            DirectoryError::from_status(403, "group", "list", "", "").into();
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.to_string(), "Permission denied for list on group");
    }
}

//! Soft-fail results.
//!
//! Lookups that can miss (a user, group or policy named by the caller) do
//! not raise. They return an [`Outcome`] that serializes either as the record
//! itself or as `{"error": "...", "status_code": 404}`.

use serde::{Deserialize, Serialize};
use std::fmt;

use iam_directory::DirectoryError;

/// Error half of an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftError {
    /// Error message.
    pub error: String,

    /// HTTP status of the failed upstream call, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "{} (status {})", self.error, status),
            None => f.write_str(&self.error),
        }
    }
}

impl From<&DirectoryError> for SoftError {
    fn from(err: &DirectoryError) -> Self {
        Self {
            error: err.to_string(),
            status_code: err.status_code(),
        }
    }
}

impl From<DirectoryError> for SoftError {
    fn from(err: DirectoryError) -> Self {
        Self::from(&err)
    }
}

/// A record, or the reason it could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    /// The lookup failed.
    Failed(SoftError),
    /// The record was produced.
    Found(T),
}

impl<T> Outcome<T> {
    /// `"<kind> not found: <identifier>"` without a status code.
    pub fn not_found(kind: &str, identifier: &str) -> Self {
        Outcome::Failed(SoftError {
            error: format!("{} not found: {}", kind, identifier),
            status_code: None,
        })
    }

    /// Check if a record was produced.
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    /// The record, if produced.
    pub fn found(&self) -> Option<&T> {
        match self {
            Outcome::Found(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&SoftError> {
        match self {
            Outcome::Found(_) => None,
            Outcome::Failed(err) => Some(err),
        }
    }

    /// Transform the record.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Found(value) => Outcome::Found(f(value)),
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<T, SoftError> {
        match self {
            Outcome::Found(value) => Ok(value),
            Outcome::Failed(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, DirectoryError>> for Outcome<T> {
    fn from(result: Result<T, DirectoryError>) -> Self {
        match result {
            Ok(value) => Outcome::Found(value),
            Err(err) => Outcome::Failed(err.into()),
        }
    }
}

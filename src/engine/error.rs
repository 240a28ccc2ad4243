//! engine::error
//!
//! Error taxonomy and structured outcomes of the public operations.
//!
//! Every lower-level error maps onto one [`ErrorKind`]. Operations hand
//! their callers an [`OpOutcome`], never a bare error.
//!
//! # Example
//!
//! ```
//! use logshelf::engine::{ErrorKind, OpError, OpOutcome};
//!
//! let outcome = OpOutcome::from(Err::<logshelf::core::types::Oid, _>(
//!     OpError::not_found("log/x.html does not exist"),
//! ));
//! assert_eq!(outcome.kind(), Some(ErrorKind::NotFound));
//! assert_eq!(
//!     serde_json::to_string(&outcome).unwrap(),
//!     r#"{"ok":false,"error":"log/x.html does not exist","kind":"NOT_FOUND"}"#
//! );
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::pipeline::PublishStage;
use crate::core::types::{Oid, TypeError};
use crate::forge::StoreError;
use crate::listing::CodecError;

/// Failure categories of the public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or missing input, detected before contacting the store
    Validation,
    /// The target does not exist
    NotFound,
    /// The target already exists
    AlreadyExists,
    /// The host document is absent
    NotInitialized,
    /// The branch moved between read and write
    Conflict,
    /// Any other remote failure
    StoreFailure,
    /// The list region is missing or malformed where required
    ParseFailure,
}

impl ErrorKind {
    /// Upper-case name as it appears in JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::NotInitialized => "NOT_INITIALIZED",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::StoreFailure => "STORE_FAILURE",
            ErrorKind::ParseFailure => "PARSE_FAILURE",
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::StoreFailure)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified operation failure with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OpError {
    kind: ErrorKind,
    message: String,
}

impl OpError {
    /// Create an error of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotInitialized, message)
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailure, message)
    }

    /// Classify a store failure at a pipeline stage.
    pub fn store(stage: PublishStage, err: StoreError) -> Self {
        let kind = match &err {
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            _ => ErrorKind::StoreFailure,
        };
        Self::new(kind, format!("{stage}: {err}"))
    }

    /// The failure category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable reason.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<StoreError> for OpError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            _ => ErrorKind::StoreFailure,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<CodecError> for OpError {
    fn from(err: CodecError) -> Self {
        let kind = match &err {
            CodecError::RegionNotFound { .. } => ErrorKind::ParseFailure,
            CodecError::InvalidMarkers(_) => ErrorKind::Validation,
            CodecError::InvalidPattern(_) => ErrorKind::ParseFailure,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<TypeError> for OpError {
    fn from(err: TypeError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Result of a public operation.
///
/// Serializes as `{"ok":true,"commit":"<sha>"}` or
/// `{"ok":false,"error":"<message>","kind":"<KIND>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// The change landed as `commit`.
    Committed { commit: Oid },
    /// Nothing changed.
    Failed(OpError),
}

impl OpOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, OpOutcome::Committed { .. })
    }

    /// The new head commit, on success.
    pub fn commit(&self) -> Option<&Oid> {
        match self {
            OpOutcome::Committed { commit } => Some(commit),
            OpOutcome::Failed(_) => None,
        }
    }

    /// The failure category, on failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            OpOutcome::Committed { .. } => None,
            OpOutcome::Failed(err) => Some(err.kind()),
        }
    }

    /// The failure, on failure.
    pub fn error(&self) -> Option<&OpError> {
        match self {
            OpOutcome::Committed { .. } => None,
            OpOutcome::Failed(err) => Some(err),
        }
    }
}

impl From<Result<Oid, OpError>> for OpOutcome {
    fn from(result: Result<Oid, OpError>) -> Self {
        match result {
            Ok(commit) => OpOutcome::Committed { commit },
            Err(err) => OpOutcome::Failed(err),
        }
    }
}

impl Serialize for OpOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OpOutcome::Committed { commit } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("commit", commit.as_str())?;
                map.end()
            }
            OpOutcome::Failed(err) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", err.message())?;
                map.serialize_entry("kind", &err.kind())?;
                map.end()
            }
        }
    }
}

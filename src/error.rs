//! Error taxonomy shared by every binding scope.
//!
//! Store logic only ever branches on [`ErrorCode`]. Native failures arrive as
//! typed [`HandleError`]s from the platform layer and are classified here, per
//! scope, before they are recorded or returned.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handles::HandleError;
use crate::models::BindingScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoBoundFile,
    PermissionDenied,
    FileNotFound,
    SchemaMismatch,
    NoOutputDirBound,
    OutputDirPermissionDenied,
    OutputDirNotFound,
    OutputWriteFailed,
    InvalidInput,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoBoundFile => "NO_BOUND_FILE",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::SchemaMismatch => "SCHEMA_MISMATCH",
            ErrorCode::NoOutputDirBound => "NO_OUTPUT_DIR_BOUND",
            ErrorCode::OutputDirPermissionDenied => "OUTPUT_DIR_PERMISSION_DENIED",
            ErrorCode::OutputDirNotFound => "OUTPUT_DIR_NOT_FOUND",
            ErrorCode::OutputWriteFailed => "OUTPUT_WRITE_FAILED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Codes that stick in binding metadata until a rebind succeeds.
    pub fn needs_rebind(&self) -> bool {
        matches!(
            self,
            ErrorCode::NoBoundFile
                | ErrorCode::PermissionDenied
                | ErrorCode::FileNotFound
                | ErrorCode::SchemaMismatch
                | ErrorCode::NoOutputDirBound
                | ErrorCode::OutputDirPermissionDenied
                | ErrorCode::OutputDirNotFound
        )
    }

    /// Code used when no usable handle is bound for `scope`.
    pub fn unbound(scope: BindingScope) -> Self {
        match scope {
            BindingScope::Tracker => ErrorCode::NoBoundFile,
            BindingScope::Output => ErrorCode::NoOutputDirBound,
        }
    }

    /// Code used when the live permission probe does not report `granted`.
    pub fn permission(scope: BindingScope) -> Self {
        match scope {
            BindingScope::Tracker => ErrorCode::PermissionDenied,
            BindingScope::Output => ErrorCode::OutputDirPermissionDenied,
        }
    }

    /// Classify a platform failure observed while working on `scope`.
    pub fn classify(scope: BindingScope, err: &HandleError) -> Self {
        match (scope, err) {
            (BindingScope::Tracker, HandleError::NotFound) => ErrorCode::FileNotFound,
            (BindingScope::Tracker, HandleError::PermissionDenied) => ErrorCode::PermissionDenied,
            (BindingScope::Tracker, HandleError::Invalid(_)) => ErrorCode::NoBoundFile,
            (BindingScope::Tracker, _) => ErrorCode::UnknownError,
            (BindingScope::Output, HandleError::NotFound) => ErrorCode::OutputDirNotFound,
            (BindingScope::Output, HandleError::PermissionDenied) => {
                ErrorCode::OutputDirPermissionDenied
            }
            (BindingScope::Output, HandleError::Invalid(_)) => ErrorCode::NoOutputDirBound,
            (BindingScope::Output, _) => ErrorCode::OutputWriteFailed,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure raised inside the store.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct TrackerError {
    pub code: ErrorCode,
    pub message: String,
}

impl TrackerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_handle(scope: BindingScope, err: HandleError) -> Self {
        Self::new(ErrorCode::classify(scope, &err), err.to_string())
    }

    /// Wrap an internal plumbing failure (SQLite worker, metadata file).
    pub fn internal(err: anyhow::Error) -> Self {
        Self::new(ErrorCode::UnknownError, format!("{err:#}"))
    }
}

impl From<anyhow::Error> for TrackerError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// Structured failure returned by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub ok: bool,
    pub error_code: ErrorCode,
    pub message: String,
    pub needs_rebind: bool,
}

impl From<TrackerError> for Failure {
    fn from(err: TrackerError) -> Self {
        Self {
            ok: false,
            needs_rebind: err.code.needs_rebind(),
            error_code: err.code,
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebind_class_is_fixed() {
        let sticky = [
            ErrorCode::NoBoundFile,
            ErrorCode::PermissionDenied,
            ErrorCode::FileNotFound,
            ErrorCode::SchemaMismatch,
            ErrorCode::NoOutputDirBound,
            ErrorCode::OutputDirPermissionDenied,
            ErrorCode::OutputDirNotFound,
        ];
        for code in sticky {
            assert!(code.needs_rebind(), "{code} should need rebind");
        }
        for code in [
            ErrorCode::OutputWriteFailed,
            ErrorCode::InvalidInput,
            ErrorCode::UnknownError,
        ] {
            assert!(!code.needs_rebind(), "{code} should be transient");
        }
    }

    #[test]
    fn classification_depends_on_scope() {
        assert_eq!(
            ErrorCode::classify(BindingScope::Tracker, &HandleError::NotFound),
            ErrorCode::FileNotFound
        );
        assert_eq!(
            ErrorCode::classify(BindingScope::Output, &HandleError::NotFound),
            ErrorCode::OutputDirNotFound
        );
        assert_eq!(
            ErrorCode::classify(BindingScope::Output, &HandleError::AlreadyExists),
            ErrorCode::OutputWriteFailed
        );
        assert_eq!(
            ErrorCode::classify(BindingScope::Tracker, &HandleError::PermissionDenied),
            ErrorCode::PermissionDenied
        );
    }

    #[test]
    fn failure_serializes_with_wire_names() {
        let failure = Failure::from(TrackerError::new(ErrorCode::SchemaMismatch, "bad header"));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["errorCode"], "SCHEMA_MISMATCH");
        assert_eq!(json["needsRebind"], true);
    }
}

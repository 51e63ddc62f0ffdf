use thiserror::Error;

use crate::document::Path;

/// Failures raised by tree primitives and editing operations.
///
/// Validation variants (`InvalidArgument`, `StructuralViolation`) are raised
/// before the first mutation, so the document is untouched when they occur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("no node at path {path}")]
    NotFound { path: Path },
    #[error("node is not a descendant of the requested root")]
    NotDescendant,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("structural violation: {0}")]
    StructuralViolation(String),
    #[error("malformed markup at byte {offset}: {message}")]
    Markup { offset: usize, message: String },
    #[error("history record mismatch: expected to close `{expected}`, found `{found}`")]
    UnbalancedRecord { expected: String, found: String },
}

impl EditorError {
    pub(crate) fn not_found(path: &Path) -> Self {
        EditorError::NotFound { path: path.clone() }
    }

    pub(crate) fn structural(message: impl Into<String>) -> Self {
        EditorError::StructuralViolation(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EditorError::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

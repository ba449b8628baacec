use serde::{Deserialize, Serialize};

/// Centralized error types for the import pipeline.
///
/// Parsing and validation errors are collected into per-block rejections
/// rather than aborting the run; only container-level failures (and, in
/// strict mode, any accumulated rejection) stop the import before writes.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed header at line {line}: {message}")]
    HeaderSyntax { line: usize, message: String },

    #[error("Question id '{question_id}' contradicts type label '{label}' (expected prefix '{expected_prefix}')")]
    TypeIdMismatch {
        question_id: String,
        label: String,
        expected_prefix: String,
    },

    #[error("Duplicate question id '{0}' in this import run")]
    DuplicateId(String),

    #[error("Question '{question_id}' is missing required field '{field}'")]
    MissingRequiredField { question_id: String, field: String },

    #[error("Question '{question_id}' has invalid answer '{got}' (allowed: {allowed})")]
    InvalidAnswer {
        question_id: String,
        got: String,
        allowed: String,
    },

    #[error("Question '{question_id}' has malformed options: {message}")]
    MalformedOptions { question_id: String, message: String },

    #[error("Store read failed: {0}")]
    StoreRead(#[source] anyhow::Error),

    #[error("Store apply failed after {applied} of {total} actions: {source}")]
    StoreFailure {
        applied: usize,
        total: usize,
        #[source]
        source: anyhow::Error,
    },
}

/// Report-facing classification of an [`ImportError`]. Kinds, not types:
/// this is what ends up in rejection entries and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    Io,
    HeaderSyntax,
    TypeIdMismatch,
    DuplicateId,
    MissingRequiredField,
    InvalidAnswer,
    MalformedOptions,
    StoreFailure,
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ImportError::Io(_) | ImportError::StoreRead(_) => ErrorKind::Io,
            ImportError::HeaderSyntax { .. } => ErrorKind::HeaderSyntax,
            ImportError::TypeIdMismatch { .. } => ErrorKind::TypeIdMismatch,
            ImportError::DuplicateId(_) => ErrorKind::DuplicateId,
            ImportError::MissingRequiredField { .. } => ErrorKind::MissingRequiredField,
            ImportError::InvalidAnswer { .. } => ErrorKind::InvalidAnswer,
            ImportError::MalformedOptions { .. } => ErrorKind::MalformedOptions,
            ImportError::StoreFailure { .. } => ErrorKind::StoreFailure,
        }
    }

    /// The question id this error is about, when one is known.
    pub fn question_id(&self) -> Option<&str> {
        match self {
            ImportError::TypeIdMismatch { question_id, .. }
            | ImportError::MissingRequiredField { question_id, .. }
            | ImportError::InvalidAnswer { question_id, .. }
            | ImportError::MalformedOptions { question_id, .. } => Some(question_id),
            ImportError::DuplicateId(id) => Some(id),
            _ => None,
        }
    }
}

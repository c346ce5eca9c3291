use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure class a caller can branch on without parsing `code`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required input missing/empty, or a value outside its fixed set. Nothing was written.
    Validation,
    /// Referenced incident id does not exist.
    NotFound,
    /// Export requested with zero incidents. Reported, not exceptional.
    EmptyResult,
    /// SQLite, CSV or timestamp decoding fault. Fatal for the current operation.
    Storage,
}

/// Single structured error shape used across the core and exposed to the shell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    /// Storage-class error; most `map_err` sites in the store use this.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Storage, code, message)
    }

    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Validation, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotFound, code, message)
    }

    pub fn empty_result(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::EmptyResult, code, message)
    }

    fn with_kind(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_empty_result(&self) -> bool {
        self.kind == ErrorKind::EmptyResult
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

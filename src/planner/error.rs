//! Errors raised while compiling a report configuration.
//!
//! Every error is raised synchronously at compile time and is not
//! retryable: the compiler never returns partial output.

use thiserror::Error;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Broad category of a compile failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration references something that does not exist or is malformed.
    Configuration,
    /// No relationship path connects a required entity to the primary entity.
    JoinPath,
    /// A derived identifier failed the strict identifier check.
    Identifier,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::JoinPath => "join_path",
            ErrorKind::Identifier => "identifier",
        }
    }
}

/// Errors that can occur during compilation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    #[error("Unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("No valid fields selected")]
    NoFields,

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Filter on '{field}' requires a second value")]
    MissingFilterValue { field: String },

    #[error("Filter on '{field}' has an empty value list")]
    EmptyValueList { field: String },

    #[error(
        "Cannot join entity '{to}' to primary entity '{from}'. No relationship path found."
    )]
    NoJoinPath { from: String, to: String },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::NoJoinPath { .. } => ErrorKind::JoinPath,
            CompileError::InvalidIdentifier(_) => ErrorKind::Identifier,
            _ => ErrorKind::Configuration,
        }
    }

    pub(crate) fn unknown_field(entity: &str, field: &str) -> Self {
        CompileError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }
}

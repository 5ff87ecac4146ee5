use thiserror::Error;

use crate::config::ConfigError;

/// Model output that failed structural, type or value validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation at `{field}`: {reason}")]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Rate-limit rejection, timeout or transport failure. Worth another attempt.
    #[error("transient service error: {0}")]
    Transient(String),

    /// Malformed request or rejected credentials. Retrying cannot help.
    #[error("non-transient service error: {0}")]
    NonTransient(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

/// Bad arguments to a lookup over loaded customers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid date `{0}`: expected YYYY-MM-DD")]
    InvalidDate(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("failed to read input {path}: {reason}")]
    Input { path: String, reason: String },

    #[error("failed to persist report to {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Fatal errors abort the whole run; everything else is recorded against one item.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Schema(_) => false,
            PipelineError::Service(err) => matches!(err, ServiceError::NonTransient(_)),
            PipelineError::Input { .. }
            | PipelineError::Persistence { .. }
            | PipelineError::Config(_) => true,
        }
    }
}

//! Error types for the driver registry

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Driver registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Missing-generator configuration rejected: reassignment, collision with
    /// a stored `"missing"` driver, or removal of the reserved id.
    #[error("invalid registry configuration: {0}")]
    Configuration(String),

    /// A driver failed schema validation. The message carries the first
    /// offending field and the reason, e.g. `"id" is required`.
    #[error("\"{field}\" {reason}")]
    Validation { field: String, reason: String },

    #[error("{driver_type} driver '{id}' is already registered")]
    DuplicateId { driver_type: String, id: String },

    #[error("unknown {driver_type} driver '{id}'")]
    NotFound { driver_type: String, id: String },

    /// Raised when a synthesized stand-in function is invoked. The message
    /// format is fixed; hosts match on it.
    #[error("Cannot call {field}() - driver '{id}' is missing")]
    NotImplemented { field: String, id: String },
}

impl RegistryError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

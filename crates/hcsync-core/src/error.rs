//! Core validation errors

use thiserror::Error;

/// Errors raised by the pure parts of hcsync
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown vendor: {0}")]
    UnknownVendor(String),

    #[error("Unknown resource kind: {0}")]
    UnknownResourceKind(String),

    #[error("Invalid limit {name}: {reason}")]
    InvalidLimit { name: &'static str, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

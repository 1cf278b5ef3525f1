//! Validation errors raised by the catalog core.
//!
//! These are local, deterministic failures. Transport errors from the
//! fetch collaborator are never wrapped in this type; they travel through
//! `anyhow::Error` untouched.

use thiserror::Error;

/// Errors raised synchronously by the core operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NozomiError {
    #[error("The tag '{tag}' is invalid: {reason}")]
    InvalidTagFormat { tag: String, reason: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid content URL: {0}")]
    InvalidUrlFormat(String),
}

impl NozomiError {
    /// Recover a core error from an `anyhow::Error` chain, if it is one
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&NozomiError> {
        err.downcast_ref::<NozomiError>()
    }
}

//! The module contains the error the engine can throw.
//!
//! The variants map one-to-one onto the failure classes the REST layer
//! reports:
//!
//! - [`Validation`] malformed or out-of-range input field.
//! - [`InvalidAmount`] / [`InvalidDate`] raw value that cannot be normalized.
//! - [`KeyNotFound`] referenced entity absent.
//! - [`ExistingKey`] unique constraint would be violated.
//! - [`Extraction`] a bill source produced no usable text or rows.
//! - [`NoValidRows`] every row of a batch was rejected.
//! - [`UnsupportedFormat`] wrong file type for the selected parser.
//! - [`Upstream`] external collaborator unreachable or returned garbage.
//!
//! [`Validation`]: EngineError::Validation
//! [`InvalidAmount`]: EngineError::InvalidAmount
//! [`InvalidDate`]: EngineError::InvalidDate
//! [`KeyNotFound`]: EngineError::KeyNotFound
//! [`ExistingKey`]: EngineError::ExistingKey
//! [`Extraction`]: EngineError::Extraction
//! [`NoValidRows`]: EngineError::NoValidRows
//! [`UnsupportedFormat`]: EngineError::UnsupportedFormat
//! [`Upstream`]: EngineError::Upstream
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Extraction failed: {0}")]
    Extraction(String),
    #[error("No valid rows: {0}")]
    NoValidRows(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidDate(a), Self::InvalidDate(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Extraction(a), Self::Extraction(b)) => a == b,
            (Self::NoValidRows(a), Self::NoValidRows(b)) => a == b,
            (Self::UnsupportedFormat(a), Self::UnsupportedFormat(b)) => a == b,
            (Self::Upstream(a), Self::Upstream(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

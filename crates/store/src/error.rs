//! Error types for the data layer.

use thiserror::Error;

/// Errors surfaced by DAOs and services.
///
/// The external façade maps these onto HTTP statuses: `NotFound` → 404,
/// `Conflict` → 409, `Validation` → 422.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Business rule conflict (duplicate name, diverging repo URL)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Input validation or illegal state transition
    #[error("validation: {0}")]
    Validation(String),

    /// Pagination cursor is malformed or has a bad signature
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Underlying database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

//! Error types shared by every layer of the document store.

use thiserror::Error;

/// Result type alias using [`SheetError`]
pub type Result<T> = std::result::Result<T, SheetError>;

/// Failures raised by the persistence boundary.
///
/// Any of these aborts the enclosing mutation; nothing is written when one
/// is returned from inside a locked update.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode document state: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode document state: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("a storage lock was poisoned by a failed writer")]
    Poisoned,
}

/// Coarse classification used by a request layer to choose a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Storage,
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("invalid cell reference: {0}")]
    InvalidCellRef(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("range too large ({cells} cells, max {max})")]
    RangeTooLarge { cells: u64, max: u64 },

    #[error("{0}")]
    Validation(String),

    /// The document (or share) does not exist, or the caller cannot see it.
    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SheetError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        SheetError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SheetError::InvalidCellRef(_)
            | SheetError::InvalidRange(_)
            | SheetError::RangeTooLarge { .. }
            | SheetError::Validation(_) => ErrorKind::Validation,
            SheetError::NotFound => ErrorKind::NotFound,
            SheetError::Forbidden(_) => ErrorKind::Forbidden,
            SheetError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

impl<T> From<std::sync::PoisonError<T>> for SheetError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        SheetError::Storage(StoreError::Poisoned)
    }
}

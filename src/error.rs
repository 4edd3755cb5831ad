use thiserror::Error;

use crate::storage::StorageError;

/// Error taxonomy surfaced by the engine. Everything except `Storage` is a
/// terminal client-facing outcome; `Storage` is the only transient kind and
/// retries, if any, belong below the storage seam.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("slug already taken")]
    Conflict,

    #[error("link not found")]
    NotFound,

    #[error("storage unavailable")]
    Storage(#[from] anyhow::Error),
}

impl From<StorageError> for LinkError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => LinkError::Conflict,
            StorageError::Other(e) => LinkError::Storage(e),
        }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

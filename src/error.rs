use thiserror::Error;
use validator::ValidationErrors;

use crate::{auth::AuthError, dao::storage::StoreError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A shared store read or write failed.
    #[error("store operation failed")]
    Store(#[from] StoreError),
    /// A call to the authentication provider failed.
    #[error("auth operation failed")]
    Auth(#[from] AuthError),
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The referenced track is not present in the cached queue snapshot.
    #[error("track `{0}` is not in the queue")]
    UnknownTrack(String),
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {}", err))
    }
}

use std::error::Error;
use thiserror::Error;

/// Result alias for shared store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by store backends regardless of the underlying transport.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("transaction on `{path}` aborted after {attempts} attempts")]
    TransactionContention { path: String, attempts: u32 },
    #[error("malformed value at `{path}`")]
    Codec {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StoreError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

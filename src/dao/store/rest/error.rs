//! Error types shared by the REST storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StoreError;

/// Convenient result alias returning [`RestDaoError`] failures.
pub type RestResult<T> = Result<T, RestDaoError>;

/// Failures that can occur while talking to the hosted store.
#[derive(Debug, Error)]
pub enum RestDaoError {
    /// Required environment variable is missing.
    #[error("missing store environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build store client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request to a store path could not be sent.
    #[error("failed to send store request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The store returned an unexpected status code.
    #[error("unexpected store response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode store response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The store did not return the ETag required for a transaction.
    #[error("store response for `{path}` is missing an ETag")]
    MissingEtag { path: String },
    /// A transaction kept losing the compare-and-set race.
    #[error("transaction on `{path}` lost the compare-and-set race {attempts} times")]
    CasExhausted { path: String, attempts: u32 },
    /// The change stream ended or delivered an unusable frame.
    #[error("change stream for `{path}` failed: {message}")]
    Stream { path: String, message: String },
}

impl From<RestDaoError> for StoreError {
    fn from(err: RestDaoError) -> Self {
        match err {
            RestDaoError::CasExhausted { path, attempts } => {
                StoreError::TransactionContention { path, attempts }
            }
            other => {
                let message = other.to_string();
                StoreError::unavailable(message, other)
            }
        }
    }
}

use std::time::Duration;

use thiserror::Error;

/// Outcome taxonomy of the coupon store
///
/// `NotExist` and `AlreadyUsed` are terminal user-facing answers and are never
/// retried. `Unavailable` is transient: the backend could not be reached, did
/// not answer in time, or returned a record we could not decode. It is never
/// proof that a coupon does not exist.
///
/// # Example
///
/// ```no_run
/// use cibuscore::StoreError;
///
/// fn reply_for(err: &StoreError) -> &'static str {
///     match err {
///         StoreError::NotExist { .. } => "There is no such coupon",
///         StoreError::AlreadyUsed { .. } => "This coupon was already used",
///         StoreError::Unavailable(_) => "Something went wrong. Please try again",
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum StoreError {
    /// No coupon with this id in either location
    #[error("coupon {id} does not exist")]
    NotExist { id: String },

    /// The coupon is already in the "used" location
    #[error("coupon {id} already used")]
    AlreadyUsed { id: String },

    /// Transient backend failure
    #[error("coupon store unavailable: {0}")]
    Unavailable(#[from] BackendError),
}

impl StoreError {
    pub fn not_exist(id: impl Into<String>) -> Self {
        StoreError::NotExist { id: id.into() }
    }

    pub fn already_used(id: impl Into<String>) -> Self {
        StoreError::AlreadyUsed { id: id.into() }
    }

    /// Only backend failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Low-level failures of a storage backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record is not a valid coupon
    #[error("malformed coupon record {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A single backend call exceeded the configured bound
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    /// A coupon id that cannot be used as a storage key
    #[error("invalid coupon id {0:?}")]
    InvalidId(String),

    /// Object store (S3) request errors
    #[error("object store error: {0}")]
    ObjectStore(String),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;

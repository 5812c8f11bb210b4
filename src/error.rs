/// Error type for failures originated by this crate.
///
/// Errors produced by a caller's operation never pass through this type;
/// [`with_retry`](crate::with_retry) hands them back untouched.
#[derive(Debug, thiserror::Error)]
pub enum NetRetryError {
    /// Connectivity did not return before the wait deadline.
    #[error("timed out after {timeout_ms} ms waiting for network connectivity")]
    WaitTimeout { timeout_ms: u64 },
    /// Retry policy violates its invariants or could not be parsed.
    #[error("invalid retry options: {0}")]
    InvalidOptions(String),
    /// HTTP client setup error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
}

/// Error returned by [`with_retry_when_online`](crate::with_retry_when_online).
#[derive(Debug, thiserror::Error)]
pub enum OnlineRetryError<E> {
    /// The network stayed offline past the wait deadline.
    #[error(transparent)]
    Connectivity(#[from] NetRetryError),
    /// The operation itself failed (non-retryable or retries exhausted).
    #[error("{0}")]
    Operation(E),
}

impl<E> OnlineRetryError<E> {
    /// Returns the operation error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Connectivity(_) => None,
        }
    }
}

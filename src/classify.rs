//! Retry eligibility classification.
//!
//! Platform errors come in many shapes. Callers adapt theirs into
//! [`RetryableError`] so the default predicate can inspect a stable set of
//! fields instead of guessing at them.

use std::borrow::Cow;

/// Message fragments that mark a transport-level failure.
const NETWORK_MARKERS: [&str; 3] = ["network", "fetch", "Failed to fetch"];

/// Error codes reported for aborted or timed-out connections.
const TIMEOUT_CODES: [&str; 2] = ["ECONNABORTED", "ETIMEDOUT"];

/// Capability view of an error used for retry classification.
pub trait RetryableError {
    /// Human-readable failure message.
    fn message(&self) -> Cow<'_, str>;

    /// Response status, if the failure carries one. `0` means the request
    /// never produced a response.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Platform error code such as `ETIMEDOUT`.
    fn code(&self) -> Option<&str> {
        None
    }

    /// Marks a failure that must never be retried (bad credentials, etc).
    fn is_permanent(&self) -> bool {
        false
    }
}

/// Default retry eligibility predicate.
///
/// Retries transport failures, `5xx` / `0` statuses and connection timeouts.
/// Everything else, including any error flagged permanent, fails fast.
pub fn is_retryable<E: RetryableError + ?Sized>(error: &E) -> bool {
    if error.is_permanent() {
        return false;
    }

    let message = error.message();
    if NETWORK_MARKERS.iter().any(|marker| message.contains(marker)) {
        return true;
    }

    if matches!(error.status(), Some(0) | Some(500..)) {
        return true;
    }

    error.code().is_some_and(|code| TIMEOUT_CODES.contains(&code)) || message.contains("timeout")
}

impl<E: RetryableError + ?Sized> RetryableError for &E {
    fn message(&self) -> Cow<'_, str> {
        (**self).message()
    }

    fn status(&self) -> Option<u16> {
        (**self).status()
    }

    fn code(&self) -> Option<&str> {
        (**self).code()
    }

    fn is_permanent(&self) -> bool {
        (**self).is_permanent()
    }
}

/// Plain error record for callers without a richer error type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub permanent: bool,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
            permanent: false,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Flags the error so the default predicate never retries it.
    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }
}

impl RetryableError for PlatformError {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn status(&self) -> Option<u16> {
        self.status
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn is_permanent(&self) -> bool {
        self.permanent
    }
}

impl RetryableError for reqwest::Error {
    fn message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn status(&self) -> Option<u16> {
        match reqwest::Error::status(self) {
            Some(status) => Some(status.as_u16()),
            None if self.is_connect() || self.is_request() => Some(0),
            None => None,
        }
    }

    fn code(&self) -> Option<&str> {
        self.is_timeout().then_some("ETIMEDOUT")
    }
}

//! `netretry` keeps flaky network calls alive.
//!
//! Two independent pieces, usually used together:
//! - [`with_retry`] runs an async operation with bounded retries and capped
//!   exponential backoff, deciding eligibility per error.
//! - [`NetworkMonitor`] tracks online/offline transitions of a
//!   [`ConnectivitySource`], notifies subscribers and offers
//!   [`NetworkMonitor::wait_for_online`].
//!
//! [`with_retry_when_online`] chains the two: wait for connectivity, then retry.

mod classify;
mod error;
mod monitor;
mod options;
mod probe;
mod retry;

pub mod platform;

pub use classify::{is_retryable, PlatformError, RetryableError};
pub use error::{NetRetryError, OnlineRetryError};
pub use monitor::{NetworkMonitor, StatusCallback, Subscription};
pub use options::{OnRetry, RetryCondition, RetryOptions, RetryPolicy};
pub use platform::{Connectivity, ConnectivityEvent, ConnectivitySource};
pub use probe::{HttpProbe, ProbeOptions};
pub use retry::{with_retry, with_retry_when_online};

pub type Result<T> = std::result::Result<T, NetRetryError>;

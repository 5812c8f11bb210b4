use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{classify, NetRetryError, Result, RetryableError};

/// Decides whether a failed attempt should be retried.
pub type RetryCondition<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Side effect run before each backoff sleep, with the failed attempt number.
pub type OnRetry<E> = Arc<dyn Fn(u32, &E) + Send + Sync>;

const ENV_MAX_RETRIES: &str = "NETRETRY_MAX_RETRIES";
const ENV_INITIAL_DELAY_MS: &str = "NETRETRY_INITIAL_DELAY_MS";
const ENV_MAX_DELAY_MS: &str = "NETRETRY_MAX_DELAY_MS";
const ENV_BACKOFF_FACTOR: &str = "NETRETRY_BACKOFF_FACTOR";

/// Configures attempt count and exponential backoff.
///
/// Every field has a default, so a partial config document only overrides
/// what it names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Parses a (possibly partial) JSON policy and validates it.
    ///
    /// ```
    /// use netretry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::from_json_str(r#"{ "max_retries": 5 }"#).unwrap();
    /// assert_eq!(policy.max_retries, 5);
    /// assert_eq!(policy.initial_delay_ms, 1_000);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(json)
            .map_err(|err| NetRetryError::InvalidOptions(format!("invalid policy JSON: {err}")))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reads a policy from environment variables.
    ///
    /// Reads:
    /// - `NETRETRY_MAX_RETRIES`
    /// - `NETRETRY_INITIAL_DELAY_MS`
    /// - `NETRETRY_MAX_DELAY_MS`
    /// - `NETRETRY_BACKOFF_FACTOR`
    ///
    /// Unset variables keep their defaults. Returns an error if a value does
    /// not parse or the resulting policy is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut policy = Self::default();
        if let Some(value) = parse_var(&lookup, ENV_MAX_RETRIES)? {
            policy.max_retries = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_INITIAL_DELAY_MS)? {
            policy.initial_delay_ms = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_DELAY_MS)? {
            policy.max_delay_ms = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_BACKOFF_FACTOR)? {
            policy.backoff_factor = value;
        }
        policy.validate()?;
        Ok(policy)
    }

    /// Checks attempt count, delay ordering and backoff factor.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(NetRetryError::InvalidOptions(
                "max_retries must be at least 1".to_owned(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(NetRetryError::InvalidOptions(format!(
                "max_delay_ms ({}) is smaller than initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor <= 1.0 {
            return Err(NetRetryError::InvalidOptions(format!(
                "backoff_factor must be a finite number above 1, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    /// Delay after the given failed attempt (1-indexed):
    /// `min(initial * factor^(attempt - 1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent);
        Duration::from_millis(raw.min(self.max_delay_ms as f64) as u64)
    }

    /// Attempt count with the lower bound of one applied.
    pub(crate) fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|err| NetRetryError::InvalidOptions(format!("{key}={trimmed}: {err}")))
}

/// Full retry configuration: a [`RetryPolicy`] plus the eligibility
/// predicate and the retry hook.
pub struct RetryOptions<E> {
    pub policy: RetryPolicy,
    retry_condition: RetryCondition<E>,
    on_retry: OnRetry<E>,
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            retry_condition: Arc::clone(&self.retry_condition),
            on_retry: Arc::clone(&self.on_retry),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("policy", &self.policy)
            .field("retry_condition", &"<fn>")
            .field("on_retry", &"<fn>")
            .finish()
    }
}

impl<E: RetryableError + 'static> Default for RetryOptions<E> {
    fn default() -> Self {
        Self::with_condition(|err: &E| classify::is_retryable(err))
    }
}

impl<E: RetryableError + 'static> RetryOptions<E> {
    /// Default predicate and hook over the given policy.
    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self::default().policy(policy)
    }
}

impl<E: 'static> RetryOptions<E> {
    /// Builds options for any error type with a caller-supplied predicate.
    pub fn with_condition<F>(retry_condition: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            policy: RetryPolicy::default(),
            retry_condition: Arc::new(retry_condition),
            on_retry: Arc::new(|_: u32, _: &E| {}),
        }
    }

    /// Replaces the whole numeric policy.
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay_ms = duration_ms(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay_ms = duration_ms(delay);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.policy.backoff_factor = factor;
        self
    }

    pub fn retry_condition<F>(mut self, retry_condition: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Arc::new(retry_condition);
        self
    }

    pub fn on_retry<F>(mut self, on_retry: F) -> Self
    where
        F: Fn(u32, &E) + Send + Sync + 'static,
    {
        self.on_retry = Arc::new(on_retry);
        self
    }
}

impl<E> RetryOptions<E> {
    pub(crate) fn should_retry(&self, error: &E) -> bool {
        (self.retry_condition)(error)
    }

    pub(crate) fn notify_retry(&self, attempt: u32, error: &E) {
        (self.on_retry)(attempt, error)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

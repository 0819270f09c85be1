//! Retry strategies for opening the connection
//!
//! A single `connect()` may try to open the socket more than once before it
//! gives up and the connection enters `Failed`. After each failed try the
//! connection asks its strategy how long to wait, passing the number of
//! retries made so far; `None` ends the attempt with the last error.
//!
//! Strategies are pure functions of that count, so one strategy serves every
//! connect attempt of a client without being reset. Retrying stops early
//! when the attempt is abandoned by `disconnect()`.
//!
//! Once a connection has been established and later lost, nothing
//! reconnects on its own; the application calls `connect()` again.
//!
//! # Built-in Strategies
//!
//! - **NoRetry**: One try per connect (default)
//! - **ExponentialBackoff**: Doubling delays up to a cap
//! - **FixedDelay**: Constant delay between tries
//!
//! # Examples
//!
//! ```rust
//! use wingrpc_client::{ExponentialBackoff, RpcClient};
//! use std::time::Duration;
//!
//! let client = RpcClient::builder()
//!     .with_connect_retry(Box::new(
//!         ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(5))
//!             .with_max_attempts(4),
//!     ))
//!     .build();
//! ```

use std::time::Duration;

/// Decides whether and when to retry a failed socket open
pub trait RetryStrategy: Send + Sync {
    /// Delay before retry number `retries + 1`, or `None` to give up
    ///
    /// `retries` counts the retries already made in this connect attempt,
    /// starting at 0 after the first failed try.
    fn next_delay(&self, retries: u32) -> Option<Duration>;
}

/// Doubling delay starting at `initial`, capped at `max`
///
/// Retries without limit unless `with_max_attempts` is set.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            max_attempts: None,
            jitter: false,
        }
    }

    /// Give up after `max_attempts` retries
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Stretch every delay by a random 0-25%
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    fn base_delay(&self, retries: u32) -> Duration {
        // Past 2^31 the factor saturates; the cap applies long before.
        let factor = 1u32.checked_shl(retries).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// 100ms doubling to 30s, at most 10 retries, with jitter
impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
            .with_max_attempts(10)
            .with_jitter()
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, retries: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| retries >= max) {
            return None;
        }

        let delay = self.base_delay(retries);
        if !self.jitter {
            return Some(delay);
        }

        use rand::Rng;
        let stretch = rand::thread_rng().gen_range(0.0..=0.25);
        Some(delay.mul_f64(1.0 + stretch))
    }
}

/// The same delay before every retry
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Retry without limit, waiting `delay` each time
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` retries
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, retries: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if retries >= max => None,
            _ => Some(self.delay),
        }
    }
}

/// Never retry: a failed open fails the connect
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&self, _retries: u32) -> Option<Duration> {
        None
    }
}

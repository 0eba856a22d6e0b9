/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{self, Error};

const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_READS_PER_ATTEMPT: u32 = 5;
const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(1);

/// Delay applied between two probe attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// `attempt² × base`
    Quadratic(Duration),
    /// The same delay after every attempt
    Fixed(Duration),
    /// Caller supplied schedule, given the 1-based attempt that just failed
    Custom(fn(u32) -> Duration),
}

impl Backoff {
    /// The delay to wait after the given (1-based) attempt failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Quadratic(base) => base.saturating_mul(attempt.saturating_mul(attempt)),
            Backoff::Fixed(delay) => *delay,
            Backoff::Custom(schedule) => schedule(attempt),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Quadratic(DEFAULT_BASE_INTERVAL)
    }
}

/// Settings for the convergence prober
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    max_attempts: u32,
    reads_per_attempt: u32,
    backoff: Backoff,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reads_per_attempt: DEFAULT_READS_PER_ATTEMPT,
            backoff: Backoff::default(),
        }
    }
}

impl ProbeConfig {
    /// Create a new `ProbeConfig` builder
    pub fn builder() -> ProbeConfigBuilder {
        ProbeConfigBuilder::default()
    }

    /// Maximum number of attempts before giving up
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of identical reads required within one attempt
    pub fn reads_per_attempt(&self) -> u32 {
        self.reads_per_attempt
    }

    /// Delay schedule between attempts
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

/// Fluent style builder for [ProbeConfig]
#[derive(Debug, Clone, Default)]
pub struct ProbeConfigBuilder {
    config: ProbeConfig,
}

impl ProbeConfigBuilder {
    /// Maximum number of attempts. Values below 1 are raised to 1.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts.max(1);
        self
    }

    /// Number of consecutive identical reads required to call a value stable.
    /// Values below 1 are raised to 1.
    pub fn reads_per_attempt(mut self, reads: u32) -> Self {
        self.config.reads_per_attempt = reads.max(1);
        self
    }

    /// Use quadratic backoff (`attempt² × interval`) with the given base interval.
    pub fn base_interval(mut self, interval: Duration) -> Self {
        self.config.backoff = Backoff::Quadratic(interval);
        self
    }

    /// Replace the delay schedule.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Consumes the builder and constructs a [`ProbeConfig`]
    pub fn build(self) -> ProbeConfig {
        self.config
    }
}

/// The outcome of a probe.
///
/// `stable == false` means the attempts ran out and `value` is the last value observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probed<T> {
    value: T,
    stable: bool,
    attempts: u32,
    elapsed: Duration,
}

impl<T> Probed<T> {
    /// The last value observed
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether the value converged
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// The number of attempts performed
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wall clock time spent probing, including backoff
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Consume and return the value regardless of stability.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Return the value if it converged,
    /// [`ErrorKind::ConsistencyTimeout`](crate::error::ErrorKind::ConsistencyTimeout) otherwise.
    pub fn into_stable(self, what: &str) -> Result<T, Error> {
        if self.stable {
            Ok(self.value)
        } else {
            tracing::warn!(
                "{what} did not converge after {} attempts ({:?})",
                self.attempts,
                self.elapsed
            );
            Err(error::consistency_timeout(what, self.attempts, self.elapsed))
        }
    }
}

/// Repeated-read stability polling with backoff.
///
/// Within an attempt every read must equal the first one and the first one must satisfy the
/// stability predicate. Between attempts the prober sleeps according to its [`Backoff`]. A read
/// that fails aborts the probe: API errors are not consistency issues.
#[derive(Debug, Clone, Default)]
pub struct Prober {
    config: ProbeConfig,
}

impl Prober {
    /// Create a prober from its settings
    pub fn new(config: ProbeConfig) -> Self {
        Prober { config }
    }

    /// The settings of this prober
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Poll `read` until it returns the same stable value `reads_per_attempt` times in a row.
    pub async fn probe<T, F, Fut, S>(&self, mut read: F, is_stable: S) -> Result<Probed<T>, Error>
    where
        T: PartialEq,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
        S: Fn(&T) -> bool,
    {
        let start = Instant::now();
        let mut attempt = 1;
        loop {
            let first = read().await?;
            let mut converged = is_stable(&first);
            let mut last = first;
            let mut reads = 1;
            while converged && reads < self.config.reads_per_attempt {
                let next = read().await?;
                converged = next == last;
                last = next;
                reads += 1;
            }

            if converged || attempt >= self.config.max_attempts {
                tracing::trace!(attempt, stable = converged, "probe finished");
                return Ok(Probed {
                    value: last,
                    stable: converged,
                    attempts: attempt,
                    elapsed: start.elapsed(),
                });
            }

            let delay = self.config.backoff.delay(attempt);
            tracing::trace!(attempt, ?delay, "value not stable yet, backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Repeat a whole write cycle until `accept` holds for its output or attempts run out.
    ///
    /// `write` receives the 1-based attempt number. Write errors abort immediately.
    pub async fn retry_write<T, F, Fut, A>(
        &self,
        mut write: F,
        accept: A,
    ) -> Result<Probed<T>, Error>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
        A: Fn(&T) -> bool,
    {
        let start = Instant::now();
        let mut attempt = 1;
        loop {
            let output = write(attempt).await?;
            let accepted = accept(&output);
            if accepted || attempt >= self.config.max_attempts {
                return Ok(Probed {
                    value: output,
                    stable: accepted,
                    attempts: attempt,
                    elapsed: start.elapsed(),
                });
            }

            let delay = self.config.backoff.delay(attempt);
            tracing::debug!(attempt, ?delay, "write not accepted, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn instant_prober(max_attempts: u32, reads: u32) -> Prober {
        Prober::new(
            ProbeConfig::builder()
                .max_attempts(max_attempts)
                .reads_per_attempt(reads)
                .base_interval(Duration::ZERO)
                .build(),
        )
    }

    #[test]
    fn test_quadratic_backoff() {
        let backoff = Backoff::Quadratic(Duration::from_millis(100));
        assert_eq!(Duration::from_millis(100), backoff.delay(1));
        assert_eq!(Duration::from_millis(400), backoff.delay(2));
        assert_eq!(Duration::from_millis(900), backoff.delay(3));
    }

    #[tokio::test]
    async fn test_first_attempt_stable() {
        let prober = instant_prober(10, 5);
        let reads = Arc::new(AtomicU32::new(0));
        let counter = reads.clone();
        let probed = prober
            .probe(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, Error>(42) }
                },
                |_| true,
            )
            .await
            .unwrap();

        assert!(probed.is_stable());
        assert_eq!(1, probed.attempts());
        assert_eq!(5, reads.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_flapping_reads_restart_attempt() {
        // reads alternate until the 8th read, after which they settle on "b"
        let prober = instant_prober(10, 3);
        let reads = Arc::new(AtomicU32::new(0));
        let counter = reads.clone();
        let probed = prober
            .probe(
                || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    let value = if n < 8 && n % 2 == 0 { "a" } else { "b" };
                    async move { Ok::<_, Error>(value) }
                },
                |_| true,
            )
            .await
            .unwrap();

        assert!(probed.is_stable());
        assert_eq!(&"b", probed.value());
        assert!(probed.attempts() > 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_value() {
        let prober = instant_prober(3, 2);
        let probed = prober
            .probe(|| async { Ok::<_, Error>(None::<&str>) }, Option::is_some)
            .await
            .unwrap();

        assert!(!probed.is_stable());
        assert_eq!(3, probed.attempts());
        assert_eq!(&None, probed.value());

        let err = probed.into_stable("versioning status").unwrap_err();
        assert_eq!(&ErrorKind::ConsistencyTimeout, err.kind());
    }

    #[tokio::test]
    async fn test_read_error_aborts() {
        let prober = instant_prober(10, 5);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = prober
            .probe(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err::<u8, _>(error::invalid_input("boom")) }
                },
                |_| true,
            )
            .await
            .unwrap_err();

        assert_eq!(&ErrorKind::InputInvalid, err.kind());
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_retry_write_until_accepted() {
        let prober = instant_prober(5, 1);
        let probed = prober
            .retry_write(
                |attempt| async move { Ok::<_, Error>(attempt) },
                |attempt| *attempt == 3,
            )
            .await
            .unwrap();
        assert!(probed.is_stable());
        assert_eq!(3, probed.into_value());
    }
}

//! # Retry Policy Engine
//!
//! ## Overview
//!
//! Handlers declare an optional [`RetryConfiguration`] on their type; the
//! registry resolves it into a [`RetryPolicy`] once per handler type and
//! memoizes the result for the life of the process. The attempt loop is
//! synchronous: a failed attempt sleeps on the calling thread for the
//! configured delay, then the whole stage sequence runs again.
//!
//! ## Backoff law
//!
//! The delay starts at `interval`. Without a ceiling the delay is fixed. With
//! a ceiling configured, the delay after retry *n* (0-based) is
//! `min(interval * 1.2^n, ceiling)`. With the defaults (3 attempts, 20ms) a
//! 25ms ceiling produces the sleep sequence 20ms, 24ms, 25ms, 25ms, ...
//!
//! ## Exclusions
//!
//! An error whose [`ErrorKind`] appears in `not_retry_on` (checked on the
//! error itself and on every `HandlerError` in its cause chain) is never
//! retried; it re-raises immediately, exactly as received. Exhausting the
//! attempts re-raises the last error the same way - callers never see a
//! retry-driver wrapper.

use std::any::TypeId;
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorKind, HandlerError};

/// Growth ratio applied per retry once a backoff ceiling is configured.
pub const BACKOFF_MULTIPLIER: f64 = 1.2;

/// Declarative per-handler-type retry configuration.
///
/// The declaration lives on the handler type (via
/// [`Handler::retry_configuration`](crate::Handler::retry_configuration)) and
/// must not vary between instances: the registry resolves it once per type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfiguration {
    /// Maximum number of attempts, first one included.
    pub max_attempts: u32,

    /// Fixed delay, or the starting delay once a ceiling enables backoff.
    pub interval: Duration,

    /// Setting a ceiling enables exponential backoff up to it.
    pub exponential_backoff_max_interval: Option<Duration>,

    /// Error kinds that must never be retried.
    pub not_retry_on: Vec<ErrorKind>,
}

impl Default for RetryConfiguration {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_millis(20),
            exponential_backoff_max_interval: None,
            not_retry_on: vec![ErrorKind::Validation],
        }
    }
}

impl RetryConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff_ceiling(mut self, ceiling: Duration) -> Self {
        self.exponential_backoff_max_interval = Some(ceiling);
        self
    }

    pub fn with_not_retry_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.not_retry_on = kinds.into_iter().collect();
        self
    }
}

/// A resolved, immutable policy cached per handler type.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfiguration,
}

impl RetryPolicy {
    fn resolve(config: RetryConfiguration) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Delay slept after the given 0-based attempt index fails.
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.config.exponential_backoff_max_interval {
            None => self.config.interval,
            Some(ceiling) => {
                let grown = self
                    .config
                    .interval
                    .mul_f64(BACKOFF_MULTIPLIER.powi(retry as i32));
                grown.min(ceiling)
            }
        }
    }

    /// Whether the error (or any `HandlerError` in its cause chain) carries
    /// an excluded kind.
    pub fn is_excluded(&self, error: &HandlerError) -> bool {
        if self.config.not_retry_on.contains(&error.kind()) {
            return true;
        }
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            if let Some(nested) = cause.downcast_ref::<HandlerError>() {
                if self.config.not_retry_on.contains(&nested.kind()) {
                    return true;
                }
            }
            source = cause.source();
        }
        false
    }
}

/// Memoizing per-handler-type policy cache plus the attempt driver.
///
/// The cache is keyed by type identity and is safe to populate concurrently;
/// each pipeline owns one by default, and pipelines can share one so command
/// and query handlers resolve against the same cache.
#[derive(Debug, Default)]
pub struct RetryRegistry {
    cache: DashMap<TypeId, Option<RetryPolicy>>,
}

impl RetryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves (and memoizes) the policy for a handler type. `declare` runs
    /// at most once per key.
    pub fn resolve(
        &self,
        handler_type: TypeId,
        declare: impl FnOnce() -> Option<RetryConfiguration>,
    ) -> Option<RetryPolicy> {
        self.cache
            .entry(handler_type)
            .or_insert_with(|| declare().map(RetryPolicy::resolve))
            .value()
            .clone()
    }

    /// Runs `attempt_fn` under the handler type's policy, passing the current
    /// 0-based attempt index. Without a declared policy the function runs
    /// exactly once and its outcome is returned directly.
    pub fn with_optional_retry<T>(
        &self,
        handler_type: TypeId,
        declare: impl FnOnce() -> Option<RetryConfiguration>,
        mut attempt_fn: impl FnMut(u32) -> Result<T, HandlerError>,
    ) -> Result<T, HandlerError> {
        let Some(policy) = self.resolve(handler_type, declare) else {
            return attempt_fn(0);
        };

        let mut attempt = 0u32;
        loop {
            match attempt_fn(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if policy.is_excluded(&error) || attempt + 1 >= policy.max_attempts() {
                        return Err(error);
                    }
                    let delay = policy.delay_for(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, sleeping before retry"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Violations;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct NoRetries;
    struct RetryWithDefaults;
    struct RetryWithCustomConfig;
    struct RetryWithBackoff;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_backoff_curve_matches_ratio_law() {
        let policy = RetryPolicy::resolve(
            RetryConfiguration::new()
                .with_max_attempts(5)
                .with_backoff_ceiling(ms(25)),
        );
        assert_eq!(policy.delay_for(0), ms(20));
        assert_eq!(policy.delay_for(1), ms(24));
        assert_eq!(policy.delay_for(2), ms(25));
        assert_eq!(policy.delay_for(3), ms(25));
    }

    #[test]
    fn test_fixed_delay_without_ceiling() {
        let policy = RetryPolicy::resolve(RetryConfiguration::new());
        assert_eq!(policy.delay_for(0), ms(20));
        assert_eq!(policy.delay_for(7), ms(20));
    }

    #[test]
    fn test_no_declared_policy_runs_exactly_once() {
        let registry = RetryRegistry::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), HandlerError> = registry.with_optional_retry(
            TypeId::of::<NoRetries>(),
            || None,
            |attempt| {
                assert_eq!(attempt, 0);
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::execution("always fails"))
            },
        );

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_policy_runs_three_attempts() {
        let registry = RetryRegistry::new();
        let attempts = Mutex::new(Vec::new());

        let result: Result<(), HandlerError> = registry.with_optional_retry(
            TypeId::of::<RetryWithDefaults>(),
            || Some(RetryConfiguration::new().with_interval(ms(1))),
            |attempt| {
                attempts.lock().unwrap().push(attempt);
                Err(HandlerError::execution("always fails"))
            },
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Execution);
        assert_eq!(*attempts.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_success_stops_retrying() {
        let registry = RetryRegistry::new();
        let calls = AtomicU32::new(0);

        let result = registry.with_optional_retry(
            TypeId::of::<RetryWithDefaults>(),
            || Some(RetryConfiguration::new().with_interval(ms(1))),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 1 {
                    Err(HandlerError::execution("flaky"))
                } else {
                    Ok("recovered")
                }
            },
        );

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_excluded_kind_is_never_retried() {
        let registry = RetryRegistry::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), HandlerError> = registry.with_optional_retry(
            TypeId::of::<RetryWithDefaults>(),
            || Some(RetryConfiguration::new().with_interval(ms(1))),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::validation(Violations::single("deterministic")))
            },
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exclusion_walks_the_cause_chain() {
        let policy = RetryPolicy::resolve(RetryConfiguration::new());
        let nested = HandlerError::Verification {
            source: Box::new(HandlerError::validation(Violations::single("inner"))),
        };
        assert!(policy.is_excluded(&nested));
    }

    #[test]
    fn test_custom_exclusions_replace_defaults() {
        let registry = RetryRegistry::new();
        let config = || {
            Some(
                RetryConfiguration::new()
                    .with_max_attempts(2)
                    .with_interval(ms(1))
                    .with_not_retry_on([ErrorKind::Execution]),
            )
        };

        let execution_calls = AtomicU32::new(0);
        let result: Result<(), HandlerError> = registry.with_optional_retry(
            TypeId::of::<RetryWithCustomConfig>(),
            config,
            |_| {
                execution_calls.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::execution("excluded"))
            },
        );
        assert!(result.is_err());
        assert_eq!(execution_calls.load(Ordering::SeqCst), 1);

        let verification_calls = AtomicU32::new(0);
        let result: Result<(), HandlerError> = registry.with_optional_retry(
            TypeId::of::<RetryWithCustomConfig>(),
            config,
            |_| {
                verification_calls.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::verification("not excluded"))
            },
        );
        assert!(result.is_err());
        assert_eq!(verification_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolution_is_memoized_per_type() {
        let registry = RetryRegistry::new();
        let declarations = AtomicU32::new(0);
        let declare = || {
            declarations.fetch_add(1, Ordering::SeqCst);
            Some(RetryConfiguration::new().with_interval(ms(1)))
        };

        for _ in 0..3 {
            let _: Result<(), HandlerError> =
                registry.with_optional_retry(TypeId::of::<RetryWithBackoff>(), declare, |_| {
                    Ok(())
                });
        }

        assert_eq!(declarations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhaustion_returns_the_last_error_as_is() {
        let registry = RetryRegistry::new();

        let result: Result<(), HandlerError> = registry.with_optional_retry(
            TypeId::of::<RetryWithDefaults>(),
            || Some(RetryConfiguration::new().with_interval(ms(1))),
            |attempt| Err(HandlerError::execution(format!("failure #{attempt}"))),
        );

        // the last attempt's error, not a retry wrapper
        assert_eq!(result.unwrap_err().to_string(), "failure #2");
    }

    proptest! {
        #[test]
        fn prop_backoff_never_exceeds_ceiling(
            interval_ms in 1u64..100,
            extra_ms in 0u64..100,
            retry in 0u32..16,
        ) {
            let ceiling = ms(interval_ms + extra_ms);
            let policy = RetryPolicy::resolve(
                RetryConfiguration::new()
                    .with_interval(ms(interval_ms))
                    .with_backoff_ceiling(ceiling),
            );
            prop_assert!(policy.delay_for(retry) <= ceiling);
        }

        #[test]
        fn prop_backoff_is_monotonic(
            interval_ms in 1u64..100,
            extra_ms in 0u64..100,
            retry in 0u32..15,
        ) {
            let policy = RetryPolicy::resolve(
                RetryConfiguration::new()
                    .with_interval(ms(interval_ms))
                    .with_backoff_ceiling(ms(interval_ms + extra_ms)),
            );
            prop_assert!(policy.delay_for(retry + 1) >= policy.delay_for(retry));
        }
    }
}

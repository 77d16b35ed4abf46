//! Consumed metrics surface.
//!
//! The pipeline owns the timing (one measurement per attempt, tagged with the
//! handler label and the 0-based attempt index) and reports observations to
//! whatever sink the application wires in. Query timeouts are additionally
//! counted on their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

/// Sink for per-attempt timing observations and the query timeout counter.
pub trait HandlerMetrics: Send + Sync {
    fn record_command(&self, handler: &str, attempt: u32, elapsed: Duration);

    fn record_query(&self, handler: &str, attempt: u32, elapsed: Duration);

    /// A query execution raised a timeout-shaped error.
    fn count_timeout(&self);
}

/// Discards all observations. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl HandlerMetrics for NoopMetrics {
    fn record_command(&self, _handler: &str, _attempt: u32, _elapsed: Duration) {}

    fn record_query(&self, _handler: &str, _attempt: u32, _elapsed: Duration) {}

    fn count_timeout(&self) {}
}

/// Emits observations as `tracing` debug events and keeps a timeout tally.
/// Useful when no real metrics registry is wired in yet.
#[derive(Debug, Default)]
pub struct TracingMetrics {
    timeouts: AtomicU64,
}

impl TracingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

impl HandlerMetrics for TracingMetrics {
    fn record_command(&self, handler: &str, attempt: u32, elapsed: Duration) {
        debug!(
            cqs.handler = handler,
            attempt,
            elapsed_us = elapsed.as_micros() as u64,
            "command attempt timed"
        );
    }

    fn record_query(&self, handler: &str, attempt: u32, elapsed: Duration) {
        debug!(
            cqs.handler = handler,
            attempt,
            elapsed_us = elapsed.as_micros() as u64,
            "query attempt timed"
        );
    }

    fn count_timeout(&self) {
        let total = self.timeouts.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, "query timeout observed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_metrics_counts_timeouts() {
        let metrics = TracingMetrics::new();
        assert_eq!(metrics.timeouts(), 0);
        metrics.count_timeout();
        metrics.count_timeout();
        assert_eq!(metrics.timeouts(), 2);
    }
}

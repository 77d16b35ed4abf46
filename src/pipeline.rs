//! # Handler Orchestration Pipeline
//!
//! ## Overview
//!
//! Wraps any capability-typed handler with the fixed lifecycle:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ validate │───▶│  verify  │───▶│ execute  │   (once per attempt)
//! └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! Each attempt is timed and reported to the metrics sink tagged with the
//! handler label and the 0-based attempt index; the retry driver decides
//! whether a failed attempt runs again. The terminal outcome - the response,
//! or the last taxonomy error once attempts are exhausted - is logged with
//! the rendered input attached and handed back to the caller.
//!
//! [`CommandPipeline`] and [`QueryPipeline`] are two parallel instances of
//! the same protocol; the only difference is that the query path remaps
//! timeout-shaped execution errors to [`HandlerError::Timeout`] and counts
//! them separately.
//!
//! A failed attempt's partial side effects are the handler's own concern;
//! the pipeline never rolls anything back.

use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{HandlerError, HandlerResult};
use crate::handler::{Command, Handler, Input, Query, Response};
use crate::logging;
use crate::metrics::{HandlerMetrics, NoopMetrics};
use crate::render::{short_type_name, try_render};
use crate::retry::RetryRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathKind {
    Command,
    Query,
}

/// Orchestrates command handlers.
#[derive(Debug, Default)]
pub struct CommandPipeline<M: HandlerMetrics = NoopMetrics> {
    metrics: M,
    retries: Arc<RetryRegistry>,
}

impl CommandPipeline<NoopMetrics> {
    pub fn new() -> Self {
        Self::with_metrics(NoopMetrics)
    }
}

impl<M: HandlerMetrics> CommandPipeline<M> {
    pub fn with_metrics(metrics: M) -> Self {
        Self {
            metrics,
            retries: Arc::new(RetryRegistry::new()),
        }
    }

    /// Builds a pipeline sharing a retry registry, so command and query
    /// handlers resolve policies against the same cache.
    pub fn with_retry_registry(metrics: M, retries: Arc<RetryRegistry>) -> Self {
        Self { metrics, retries }
    }

    pub fn retry_registry(&self) -> Arc<RetryRegistry> {
        Arc::clone(&self.retries)
    }

    /// Runs the full lifecycle for one command. The caller only ever observes
    /// a response or one of the taxonomy errors.
    pub fn execute<C, H>(&self, handler: &H, command: &C) -> HandlerResult<H::Response>
    where
        C: Command,
        H: Handler<C> + 'static,
    {
        orchestrate(
            PathKind::Command,
            &self.metrics,
            &self.retries,
            handler,
            command,
        )
    }
}

/// Orchestrates query handlers. Identical protocol to [`CommandPipeline`]
/// except for the query-only timeout remapping.
#[derive(Debug, Default)]
pub struct QueryPipeline<M: HandlerMetrics = NoopMetrics> {
    metrics: M,
    retries: Arc<RetryRegistry>,
}

impl QueryPipeline<NoopMetrics> {
    pub fn new() -> Self {
        Self::with_metrics(NoopMetrics)
    }
}

impl<M: HandlerMetrics> QueryPipeline<M> {
    pub fn with_metrics(metrics: M) -> Self {
        Self {
            metrics,
            retries: Arc::new(RetryRegistry::new()),
        }
    }

    pub fn with_retry_registry(metrics: M, retries: Arc<RetryRegistry>) -> Self {
        Self { metrics, retries }
    }

    pub fn retry_registry(&self) -> Arc<RetryRegistry> {
        Arc::clone(&self.retries)
    }

    /// Runs the full lifecycle for one query.
    pub fn execute<Q, H>(&self, handler: &H, query: &Q) -> HandlerResult<H::Response>
    where
        Q: Query,
        H: Handler<Q> + 'static,
    {
        orchestrate(
            PathKind::Query,
            &self.metrics,
            &self.retries,
            handler,
            query,
        )
    }
}

fn orchestrate<I, H, M>(
    path: PathKind,
    metrics: &M,
    retries: &RetryRegistry,
    handler: &H,
    input: &I,
) -> HandlerResult<H::Response>
where
    I: Input,
    H: Handler<I> + 'static,
    M: HandlerMetrics,
{
    let handler_label = short_type_name::<H>();
    let input_label = short_type_name::<I>();
    // best effort: a rendering failure must never abort the operation
    let rendered_input =
        try_render(input).unwrap_or_else(|| format!("{input_label}(<unrenderable>)"));

    let result = retries.with_optional_retry(
        TypeId::of::<H>(),
        || handler.retry_configuration(),
        |attempt| {
            let started = Instant::now();
            let outcome = run_stages(path, metrics, handler, input);
            let elapsed = started.elapsed();
            match path {
                PathKind::Command => metrics.record_command(handler_label, attempt, elapsed),
                PathKind::Query => metrics.record_query(handler_label, attempt, elapsed),
            }
            outcome
        },
    );

    match result {
        Ok(response) => {
            logging::log_success(
                handler_label,
                input_label,
                &rendered_input,
                response.as_loggable(),
            );
            Ok(response)
        }
        Err(error) => {
            logging::log_failure(handler_label, input_label, &rendered_input, &error);
            Err(error)
        }
    }
}

/// One attempt: validate, verify, execute, with per-stage error mapping.
fn run_stages<I, H, M>(
    path: PathKind,
    metrics: &M,
    handler: &H,
    input: &I,
) -> HandlerResult<H::Response>
where
    I: Input,
    H: Handler<I>,
    M: HandlerMetrics,
{
    // structural validation: no handler code runs when the input is malformed
    let violations = Input::validate(input);
    if !violations.is_empty() {
        return Err(HandlerError::validation(violations));
    }

    handler
        .validate(input)
        .map_err(HandlerError::coerce_validation)?;

    handler
        .verify(input)
        .map_err(HandlerError::coerce_verification)?;

    match handler.execute(input) {
        Ok(Some(response)) => Ok(response),
        Ok(None) => <H::Response as Response>::empty()
            .ok_or_else(|| HandlerError::execution("response must not be null")),
        Err(error) => Err(match path {
            PathKind::Command => HandlerError::coerce_execution(error),
            PathKind::Query => {
                HandlerError::coerce_query_execution(error, || metrics.count_timeout())
            }
        }),
    }
}

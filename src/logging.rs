//! # Structured Logging Glue
//!
//! Emits one structured record per pipeline invocation outcome. The rendered
//! input travels as the `cqs.command` attribute (and the rendered result as
//! `cqs.result`) rather than being interpolated into the message, so log
//! aggregation can query on them. The handler label travels as `cqs.handler`
//! for per-handler filtering.

use std::sync::OnceLock;

use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::HandlerError;
use crate::render::{try_render, Loggable};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging with environment-specific defaults.
///
/// `RUST_LOG` wins when set; otherwise the level falls back to `info` in
/// production and `debug` everywhere else. Safe to call more than once, and
/// tolerant of a subscriber having been installed by the host application.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let default_level = match environment.as_str() {
            "production" => "info",
            _ => "debug",
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter),
        );

        if subscriber.try_init().is_err() {
            // A global subscriber is already set by the host application.
            // This is not an error - continue normally
            tracing::debug!("global tracing subscriber already initialized, keeping it");
        }

        tracing::info!(environment = %environment, "🔧 cqs pipeline logging initialized");
    });
}

fn get_environment() -> String {
    std::env::var("CQS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Success record: handler label, rendered input, rendered result when the
/// response is loggable. Result rendering is best-effort; a failure there is
/// warned about inside `try_render` and never masks the success.
pub(crate) fn log_success(
    handler: &str,
    input_type: &str,
    rendered_input: &str,
    result: Option<&dyn Loggable>,
) {
    let rendered_result = result.and_then(try_render);
    info!(
        cqs.handler = handler,
        cqs.command = rendered_input,
        cqs.result = rendered_result.as_deref(),
        "Successfully executed {input_type}."
    );
}

/// Failure record for a terminal (post-retry) error.
pub(crate) fn log_failure(
    handler: &str,
    input_type: &str,
    rendered_input: &str,
    error: &HandlerError,
) {
    warn!(
        cqs.handler = handler,
        cqs.command = rendered_input,
        error = %error,
        "Failed to execute {input_type}."
    );
}

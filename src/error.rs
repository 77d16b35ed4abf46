//! # Handler Error Taxonomy
//!
//! Every failure surfacing from a pipeline invocation is one of four kinds,
//! each signalling the stage that failed: validation, verification, execution,
//! or a timeout during execution. Stages wrap unknown errors into their own
//! kind but pass through errors that already carry the right kind, so nothing
//! gets double-wrapped and the original cause chain stays intact for
//! diagnostics.

use std::io;

use serde::{Deserialize, Serialize};

use crate::validation::Violations;

/// Boxed error type accepted from handler code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for pipeline outcomes.
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// The stage-failure kind of a [`HandlerError`].
///
/// Retry exclusion lists match on kinds rather than concrete error types, so
/// handler code never needs to name pipeline internals to opt a failure out
/// of retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Structural violations on the input, or a failing `validate` hook.
    Validation,
    /// A failing `verify` hook.
    Verification,
    /// A failing or null-returning `execute` stage.
    Execution,
    /// A timeout-shaped failure during query execution.
    Timeout,
}

impl ErrorKind {
    /// Whether failures of this kind are worth retrying when no explicit
    /// exclusion list is configured. Validation failures are deterministic,
    /// so retrying them is pointless.
    pub fn retryable_by_default(&self) -> bool {
        !matches!(self, ErrorKind::Validation)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Verification => write!(f, "verification"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

fn violations_suffix(violations: &Violations) -> String {
    if violations.is_empty() {
        String::new()
    } else {
        format!(": {}", violations.render())
    }
}

/// Failure of a pipeline invocation, tagged with the stage that produced it.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Structural validation yielded violations, or the handler's `validate`
    /// hook failed.
    #[error("validation failed{}", violations_suffix(.violations))]
    Validation {
        violations: Violations,
        #[source]
        source: Option<BoxError>,
    },

    /// The handler's `verify` hook failed.
    #[error("verification failed")]
    Verification {
        #[source]
        source: BoxError,
    },

    /// The execute stage failed, returned no response where one was
    /// required, or an unmapped error surfaced.
    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The execute stage raised a timeout-shaped error (query path only).
    #[error("query execution timed out")]
    Timeout {
        #[source]
        source: BoxError,
    },
}

impl HandlerError {
    pub fn validation(violations: Violations) -> Self {
        HandlerError::Validation {
            violations,
            source: None,
        }
    }

    pub fn verification(source: impl Into<BoxError>) -> Self {
        HandlerError::Verification {
            source: source.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        HandlerError::Execution {
            message: message.into(),
            source: None,
        }
    }

    pub fn timeout(source: impl Into<BoxError>) -> Self {
        HandlerError::Timeout {
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Validation { .. } => ErrorKind::Validation,
            HandlerError::Verification { .. } => ErrorKind::Verification,
            HandlerError::Execution { .. } => ErrorKind::Execution,
            HandlerError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// The violations carried by a validation failure, empty otherwise.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            HandlerError::Validation { violations, .. } => Some(violations),
            _ => None,
        }
    }

    /// Maps a `validate`-stage failure: validation-kind errors pass through
    /// unchanged, everything else is wrapped.
    pub(crate) fn coerce_validation(err: BoxError) -> Self {
        match err.downcast::<HandlerError>() {
            Ok(taxonomy) if taxonomy.kind() == ErrorKind::Validation => *taxonomy,
            Ok(taxonomy) => HandlerError::Validation {
                violations: Violations::empty(),
                source: Some(taxonomy),
            },
            Err(other) => HandlerError::Validation {
                violations: Violations::empty(),
                source: Some(other),
            },
        }
    }

    /// Maps a `verify`-stage failure: verification-kind errors pass through
    /// unchanged, everything else is wrapped.
    pub(crate) fn coerce_verification(err: BoxError) -> Self {
        match err.downcast::<HandlerError>() {
            Ok(taxonomy) if taxonomy.kind() == ErrorKind::Verification => *taxonomy,
            Ok(taxonomy) => HandlerError::Verification { source: taxonomy },
            Err(other) => HandlerError::Verification { source: other },
        }
    }

    /// Maps an `execute`-stage failure on the command path: any taxonomy
    /// error passes through unchanged, everything else is wrapped.
    pub(crate) fn coerce_execution(err: BoxError) -> Self {
        match err.downcast::<HandlerError>() {
            Ok(taxonomy) => *taxonomy,
            Err(other) => HandlerError::Execution {
                message: "command execution failed".to_string(),
                source: Some(other),
            },
        }
    }

    /// Maps an `execute`-stage failure on the query path. Timeout-shaped
    /// errors are remapped to [`HandlerError::Timeout`] and reported through
    /// `on_timeout` so the metrics sink can count them.
    pub(crate) fn coerce_query_execution(err: BoxError, on_timeout: impl FnOnce()) -> Self {
        match err.downcast::<HandlerError>() {
            Ok(taxonomy) => *taxonomy,
            Err(other) => {
                if is_timeout_shaped(other.as_ref()) {
                    on_timeout();
                    HandlerError::Timeout { source: other }
                } else {
                    HandlerError::Execution {
                        message: "query execution failed".to_string(),
                        source: Some(other),
                    }
                }
            }
        }
    }
}

/// Whether an error is timeout-shaped: an [`io::ErrorKind::TimedOut`]
/// anywhere in its cause chain.
pub fn is_timeout_shaped(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Violation;

    #[derive(Debug, thiserror::Error)]
    #[error("wrapped")]
    struct Wrap(#[source] BoxError);

    fn boxed(err: HandlerError) -> BoxError {
        Box::new(err)
    }

    #[test]
    fn test_validation_passes_through_its_own_kind() {
        let original = HandlerError::validation(Violations::of([Violation::new("too small")]));
        let mapped = HandlerError::coerce_validation(boxed(original));
        assert_eq!(mapped.kind(), ErrorKind::Validation);
        assert_eq!(mapped.violations().unwrap().len(), 1);
    }

    #[test]
    fn test_validation_wraps_foreign_errors() {
        let mapped = HandlerError::coerce_validation("boom".into());
        assert_eq!(mapped.kind(), ErrorKind::Validation);
        assert!(mapped.violations().unwrap().is_empty());
        assert!(std::error::Error::source(&mapped).is_some());
    }

    #[test]
    fn test_validation_wraps_other_taxonomy_kinds() {
        let verification = HandlerError::verification("nope");
        let mapped = HandlerError::coerce_validation(boxed(verification));
        assert_eq!(mapped.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_verification_passes_through_its_own_kind() {
        let original = HandlerError::verification("denied");
        let mapped = HandlerError::coerce_verification(boxed(original));
        assert_eq!(mapped.kind(), ErrorKind::Verification);
    }

    #[test]
    fn test_execution_passes_through_any_taxonomy_kind() {
        let validation = HandlerError::validation(Violations::of([Violation::new("bad")]));
        let mapped = HandlerError::coerce_execution(boxed(validation));
        assert_eq!(mapped.kind(), ErrorKind::Validation);

        let timeout = HandlerError::timeout("deadline");
        let mapped = HandlerError::coerce_execution(boxed(timeout));
        assert_eq!(mapped.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_execution_wraps_foreign_errors() {
        let mapped = HandlerError::coerce_execution("boom".into());
        assert_eq!(mapped.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_query_execution_remaps_timeouts_and_counts() {
        let mut counted = false;
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded");
        let mapped = HandlerError::coerce_query_execution(Box::new(io_err), || counted = true);
        assert_eq!(mapped.kind(), ErrorKind::Timeout);
        assert!(counted);
    }

    #[test]
    fn test_query_execution_finds_timeout_deep_in_chain() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded");
        let nested = Wrap(Box::new(Wrap(Box::new(io_err))));
        let mut counted = false;
        let mapped = HandlerError::coerce_query_execution(Box::new(nested), || counted = true);
        assert_eq!(mapped.kind(), ErrorKind::Timeout);
        assert!(counted);
    }

    #[test]
    fn test_query_execution_does_not_count_prewrapped_timeouts() {
        let mut counted = false;
        let prewrapped = HandlerError::timeout("already shaped");
        let mapped = HandlerError::coerce_query_execution(boxed(prewrapped), || counted = true);
        assert_eq!(mapped.kind(), ErrorKind::Timeout);
        assert!(!counted);
    }

    #[test]
    fn test_timeout_shape_detection() {
        let plain = io::Error::new(io::ErrorKind::Other, "not a timeout");
        assert!(!is_timeout_shaped(&plain));

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "deadline");
        assert!(is_timeout_shaped(&timed_out));
    }

    #[test]
    fn test_default_retryability_table() {
        assert!(!ErrorKind::Validation.retryable_by_default());
        assert!(ErrorKind::Verification.retryable_by_default());
        assert!(ErrorKind::Execution.retryable_by_default());
        assert!(ErrorKind::Timeout.retryable_by_default());
    }

    #[test]
    fn test_validation_message_includes_rendered_violations() {
        let err = HandlerError::validation(Violations::of([
            Violation::new("age must not be negative"),
            Violation::new("name must not be empty"),
        ]));
        let message = err.to_string();
        assert!(message.contains("age must not be negative"));
        assert!(message.contains("name must not be empty"));
    }
}

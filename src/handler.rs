//! # Handler Capability Traits
//!
//! A handler is a unit of business logic with three capabilities, always
//! driven in the same order by the pipeline:
//!
//! 1. `validate` - input-shape checks beyond the structural ones (default
//!    no-op),
//! 2. `verify` - business-rule checks (mandatory),
//! 3. `execute` - the actual work.
//!
//! Handler flavors are distinguished only by the `Response` associated type:
//! `()` for void-shaped handlers, [`CommandTokenResponse`] for token-only
//! handlers, and [`CommandValueResponse`]/[`QueryResponse`] for value-shaped
//! ones. The pipeline treats all flavors uniformly except that an absent
//! response (`Ok(None)`) is tolerated only where [`Response::empty`] produces
//! a substitute, i.e. for void shapes.
//!
//! [`CommandTokenResponse`]: crate::response::CommandTokenResponse
//! [`CommandValueResponse`]: crate::response::CommandValueResponse
//! [`QueryResponse`]: crate::response::QueryResponse

use crate::error::BoxError;
use crate::render::Loggable;
use crate::retry::RetryConfiguration;
use crate::validation::Violations;

/// An input value object: renderable for diagnostics and structurally
/// self-validating. Immutable for the duration of one invocation.
pub trait Input: Loggable {
    /// Structural validation of the value itself. An empty set of violations
    /// means the input is well-formed; anything else fails the invocation
    /// before any handler code runs.
    fn validate(&self) -> Violations {
        Violations::empty()
    }
}

/// Marker for inputs dispatched through the command path.
pub trait Command: Input {}

/// Marker for inputs dispatched through the query path.
pub trait Query: Input {}

/// A response shape the pipeline can hand back to the caller.
pub trait Response {
    /// The substitute response used when a handler returns `Ok(None)`. Only
    /// void shapes provide one; for every other shape an absent response is
    /// an execution failure.
    fn empty() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }

    /// The loggable view of this response, if it has one, for success logs.
    fn as_loggable(&self) -> Option<&dyn Loggable> {
        None
    }
}

/// Void shape: absent responses are legitimate.
impl Response for () {
    fn empty() -> Option<Self> {
        Some(())
    }
}

/// A unit of business logic wrapped by the pipeline.
///
/// `Ok(None)` from [`execute`](Handler::execute) models "the handler returned
/// nothing" and is only legal for void-shaped handlers; value- and
/// token-shaped handlers must produce a response.
pub trait Handler<I: Input>: Send + Sync {
    type Response: Response;

    /// Handler-specific input validation, run after structural validation.
    /// Any failure here surfaces as a validation failure.
    fn validate(&self, input: &I) -> Result<(), BoxError> {
        let _ = input;
        Ok(())
    }

    /// Business-rule verification. Runs only when validation passed; any
    /// failure surfaces as a verification failure.
    fn verify(&self, input: &I) -> Result<(), BoxError>;

    /// The actual work. Runs only when verification passed.
    fn execute(&self, input: &I) -> Result<Option<Self::Response>, BoxError>;

    /// Declarative retry configuration for this handler type. Must not vary
    /// between instances; the pipeline resolves it once per type and caches
    /// the result. `None` means a single attempt, no retry.
    fn retry_configuration(&self) -> Option<RetryConfiguration> {
        None
    }
}

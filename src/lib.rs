#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # cqs-core
//!
//! Command/query handler pipeline with uniform cross-cutting behavior:
//! input validation, custom verification, retryable execution, structured
//! result/failure logging, and timing metrics.
//!
//! ## Overview
//!
//! This crate is middleware for a command/query-separated request-processing
//! style, not a web framework. An external router selects a handler; the
//! pipeline wraps the invocation and enforces a fixed lifecycle around it:
//! validate, then verify, then execute, with per-stage error mapping into a
//! four-kind taxonomy, optional per-handler-type retries with backoff, and
//! cycle-safe rendering of the input and result into log records.
//!
//! ## Architecture
//!
//! - [`pipeline`] - [`CommandPipeline`] / [`QueryPipeline`], the orchestrators
//! - [`handler`] - the [`Handler`] capability trait and input/response traits
//! - [`retry`] - per-handler-type policy resolution and the attempt driver
//! - [`render`] - cycle-safe structured log rendering
//! - [`error`] - the validation/verification/execution/timeout taxonomy
//! - [`metrics`] - the consumed metrics sink trait
//!
//! Invocation is synchronous on the calling thread; the only suspension
//! point is the blocking sleep between retry attempts. Size retries
//! accordingly on latency-sensitive paths.
//!
//! ## Quick Start
//!
//! ```rust
//! use cqs_core::{
//!     BoxError, Command, CommandPipeline, CommandTokenResponse, FieldValue, Handler, Input,
//!     Loggable, StateToken, Violations,
//! };
//!
//! struct RegisterUser {
//!     age: i32,
//! }
//!
//! impl Loggable for RegisterUser {
//!     fn type_label(&self) -> &str {
//!         "RegisterUser"
//!     }
//!     fn log_fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
//!         vec![("age", FieldValue::text(self.age))]
//!     }
//! }
//!
//! impl Input for RegisterUser {
//!     fn validate(&self) -> Violations {
//!         if self.age < 0 {
//!             Violations::single("age must not be negative")
//!         } else {
//!             Violations::empty()
//!         }
//!     }
//! }
//!
//! impl Command for RegisterUser {}
//!
//! struct RegisterUserHandler;
//!
//! impl Handler<RegisterUser> for RegisterUserHandler {
//!     type Response = CommandTokenResponse;
//!
//!     fn verify(&self, cmd: &RegisterUser) -> Result<(), BoxError> {
//!         if cmd.age > 120 {
//!             return Err("nobody is that old".into());
//!         }
//!         Ok(())
//!     }
//!
//!     fn execute(&self, _cmd: &RegisterUser) -> Result<Option<Self::Response>, BoxError> {
//!         Ok(Some(CommandTokenResponse::of(StateToken::random())))
//!     }
//! }
//!
//! # fn main() -> Result<(), cqs_core::HandlerError> {
//! let pipeline = CommandPipeline::new();
//! let response = pipeline.execute(&RegisterUserHandler, &RegisterUser { age: 33 })?;
//! assert!(response.token().is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod response;
pub mod retry;
pub mod state_token;
pub mod validation;

pub use error::{is_timeout_shaped, BoxError, ErrorKind, HandlerError, HandlerResult};
pub use handler::{Command, Handler, Input, Query, Response};
pub use logging::init_logging;
pub use metrics::{HandlerMetrics, NoopMetrics, TracingMetrics};
pub use pipeline::{CommandPipeline, QueryPipeline};
pub use render::{render, try_render, FieldValue, LogValue, Loggable};
pub use response::{CommandTokenResponse, CommandValueResponse, QueryResponse};
pub use retry::{RetryConfiguration, RetryPolicy, RetryRegistry, BACKOFF_MULTIPLIER};
pub use state_token::StateToken;
pub use validation::{Violation, Violations};

//! Failure taxonomy and terminal outcomes.
//!
//! A request ends in exactly one [`Outcome`]. Halts and timeouts are explicit
//! variants rather than raised errors so every path through the pipeline is
//! matched exhaustively.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Status written for a timed out async request.
pub const GATEWAY_TIMEOUT: u16 = 504;

/// Status written when a failure escapes the error handler.
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// An explicit short-circuit response.
///
/// A halt is not an error: it is never passed to the application error
/// handler and is rendered exactly as given.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HaltSignal {
    /// Status to write. `None` keeps the default status (200).
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl HaltSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    /// The fixed halt rendered when an async deadline elapses.
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::with_status(GATEWAY_TIMEOUT).body(Value::String(message.into()))
    }
}

/// An application-level failure.
///
/// Cheap to clone so a host event can carry the same cause to every listener.
#[derive(Debug, Clone)]
pub struct ActionError(Arc<dyn std::error::Error + Send + Sync>);

impl ActionError {
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(Arc::from(error.into()))
    }

    /// Create an error carrying only a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(message.to_string())
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Anything an action, a computation, an error handler or a renderer can raise.
#[derive(Debug, Clone, Error)]
pub enum Failure {
    #[error("halted with status {:?}", .0.status)]
    Halt(HaltSignal),

    #[error(transparent)]
    Error(#[from] ActionError),
}

impl Failure {
    /// Shorthand for an application failure carrying a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Failure::Error(ActionError::msg(message))
    }
}

impl From<HaltSignal> for Failure {
    fn from(halt: HaltSignal) -> Self {
        Failure::Halt(halt)
    }
}

/// The terminal outcome of a request, handed to the finalize step.
#[derive(Debug)]
pub enum Outcome {
    /// A concrete value produced by the action
    Value(Value),
    /// The action, its computation, or the host failed
    Failed(Failure),
    /// The deadline elapsed before the computation resolved
    TimedOut,
}

impl Outcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }
}

impl From<Result<Value, Failure>> for Outcome {
    fn from(result: Result<Value, Failure>) -> Self {
        match result {
            Ok(value) => Outcome::Value(value),
            Err(failure) => Outcome::Failed(failure),
        }
    }
}

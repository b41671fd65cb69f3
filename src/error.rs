//! Error handling types for yakusoku
//!
//! This module provides the error types that describe failures of the
//! completion machinery itself. Application failures travel as
//! [`Failure`](crate::outcome::Failure) values instead.

use std::sync::PoisonError;
use thiserror::Error;

/// Errors raised by the in-memory host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// `start_async` was called twice for the same exchange
    #[error("Async handling already started for exchange {id}")]
    AsyncAlreadyStarted { id: String },

    /// `complete` was called on a session that is already finalized
    #[error("Async session already completed for exchange {id}")]
    AlreadyCompleted { id: String },

    /// A host-level operation required a suspended exchange
    #[error("Exchange {id} is not in async mode")]
    NotAsync { id: String },
}

/// Errors raised while handing a request over to async completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Rendering was attempted without a bound exchange
    #[error("No exchange is bound to the current execution context")]
    Unbound,

    /// The host refused a lifecycle operation
    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

/// Errors raised while loading settings files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid TOML for the settings schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A deadline value was neither milliseconds nor "unbounded"
    #[error("Invalid deadline: {value}")]
    InvalidDeadline { value: String },
}

/// Result type for completion operations
pub type CompletionResult<T> = Result<T, CompletionError>;

/// Helper trait to recover a guard from a poisoned lock.
pub trait LockResultExt<T> {
    /// Recover the guard from a PoisonError, logging which operation hit it.
    ///
    /// The context parameter identifies which operation triggered lock recovery,
    /// helping developers debug thread safety issues.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "yakusoku::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

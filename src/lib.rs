//! Asynchronous completion of suspended HTTP requests.
//!
//! An action may return a concrete value, a [`PendingComputation`], or a
//! [`DeferredResult`] carrying its own deadline. The [`Dispatcher`] renders
//! concrete values immediately and hands everything else to the
//! [`CompletionCoordinator`], which suspends the exchange on the host and
//! finishes it exactly once: when the computation settles, when the deadline
//! elapses, or when the host reports an error.

pub mod classify;
pub mod completion;
pub mod config;
pub mod context;
pub mod deferred;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod outcome;
pub mod render;

pub use completion::CompletionCoordinator;
pub use config::{Settings, SettingsStore, load_settings};
pub use deferred::{ActionValue, Deadline, DeferredResult, PendingComputation, Promise, promise};
pub use dispatch::{Dispatched, Dispatcher, DispatcherBuilder};
pub use error::{CompletionError, CompletionResult, ConfigError, HostError};
pub use host::{Exchange, Host, Request, Response};
pub use outcome::{ActionError, Failure, HaltSignal, Outcome};
pub use render::{CallbackRegistry, ErrorHandler, ErrorPipeline, JsonRenderer, Renderer};

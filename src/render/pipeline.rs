//! Maps terminal outcomes to exactly one written response.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use log::{debug, error, warn};
use serde_json::Value;

use super::{CallbackRegistry, ErrorHandler, JsonRenderer, Renderer};
use crate::config::SettingsStore;
use crate::context::current_exchange;
use crate::error::{CompletionError, CompletionResult};
use crate::host::{Exchange, Response};
use crate::outcome::{ActionError, Failure, HaltSignal, INTERNAL_SERVER_ERROR, Outcome};

/// Status used for a halt that does not carry one.
const DEFAULT_STATUS: u16 = 200;

/// Renders values and failures for the exchange bound to the current context.
///
/// Failure taxonomy:
/// - halts are written as given and never reach the error handler
/// - application failures go through the error handler, whose result is
///   rendered like an action value
/// - failures escaping the handler (or rendering its result) are uncaught:
///   callbacks observe them before and after the fixed 500 response
/// - timeouts are written as a fixed 504 halt
pub struct ErrorPipeline {
    renderer: Arc<dyn Renderer>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    callbacks: CallbackRegistry,
    settings: Arc<SettingsStore>,
}

impl ErrorPipeline {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self {
            renderer: Arc::new(JsonRenderer),
            error_handler: None,
            callbacks: CallbackRegistry::new(),
            settings,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn with_callbacks(mut self, callbacks: CallbackRegistry) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Render a terminal outcome to the current exchange.
    ///
    /// Fails only when no exchange is bound; every other failure ends in a
    /// written response.
    pub fn render_outcome(&self, outcome: Outcome) -> CompletionResult<()> {
        let exchange = current_exchange().ok_or(CompletionError::Unbound)?;
        match outcome {
            Outcome::Value(value) => self.render_value(&exchange, value),
            Outcome::Failed(failure) => self.render_failure(&exchange, failure),
            Outcome::TimedOut => {
                let message = self.settings.load().messages.gateway_timeout.clone();
                self.render_halt(&exchange, &HaltSignal::gateway_timeout(message));
            }
        }
        Ok(())
    }

    fn render_value(&self, exchange: &Exchange, value: Value) {
        self.callbacks.run_complete(Ok(&value));
        match isolate("renderer", || self.renderer.render(exchange, &value)) {
            Ok(()) => self.callbacks.run_render(Ok(&value)),
            Err(Escaped::Failed(failure)) => self.render_failure(exchange, failure),
            Err(Escaped::Panicked(cause)) => self.render_uncaught(exchange, &cause),
        }
    }

    fn render_failure(&self, exchange: &Exchange, failure: Failure) {
        match failure {
            Failure::Halt(halt) => self.render_halt(exchange, &halt),
            Failure::Error(cause) => self.render_error(exchange, &cause),
        }
    }

    fn render_error(&self, exchange: &Exchange, cause: &ActionError) {
        let Some(handler) = self.error_handler.as_ref() else {
            self.render_uncaught(exchange, cause);
            return;
        };

        debug!(
            target: "yakusoku::pipeline",
            "Handling failure for exchange {}: {}",
            exchange.id(),
            cause
        );
        let handled = isolate("error handler", || handler.handle(cause)).and_then(|value| {
            isolate("renderer", || self.renderer.render(exchange, &value))
        });

        match handled {
            Ok(()) => {}
            Err(Escaped::Failed(Failure::Halt(halt))) => self.render_halt(exchange, &halt),
            Err(Escaped::Failed(Failure::Error(uncaught))) => {
                self.render_uncaught(exchange, &uncaught)
            }
            Err(Escaped::Panicked(uncaught)) => self.render_uncaught(exchange, &uncaught),
        }
    }

    fn render_halt(&self, exchange: &Exchange, halt: &HaltSignal) {
        exchange.write(Response {
            status: halt.status.unwrap_or(DEFAULT_STATUS),
            headers: halt.headers.clone(),
            body: halt.body.clone(),
        });
    }

    fn render_uncaught(&self, exchange: &Exchange, cause: &ActionError) {
        error!(
            target: "yakusoku::pipeline",
            "Uncaught failure for exchange {}: {}",
            exchange.id(),
            cause
        );
        self.callbacks.run_complete(Err(cause));

        let settings = self.settings.load();
        let body = if settings.development_mode {
            format!("{}: {}", settings.messages.uncaught, cause)
        } else {
            settings.messages.uncaught.clone()
        };
        exchange.write(Response::new(INTERNAL_SERVER_ERROR, body));

        self.callbacks.run_render(Err(cause));
    }
}

/// How user code failed to produce a result.
enum Escaped {
    Failed(Failure),
    Panicked(ActionError),
}

/// Run a renderer or error handler, turning a panic into an uncaught failure.
fn isolate<T>(role: &str, f: impl FnOnce() -> Result<T, Failure>) -> Result<T, Escaped> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(Escaped::Failed),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(
                target: "yakusoku::pipeline",
                "The {} panicked: {}",
                role,
                message
            );
            Err(Escaped::Panicked(ActionError::msg(format!(
                "{} panicked: {}",
                role, message
            ))))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for ErrorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPipeline")
            .field("error_handler", &self.error_handler.is_some())
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

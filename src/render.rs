//! Rendering of terminal outcomes.
//!
//! - `pipeline` - ErrorPipeline mapping outcomes (values, halts, failures,
//!   timeouts) to exactly one written response
//! - `callbacks` - CallbackRegistry for process-wide completion hooks
//!
//! The concrete conversion of a value into a response belongs to the
//! application and is plugged in through [`Renderer`]; recovery from
//! application failures is plugged in through [`ErrorHandler`].

mod callbacks;
mod pipeline;

use serde_json::Value;

use crate::host::{Exchange, Response};
use crate::outcome::{ActionError, Failure};

pub use callbacks::{CallbackOutcome, CallbackRegistry};
pub use pipeline::ErrorPipeline;

/// Writes a concrete value to an exchange.
///
/// A renderer may raise, including raising a halt to short-circuit with an
/// explicit status.
pub trait Renderer: Send + Sync {
    fn render(&self, exchange: &Exchange, value: &Value) -> Result<(), Failure>;
}

impl<F> Renderer for F
where
    F: Fn(&Exchange, &Value) -> Result<(), Failure> + Send + Sync,
{
    fn render(&self, exchange: &Exchange, value: &Value) -> Result<(), Failure> {
        self(exchange, value)
    }
}

/// Default renderer: status 200 with the value as body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, exchange: &Exchange, value: &Value) -> Result<(), Failure> {
        exchange.write(Response::ok(value.clone()));
        Ok(())
    }
}

/// Application hook turning a failure into a value to render.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, cause: &ActionError) -> Result<Value, Failure>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&ActionError) -> Result<Value, Failure> + Send + Sync,
{
    fn handle(&self, cause: &ActionError) -> Result<Value, Failure> {
        self(cause)
    }
}

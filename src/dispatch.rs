//! Render dispatch for action results.
//!
//! The dispatcher is the entry point a routing layer calls with whatever an
//! action produced. Synchronous values are rendered on the calling thread;
//! anything deferred is handed to the [`CompletionCoordinator`] before the
//! default synchronous render path is reached.

use std::sync::Arc;

use log::trace;
use tokio::runtime::Handle;

use crate::classify::{Classified, classify};
use crate::completion::CompletionCoordinator;
use crate::config::SettingsStore;
use crate::context;
use crate::deferred::ActionValue;
use crate::error::CompletionResult;
use crate::host::Exchange;
use crate::outcome::{Failure, Outcome};
use crate::render::{CallbackRegistry, ErrorHandler, ErrorPipeline, JsonRenderer, Renderer};

/// How an action result was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A response was written before `dispatch` returned
    Rendered,
    /// The exchange was suspended and completes later
    Suspended,
}

/// Routes action results to the synchronous render path or async completion.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pipeline: Arc<ErrorPipeline>,
    coordinator: CompletionCoordinator,
    settings: Arc<SettingsStore>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Handle the result of an action for `exchange`.
    pub fn dispatch(
        &self,
        exchange: &Exchange,
        result: Result<ActionValue, Failure>,
    ) -> CompletionResult<Dispatched> {
        let value = match result {
            Ok(value) => value,
            Err(failure) => {
                self.render_now(exchange, Outcome::Failed(failure))?;
                return Ok(Dispatched::Rendered);
            }
        };

        match classify(value) {
            Classified::Sync(value) => {
                self.render_now(exchange, Outcome::Value(value))?;
                Ok(Dispatched::Rendered)
            }
            Classified::Async(pending, deadline) => {
                let deadline = deadline.unwrap_or_else(|| self.settings.load().async_timeout);
                self.coordinator.begin_async(exchange, pending, deadline)?;
                Ok(Dispatched::Suspended)
            }
        }
    }

    pub fn pipeline(&self) -> &Arc<ErrorPipeline> {
        &self.pipeline
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    fn render_now(&self, exchange: &Exchange, outcome: Outcome) -> CompletionResult<()> {
        trace!(
            target: "yakusoku::dispatch",
            "Rendering exchange {} synchronously",
            exchange.id()
        );
        context::within(exchange, || self.pipeline.render_outcome(outcome))
    }
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    renderer: Option<Arc<dyn Renderer>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    callbacks: Option<CallbackRegistry>,
    settings: Option<Arc<SettingsStore>>,
}

impl DispatcherBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn callbacks(mut self, callbacks: CallbackRegistry) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Build a dispatcher whose computations settle on `runtime`.
    pub fn build(self, runtime: Handle) -> Dispatcher {
        let settings = self.settings.unwrap_or_default();
        let mut pipeline = ErrorPipeline::new(Arc::clone(&settings))
            .with_renderer(self.renderer.unwrap_or_else(|| Arc::new(JsonRenderer)))
            .with_callbacks(self.callbacks.unwrap_or_default());
        if let Some(handler) = self.error_handler {
            pipeline = pipeline.with_error_handler(handler);
        }

        let pipeline = Arc::new(pipeline);
        Dispatcher {
            coordinator: CompletionCoordinator::new(Arc::clone(&pipeline), runtime),
            pipeline,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::deferred::{Deadline, PendingComputation};
    use crate::host::{Host, Request};
    use crate::outcome::HaltSignal;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn ready_value_renders_before_returning() {
        let dispatcher = Dispatcher::builder().build(Handle::current());
        let host = Host::default();
        let mut dispatched = None;
        let served = host.serve(Request::get("/"), |exchange| {
            dispatched = Some(dispatcher.dispatch(exchange, Ok(json!("now").into())));
            assert_eq!(exchange.write_count(), 1);
        });

        assert_eq!(dispatched.unwrap().unwrap(), Dispatched::Rendered);
        assert!(!served.exchange().is_async());
        assert!(served.exchange().is_finished());
    }

    #[tokio::test]
    async fn synchronous_failure_goes_through_pipeline() {
        let dispatcher = Dispatcher::builder().build(Handle::current());
        let host = Host::default();
        let served = host.serve(Request::get("/"), |exchange| {
            let result = dispatcher.dispatch(exchange, Err(HaltSignal::with_status(401).into()));
            assert_eq!(result.unwrap(), Dispatched::Rendered);
        });

        assert_eq!(served.exchange().response().unwrap().status, 401);
    }

    #[tokio::test]
    async fn pending_value_suspends() {
        let dispatcher = Dispatcher::builder().build(Handle::current());
        let host = Host::default();
        let served = host.serve(Request::get("/"), |exchange| {
            let result =
                dispatcher.dispatch(exchange, Ok(PendingComputation::ready(json!(5)).into()));
            assert_eq!(result.unwrap(), Dispatched::Suspended);
        });

        let exchange = served.finished().await;
        assert_eq!(exchange.response().unwrap().body, json!(5));
    }

    #[tokio::test(start_paused = true)]
    async fn bare_pending_uses_configured_default_deadline() {
        let settings = Arc::new(SettingsStore::new(Settings {
            async_timeout: Deadline::from_millis(20),
            ..Settings::default()
        }));
        let dispatcher = Dispatcher::builder()
            .settings(settings)
            .build(Handle::current());
        let host = Host::default();
        let served = host.serve(Request::get("/"), |exchange| {
            dispatcher
                .dispatch(exchange, Ok(PendingComputation::never().into()))
                .unwrap();
        });

        let exchange = tokio::time::timeout(Duration::from_millis(50), served.finished())
            .await
            .expect("default deadline should fire");
        assert_eq!(exchange.response().unwrap().status, 504);
    }

    #[tokio::test(start_paused = true)]
    async fn standalone_exchange_still_honors_deadline() {
        let dispatcher = Dispatcher::builder().build(Handle::current());
        let exchange = Exchange::new(Request::get("/standalone"));

        let deferred = crate::deferred::DeferredResult::within(
            PendingComputation::never(),
            Duration::from_millis(20),
        );
        let dispatched = dispatcher.dispatch(&exchange, Ok(deferred.into())).unwrap();
        assert_eq!(dispatched, Dispatched::Suspended);

        tokio::time::timeout(Duration::from_millis(50), exchange.finished())
            .await
            .expect("deadline should fire without a host");
        assert_eq!(exchange.write_count(), 1);
        assert_eq!(exchange.response().unwrap().status, 504);
    }
}

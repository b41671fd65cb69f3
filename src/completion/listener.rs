//! Host event listener for a suspended request.

use log::{debug, warn};

use super::coordinator::Completion;
use crate::host::{AsyncEvent, AsyncListener};
use crate::outcome::{Failure, Outcome};

/// Routes host timeout and error events into the completion race.
///
/// `on_start_async` and `on_complete` keep their default no-op behavior.
pub(crate) struct HostEventListener {
    completion: Completion,
}

impl HostEventListener {
    pub(crate) fn new(completion: Completion) -> Self {
        Self { completion }
    }
}

impl AsyncListener for HostEventListener {
    fn on_timeout(&self, event: &AsyncEvent) {
        if self.completion.finish(Outcome::TimedOut) {
            debug!(
                target: "yakusoku::completion",
                "Exchange {} timed out",
                event.exchange.id()
            );
        }
    }

    fn on_error(&self, event: &AsyncEvent) {
        let cause = event.cause.clone().unwrap_or_else(|| {
            warn!(
                target: "yakusoku::completion",
                "Host error event for exchange {} carried no cause",
                event.exchange.id()
            );
            Failure::msg("async error")
        });
        self.completion.finish(Outcome::Failed(cause));
    }
}

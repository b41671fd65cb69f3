//! Async handoff of a suspended request.

use std::fmt;
use std::sync::Arc;

use log::{debug, error};
use tokio::runtime::Handle;

use super::continuation;
use super::flag::CompletionFlag;
use super::listener::HostEventListener;
use crate::context;
use crate::deferred::{Deadline, PendingComputation};
use crate::error::CompletionResult;
use crate::host::{AsyncContext, Exchange};
use crate::outcome::Outcome;
use crate::render::ErrorPipeline;

/// Hands pending computations over to the host's async lifecycle.
///
/// # Completion race
///
/// Three triggers may finish a suspended request: the computation settling,
/// the host timeout, and a host-level error. They run on different threads
/// in no defined order. Each goes through [`Completion::finish`], which lets
/// only the first past the [`CompletionFlag`] render and finalize; the rest
/// are no-ops. No lock is held while rendering.
#[derive(Clone)]
pub struct CompletionCoordinator {
    pipeline: Arc<ErrorPipeline>,
    runtime: Handle,
}

impl CompletionCoordinator {
    /// Create a coordinator that settles computations on `runtime`.
    pub fn new(pipeline: Arc<ErrorPipeline>, runtime: Handle) -> Self {
        Self { pipeline, runtime }
    }

    /// Suspend `exchange` and complete it once `pending` settles, the
    /// deadline elapses, or the host reports an error, whichever comes first.
    ///
    /// Returns as soon as the continuation is attached; the calling thread
    /// never waits for the computation.
    pub fn begin_async(
        &self,
        exchange: &Exchange,
        pending: PendingComputation,
        deadline: Deadline,
    ) -> CompletionResult<()> {
        let flag = Arc::new(CompletionFlag::new());
        let context = exchange.start_async()?;
        context.set_timeout(deadline.host_timeout());

        let completion = Completion {
            flag,
            context: Arc::clone(&context),
            pipeline: Arc::clone(&self.pipeline),
        };
        context.add_listener(Arc::new(HostEventListener::new(completion.clone())));

        debug!(
            target: "yakusoku::completion",
            "Exchange {} suspended with deadline {}",
            exchange.id(),
            deadline
        );
        continuation::attach(&self.runtime, pending, move |outcome| {
            completion.finish(outcome);
        });
        Ok(())
    }
}

impl fmt::Debug for CompletionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionCoordinator")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// The finalize step shared by every trigger of one request.
#[derive(Clone)]
pub(crate) struct Completion {
    flag: Arc<CompletionFlag>,
    context: Arc<dyn AsyncContext>,
    pipeline: Arc<ErrorPipeline>,
}

impl Completion {
    /// Render `outcome` and finalize the session, if no other trigger has.
    ///
    /// Returns `true` if this call won the race. A losing call touches
    /// neither the exchange nor the session.
    pub(crate) fn finish(&self, outcome: Outcome) -> bool {
        if !self.flag.try_complete() {
            debug!(
                target: "yakusoku::completion",
                "Discarding late outcome for exchange {} (timeout: {})",
                self.context.exchange().id(),
                outcome.is_timeout()
            );
            return false;
        }

        let _finalize = FinalizeOnDrop(self.context.as_ref());
        let exchange = self.context.exchange();
        if let Err(err) = context::within(exchange, || self.pipeline.render_outcome(outcome)) {
            error!(
                target: "yakusoku::completion",
                "Failed to render outcome for exchange {}: {}",
                exchange.id(),
                err
            );
        }
        true
    }
}

/// Completes the session when dropped, including while unwinding.
struct FinalizeOnDrop<'a>(&'a dyn AsyncContext);

impl Drop for FinalizeOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.0.complete() {
            error!(
                target: "yakusoku::completion",
                "Failed to finalize async session: {}",
                err
            );
        }
    }
}
